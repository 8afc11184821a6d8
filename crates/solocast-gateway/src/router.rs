//! Signaling router: owns the single session and decides who hears what.
//!
//! All session state (connected clients, the current sender, the receiver
//! set) lives in one [`SessionState`] behind one mutex. Every handler takes
//! the lock once, mutates, queues its outbound messages and releases it, so
//! no other event can observe a half-applied transition.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use solocast_common::{ClientId, ClientMessage, Role, ServerMessage};
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use crate::signal::Signaler;

/// Role bookkeeping for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientRole {
    #[default]
    Unassigned,
    Sender,
    Receiver,
}

/// How sender-originated traffic fans out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RelayMode {
    /// Every connected client except the originator, whatever its role.
    #[default]
    Broadcast,
    /// Only clients registered as receivers.
    RoleDirected,
}

#[derive(Debug)]
struct Client {
    role: ClientRole,
    signaler: Signaler,
}

#[derive(Debug, Default)]
struct SessionState {
    clients: HashMap<ClientId, Client>,
    current_sender: Option<ClientId>,
    receivers: HashSet<ClientId>,
}

/// Point-in-time view of the session, used by `/health` and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub connected_clients: usize,
    pub receivers: usize,
    pub sender: Option<ClientId>,
}

impl SessionState {
    fn send_to(&self, id: ClientId, message: ServerMessage) {
        let Some(client) = self.clients.get(&id) else {
            debug!("dropping {} for departed client {}", message.name(), id);
            return;
        };
        if !client.signaler.try_send(message) {
            debug!("outbox for {} is closed or full", id);
        }
    }

    fn broadcast_except(&self, origin: ClientId, message: ServerMessage) {
        for (id, client) in &self.clients {
            if *id == origin {
                continue;
            }
            if !client.signaler.try_send(message.clone()) {
                debug!("outbox for {} is closed or full", id);
            }
        }
    }

    /// Delivers sender-originated traffic according to `mode`.
    fn fan_out(&self, mode: RelayMode, origin: ClientId, message: ServerMessage) {
        match mode {
            RelayMode::Broadcast => self.broadcast_except(origin, message),
            RelayMode::RoleDirected => {
                for id in self.receivers.iter().filter(|id| **id != origin) {
                    self.send_to(*id, message.clone());
                }
            }
        }
    }

    fn set_role(&mut self, id: ClientId, role: ClientRole) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.role = role;
        }
    }

    fn role_of(&self, id: ClientId) -> Option<ClientRole> {
        self.clients.get(&id).map(|client| client.role)
    }

    fn register(&mut self, mode: RelayMode, id: ClientId, role: Role) {
        let Some(previous) = self.role_of(id) else {
            debug!("register from unknown client {}", id);
            return;
        };

        match role {
            Role::Sender => {
                if previous == ClientRole::Receiver {
                    self.receivers.remove(&id);
                }
                if let Some(evicted) = self.current_sender.filter(|current| *current != id) {
                    self.set_role(evicted, ClientRole::Unassigned);
                    self.send_to(evicted, ServerMessage::SenderReplaced);
                    info!("sender {} replaced by {}", evicted, id);
                }
                self.current_sender = Some(id);
                self.set_role(id, ClientRole::Sender);
                info!("sender = {}", id);

                if !self.receivers.is_empty() {
                    self.send_to(
                        id,
                        ServerMessage::ReceiverReady {
                            receiver_id: None,
                            count: self.receivers.len(),
                        },
                    );
                }
            }
            Role::Receiver => {
                if self.current_sender == Some(id) {
                    // Stepping down counts as the sender leaving.
                    self.current_sender = None;
                    self.fan_out(mode, id, ServerMessage::ReceiverDisconnected);
                    info!("sender {} stepped down", id);
                }
                self.receivers.insert(id);
                self.set_role(id, ClientRole::Receiver);
                info!("receiver joined {}", id);

                if let Some(sender) = self.current_sender {
                    self.send_to(
                        sender,
                        ServerMessage::ReceiverReady {
                            receiver_id: Some(id),
                            count: self.receivers.len(),
                        },
                    );
                }
            }
        }
    }

    fn offer(&self, mode: RelayMode, id: ClientId, offer: Value) {
        if self.current_sender != Some(id) {
            debug!("dropping offer from non-sender {}", id);
            return;
        }
        self.fan_out(mode, id, ServerMessage::Offer(offer));
    }

    fn answer(&self, id: ClientId, answer: Value) {
        match self.current_sender {
            Some(sender) => self.send_to(sender, ServerMessage::Answer(answer)),
            None => debug!("dropping answer from {}: no sender", id),
        }
    }

    fn ice_candidate(&self, mode: RelayMode, id: ClientId, candidate: Value) {
        if self.role_of(id) == Some(ClientRole::Sender) {
            self.fan_out(mode, id, ServerMessage::IceCandidate(candidate));
        } else if let Some(sender) = self.current_sender {
            self.send_to(sender, ServerMessage::IceCandidate(candidate));
        } else {
            debug!("dropping ice-candidate from {}: no sender", id);
        }
    }

    fn stop(&self, mode: RelayMode, id: ClientId) {
        if self.role_of(id) == Some(ClientRole::Sender) {
            info!("sender {} stopped streaming", id);
            self.fan_out(mode, id, ServerMessage::StreamStopped);
        }
    }

    fn disconnect(&mut self, mode: RelayMode, id: ClientId) -> bool {
        if self.clients.remove(&id).is_none() {
            return false;
        }

        if self.current_sender == Some(id) {
            self.current_sender = None;
            self.fan_out(mode, id, ServerMessage::ReceiverDisconnected);
            info!("- sender disconnected {}", id);
        } else if self.receivers.remove(&id) {
            if let Some(sender) = self.current_sender {
                self.send_to(
                    sender,
                    ServerMessage::ReceiverCount {
                        count: self.receivers.len(),
                    },
                );
            }
            info!("- receiver disconnected {}", id);
        } else {
            info!("- disconnected {}", id);
        }
        true
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connected_clients: self.clients.len(),
            receivers: self.receivers.len(),
            sender: self.current_sender,
        }
    }
}

/// Cloneable handle to the process-wide signaling session.
#[derive(Debug, Clone, Default)]
pub struct SignalRouter {
    state: Arc<Mutex<SessionState>>,
    mode: RelayMode,
}

impl SignalRouter {
    pub fn new(mode: RelayMode) -> Self {
        Self {
            state: Arc::default(),
            mode,
        }
    }

    /// Admits a new connection with no role.
    pub async fn connect(&self, signaler: Signaler) -> ClientId {
        let id = ClientId::new();
        self.state.lock().await.clients.insert(
            id,
            Client {
                role: ClientRole::Unassigned,
                signaler,
            },
        );
        id
    }

    /// Dispatches one inbound message from `id`.
    pub async fn handle(&self, id: ClientId, message: ClientMessage) {
        trace!("{} from {}", message.name(), id);
        match message {
            ClientMessage::Register { role } => self.register(id, role).await,
            ClientMessage::Offer(offer) => self.offer(id, offer).await,
            ClientMessage::Answer(answer) => self.answer(id, answer).await,
            ClientMessage::IceCandidate(candidate) => self.ice_candidate(id, candidate).await,
            ClientMessage::Stop => self.stop(id).await,
            ClientMessage::Pong => {}
        }
    }

    pub async fn register(&self, id: ClientId, role: Role) {
        self.state.lock().await.register(self.mode, id, role);
    }

    pub async fn offer(&self, id: ClientId, offer: Value) {
        self.state.lock().await.offer(self.mode, id, offer);
    }

    pub async fn answer(&self, id: ClientId, answer: Value) {
        self.state.lock().await.answer(id, answer);
    }

    pub async fn ice_candidate(&self, id: ClientId, candidate: Value) {
        self.state.lock().await.ice_candidate(self.mode, id, candidate);
    }

    pub async fn stop(&self, id: ClientId) {
        self.state.lock().await.stop(self.mode, id);
    }

    /// Removes every trace of `id`. Returns `false` if it was already gone.
    pub async fn disconnect(&self, id: ClientId) -> bool {
        self.state.lock().await.disconnect(self.mode, id)
    }

    pub async fn role_of(&self, id: ClientId) -> Option<ClientRole> {
        self.state.lock().await.role_of(id)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }
}
