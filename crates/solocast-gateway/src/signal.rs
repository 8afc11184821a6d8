use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use futures::{stream::StreamExt, SinkExt};
use solocast_common::{ClientMessage, ServerMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::heartbeat::Heartbeat;
use crate::router::SignalRouter;

const WS_OUTBOX_CAPACITY: usize = 128;
const WS_MAX_TEXT_BYTES: usize = 64 * 1024;

/// Outbound queue of one connection.
#[derive(Debug, Clone)]
pub struct Signaler(mpsc::Sender<ServerMessage>);

impl Signaler {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self(tx), rx)
    }

    /// Queues `signal` without waiting. Returns `false` if the connection is
    /// gone or its queue is full.
    pub fn try_send(&self, signal: ServerMessage) -> bool {
        self.0.try_send(signal).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

fn to_ws_message(signal: &ServerMessage) -> Option<Message> {
    match signal.encode() {
        Ok(text) => Some(Message::Text(text)),
        Err(err) => {
            warn!("failed to encode {}: {}", signal.name(), err);
            None
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(router): State<SignalRouter>,
    State(config): State<Arc<GatewayConfig>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !config.cors_origin.ws_origin_allowed(origin) {
        warn!("rejecting websocket from {} with origin {:?}", addr, origin);
        return StatusCode::FORBIDDEN.into_response();
    }

    let ping_interval = config.ping_interval();
    ws.max_message_size(WS_MAX_TEXT_BYTES)
        .max_frame_size(WS_MAX_TEXT_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, router, ping_interval, addr))
        .into_response()
}

async fn handle_socket(
    stream: WebSocket,
    router: SignalRouter,
    ping_interval: Duration,
    addr: SocketAddr,
) {
    let (mut sender, mut receiver) = stream.split();
    let (signaler, mut outbox) = Signaler::channel(WS_OUTBOX_CAPACITY);
    let (disconnect_tx, mut disconnect_rx) = mpsc::channel::<()>(1);

    let writer = tokio::spawn(async move {
        while let Some(signal) = outbox.recv().await {
            let Some(message) = to_ws_message(&signal) else {
                continue;
            };
            if sender.send(message).await.is_err() {
                break;
            }
        }
        let _ = disconnect_tx.try_send(());
    });

    let id = router.connect(signaler.clone()).await;
    let heartbeat = Heartbeat::spawn(signaler, ping_interval);
    info!("+ connected {} from {}", id, addr);

    loop {
        tokio::select! {
            _ = disconnect_rx.recv() => {
                break;
            }
            msg = receiver.next() => {
                let Some(msg) = msg else { break; };
                let Ok(msg) = msg else { break; };

                let text = match msg {
                    Message::Text(text) => text,
                    Message::Binary(_) => {
                        warn!("ignoring binary frame from {}", id);
                        continue;
                    }
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                };

                match ClientMessage::decode(&text) {
                    Ok(message) => router.handle(id, message).await,
                    Err(err) => warn!("ignoring frame from {}: {}", id, err),
                }
            }
        }
    }

    heartbeat.cancel();
    if !router.disconnect(id).await {
        debug!("client {} was already cleaned up", id);
    }
    writer.abort();
}
