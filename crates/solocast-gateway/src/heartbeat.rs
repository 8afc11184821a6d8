//! Per-connection keep-alive pings.
//!
//! Pings only keep intermediaries from closing idle sockets; replies are not
//! tracked and a silent client is never dropped.

use std::time::Duration;

use chrono::Utc;
use solocast_common::ServerMessage;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::signal::Signaler;

/// Timer owned by one connection. Cancelled on [`Heartbeat::cancel`] or on
/// drop, whichever comes first.
#[derive(Debug)]
pub struct Heartbeat {
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Starts pinging through `signaler` every `period`, first after one full
    /// period.
    pub fn spawn(signaler: Signaler, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if signaler.is_closed() {
                    break;
                }
                let ping = ServerMessage::Ping {
                    t: Utc::now().timestamp_millis(),
                };
                if !signaler.try_send(ping) {
                    debug!("skipped ping: outbox full");
                }
            }
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}
