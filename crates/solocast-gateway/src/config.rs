use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;

use crate::router::RelayMode;
use crate::security::AllowedOrigins;

/// Default configuration values
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PING_INTERVAL_MS: u64 = 15_000;

#[derive(Parser, Debug, Clone)]
#[command(name = "solocast-gateway")]
#[command(about = "Solocast signaling gateway - relays WebRTC handshakes between one sender and many receivers")]
pub struct GatewayConfig {
    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Listen port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Allowed cross-origin callers: `*` or a comma-separated origin list
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: AllowedOrigins,

    /// Keep-alive ping period in milliseconds
    #[arg(
        long,
        env = "PING_INTERVAL_MS",
        default_value_t = DEFAULT_PING_INTERVAL_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub ping_interval_ms: u64,

    /// Fan-out for offers, sender candidates and stream notices
    #[arg(long, env = "RELAY_MODE", value_enum, default_value_t = RelayMode::Broadcast)]
    pub relay_mode: RelayMode,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            cors_origin: AllowedOrigins::Any,
            ping_interval_ms: DEFAULT_PING_INTERVAL_MS,
            relay_mode: RelayMode::Broadcast,
        }
    }
}

impl GatewayConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}
