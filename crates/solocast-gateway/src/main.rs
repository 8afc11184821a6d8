//! Solocast gateway - signaling relay for a single-sender WebRTC session.
//!
//! The gateway:
//! 1. Tracks which connected client is the sender and which are receivers
//! 2. Relays offers, answers and ICE candidates between them
//! 3. Pings every connection so idle sockets stay open

#![forbid(unsafe_code)]

use clap::Parser;
use solocast_gateway::GatewayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = GatewayConfig::parse();

    solocast_common::init_tracing_with_default("solocast_gateway=info,tower_http=info");

    solocast_gateway::run(config).await
}
