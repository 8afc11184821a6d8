pub mod config;
pub mod heartbeat;
pub mod router;
pub mod security;
pub mod server;
pub mod signal;

pub use config::GatewayConfig;
pub use router::{ClientRole, RelayMode, SessionSnapshot, SignalRouter};
pub use security::AllowedOrigins;
pub use server::{app, run, serve, AppState};
pub use signal::Signaler;
