//! Pong Match Server
//!
//! Authoritative match server binary. Accepts WebSocket connections,
//! validates identities, and runs one simulation loop per live match.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pong_server::network::auth::AuthConfig;
use pong_server::network::server::{GameServer, ServerConfig};
use pong_server::network::sink::LoggingSink;
use pong_server::VERSION;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env().context("invalid server configuration")?;
    let auth = AuthConfig::from_env();

    info!("Pong Match Server v{}", VERSION);
    info!("Tick Rate: {} Hz", config.tick_rate);
    info!(
        "Idle eviction: {}s, reconnect grace: {}s",
        config.idle_eviction.as_secs(),
        config.reconnect_grace.as_secs()
    );
    if !auth.is_configured() {
        anyhow::bail!("no AUTH_SECRET or AUTH_PUBLIC_KEY_PEM configured");
    }

    let server = GameServer::new(config, auth, std::sync::Arc::new(LoggingSink));
    server.run().await.context("server terminated with error")
}
