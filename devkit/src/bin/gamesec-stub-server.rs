//! Backend de démo hors-ligne pour gamesec-monitor
//!
//! GAMESEC_STUB_ADDR (défaut 127.0.0.1:5000), GAMESEC_API_TOKEN (optionnel).

use anyhow::{Context, Result};
use gamesec_devkit::StubServer;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let addr = std::env::var("GAMESEC_STUB_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string());
    let token = std::env::var("GAMESEC_API_TOKEN").ok().filter(|t| !t.trim().is_empty());

    let server = StubServer::spawn(&addr, token.as_deref())
        .await
        .context("Failed to start stub server")?;
    server.seed_demo();
    log::info!("Stub server ready at {} (token required: {})", server.base_url(), token.is_some());

    server.wait().await
}
