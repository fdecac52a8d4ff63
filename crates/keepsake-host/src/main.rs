//! Keepsake host
//!
//! Speaks the length-prefixed JSON message protocol on stdin/stdout and
//! forwards every request to the router. Logs go to stderr.

mod framing;
mod session;

use std::path::PathBuf;

use anyhow::Context;
use keepsake_core::{Config, Keepsake};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    keepsake_core::init_logging();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    let limit = config.max_message_bytes;

    let keepsake = Keepsake::new(config).context("starting keepsake")?;
    tracing::info!("Keepsake host started");

    session::run(
        keepsake.router().clone(),
        tokio::io::stdin(),
        tokio::io::stdout(),
        limit,
    )
    .await
    .context("host session failed")?;

    tracing::info!("Keepsake host stopped");
    Ok(())
}
