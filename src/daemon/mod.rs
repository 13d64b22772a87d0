mod app;
mod dbus;
pub mod polling;
pub mod tray;

use anyhow::Result;

pub async fn run() -> Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting claude-tracker daemon");
    app::run().await
}
