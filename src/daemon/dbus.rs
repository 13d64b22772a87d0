use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use zbus::interface;

pub const DBUS_NAME: &str = "io.github.claude_tracker.Tracker";
pub const DBUS_PATH: &str = "/io/github/claude_tracker/Tracker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbusCommand {
    Refresh,
}

pub struct TrackerService {
    commands: mpsc::UnboundedSender<DbusCommand>,
    fetching: Arc<AtomicBool>,
}

impl TrackerService {
    pub fn new(commands: mpsc::UnboundedSender<DbusCommand>, fetching: Arc<AtomicBool>) -> Self {
        Self { commands, fetching }
    }
}

#[interface(name = "io.github.claude_tracker.Tracker")]
impl TrackerService {
    /// Requests an immediate fetch. Skipped by the daemon if one is in flight.
    async fn refresh(&self) -> zbus::fdo::Result<()> {
        tracing::info!("D-Bus Refresh called");
        self.commands
            .send(DbusCommand::Refresh)
            .map_err(|_| zbus::fdo::Error::Failed("Daemon is shutting down".to_string()))
    }

    #[zbus(property)]
    fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }
}

pub async fn start_dbus_server(
    commands: mpsc::UnboundedSender<DbusCommand>,
    fetching: Arc<AtomicBool>,
) -> Result<zbus::Connection> {
    let connection = zbus::connection::Builder::session()?
        .name(DBUS_NAME)?
        .serve_at(DBUS_PATH, TrackerService::new(commands, fetching))?
        .build()
        .await
        .context("Failed to register D-Bus service")?;

    tracing::info!(name = DBUS_NAME, path = DBUS_PATH, "D-Bus service registered");
    Ok(connection)
}
