use crate::core::autostart::AutostartEntry;
use crate::core::credentials::CredentialStore;
use crate::core::settings::{Settings, SettingsWatcher};
use crate::daemon::dbus::{start_dbus_server, DbusCommand};
use crate::daemon::polling::{Dispatch, PollingDriver};
use crate::daemon::tray::{LogSink, SnapshotSink, TrayEvent, TrayManager};
use crate::providers::{ClaudeUsageClient, UsageSource};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

pub async fn run() -> Result<()> {
    let mut settings_watcher = SettingsWatcher::new()?;
    let settings = settings_watcher.get().await;
    settings_watcher.start_watching()?;
    let mut settings_rx = settings_watcher.subscribe();

    if settings.start_on_boot {
        restore_autostart();
    }

    let store = CredentialStore::new(settings.credentials_path());
    tracing::info!(path = %store.path().display(), "Using credentials file");
    let source: Arc<dyn UsageSource> = Arc::new(ClaudeUsageClient::new(&settings.api, store)?);

    let (tray_tx, mut tray_rx) = mpsc::unbounded_channel::<TrayEvent>();
    let sink: Box<dyn SnapshotSink> = match TrayManager::start(&settings.display, tray_tx).await {
        Ok(tray) => Box::new(tray),
        Err(e) => {
            tracing::warn!(error = %e, "Tray unavailable, logging snapshots instead");
            Box::new(LogSink::new(&settings.display))
        }
    };

    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel();
    let mut driver = PollingDriver::new(Arc::clone(&source), snapshot_tx);

    let (dbus_tx, mut dbus_rx) = mpsc::unbounded_channel::<DbusCommand>();
    let _dbus_connection = start_dbus_server(dbus_tx, driver.fetching_flag()).await?;

    driver.start(settings.refresh_interval());

    let mut current = settings;
    let mut settings_open = true;

    loop {
        tokio::select! {
            Some(snapshot) = snapshot_rx.recv() => {
                sink.on_snapshot(snapshot).await;
            }
            Some(event) = tray_rx.recv() => {
                match event {
                    TrayEvent::Refresh => request_refresh(&driver, "tray"),
                    TrayEvent::OpenDashboard => {
                        let url = source.dashboard_url();
                        tracing::info!(url, "Opening usage page");
                        if let Err(e) = open::that(url) {
                            tracing::error!(error = %e, "Failed to open browser");
                        }
                    }
                    TrayEvent::Quit => {
                        tracing::info!("Quit requested");
                        break;
                    }
                }
            }
            Some(command) = dbus_rx.recv() => {
                match command {
                    DbusCommand::Refresh => request_refresh(&driver, "dbus"),
                }
            }
            result = settings_rx.recv(), if settings_open => {
                match result {
                    Ok(new_settings) => {
                        apply_settings(&mut driver, sink.as_ref(), &current, &new_settings).await;
                        current = new_settings;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Missed settings updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::warn!("Settings watcher stopped");
                        settings_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        }
    }

    if driver.is_fetching() {
        tracing::debug!("Fetch still in flight at shutdown, result will be discarded");
    }
    driver.stop();
    sink.shutdown().await;
    Ok(())
}

/// Failures are logged; the daemon starts either way.
fn restore_autostart() {
    let Some(path) = AutostartEntry::default_path() else {
        tracing::warn!("No config directory, cannot check autostart entry");
        return;
    };
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            tracing::warn!(error = %e, "Could not locate the running binary for autostart");
            return;
        }
    };
    if let Err(e) = AutostartEntry::new(path).restore_if_missing(true, &exe) {
        tracing::warn!(error = %e, "Failed to restore autostart entry");
    }
}

fn request_refresh(driver: &PollingDriver, origin: &'static str) {
    match driver.trigger() {
        Dispatch::Started => tracing::info!(origin, "Manual refresh started"),
        Dispatch::Skipped => tracing::info!(origin, "Fetch already in flight, refresh skipped"),
    }
}

async fn apply_settings(
    driver: &mut PollingDriver,
    sink: &dyn SnapshotSink,
    old: &Settings,
    new: &Settings,
) {
    if new.refresh_interval() != driver.interval() {
        driver.reschedule(new.refresh_interval());
    }

    if new.display != old.display {
        sink.apply_display(&new.display).await;
    }

    if new.api != old.api || new.credentials != old.credentials {
        tracing::warn!("API or credentials settings changed; restart the daemon to apply them");
    }
}
