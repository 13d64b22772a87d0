use crate::core::autostart::AutostartEntry;
use crate::core::settings::Settings;
use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum AutostartAction {
    /// Start the daemon at login
    Enable,
    /// Stop starting the daemon at login
    Disable,
    /// Show whether start-on-boot is configured
    Status,
}

pub fn run(action: AutostartAction) -> Result<()> {
    let config = Settings::config_path().context("Could not determine config directory")?;
    let entry = AutostartEntry::new(
        AutostartEntry::default_path().context("Could not determine autostart directory")?,
    );

    match action {
        AutostartAction::Enable => {
            let exe = std::env::current_exe().context("Could not locate the running binary")?;
            set_start_on_boot(&config, &entry, Some(&exe))?;
        }
        AutostartAction::Disable => set_start_on_boot(&config, &entry, None)?,
        AutostartAction::Status => {}
    }

    let settings = Settings::load_from(&config)?;
    println!("{}", status_line(&settings, &entry));
    Ok(())
}

/// Writes the entry for `exe`, or removes it when `exe` is `None`, then
/// stores the matching `start_on_boot` value in the config at `config`.
fn set_start_on_boot(config: &Path, entry: &AutostartEntry, exe: Option<&Path>) -> Result<()> {
    let mut settings = Settings::load_from(config)?;
    match exe {
        Some(exe) => entry.enable(exe)?,
        None => entry.disable()?,
    }
    settings.start_on_boot = exe.is_some();
    settings.save_to(config)
}

fn status_line(settings: &Settings, entry: &AutostartEntry) -> String {
    match (settings.start_on_boot, entry.is_enabled()) {
        (true, true) => format!("Start on boot: enabled ({})", entry.path().display()),
        (true, false) => format!(
            "Start on boot: enabled, entry missing at {} (the daemon restores it on next launch)",
            entry.path().display()
        ),
        (false, true) => format!(
            "Start on boot: disabled, but an entry exists at {}",
            entry.path().display()
        ),
        (false, false) => "Start on boot: disabled".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, std::path::PathBuf, AutostartEntry) {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("claude-tracker").join("config.toml");
        let entry = AutostartEntry::new(dir.path().join("autostart").join("claude-tracker.desktop"));
        (dir, config, entry)
    }

    #[test]
    fn test_enable_then_disable_updates_config_and_entry() {
        let (_dir, config, entry) = fixture();
        let mut settings = Settings::default();
        settings.refresh_interval_secs = 120;
        settings.save_to(&config).unwrap();

        set_start_on_boot(&config, &entry, Some(Path::new("/usr/bin/claude-tracker"))).unwrap();
        let loaded = Settings::load_from(&config).unwrap();
        assert!(loaded.start_on_boot);
        assert_eq!(loaded.refresh_interval_secs, 120);
        assert!(entry.is_enabled());
        assert!(status_line(&loaded, &entry).starts_with("Start on boot: enabled ("));

        set_start_on_boot(&config, &entry, None).unwrap();
        let loaded = Settings::load_from(&config).unwrap();
        assert!(!loaded.start_on_boot);
        assert!(!entry.is_enabled());
        assert_eq!(status_line(&loaded, &entry), "Start on boot: disabled");
    }

    #[test]
    fn test_status_reports_missing_entry() {
        let (_dir, _config, entry) = fixture();
        let settings = Settings {
            start_on_boot: true,
            ..Settings::default()
        };
        assert!(status_line(&settings, &entry).contains("entry missing"));
    }
}
