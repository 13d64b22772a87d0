use crate::core::credentials::write_atomic;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const DESKTOP_FILE_NAME: &str = "claude-tracker.desktop";

/// XDG autostart entry that launches the daemon at login.
pub struct AutostartEntry {
    path: PathBuf,
}

impl AutostartEntry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `$XDG_CONFIG_HOME/autostart/claude-tracker.desktop`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("autostart").join(DESKTOP_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_file()
    }

    /// Writes the entry so that `exe daemon` runs at login. Overwrites any
    /// existing entry.
    pub fn enable(&self, exe: &Path) -> Result<()> {
        write_atomic(&self.path, desktop_entry(exe).as_bytes()).with_context(|| {
            format!("Failed to write autostart entry: {}", self.path.display())
        })?;
        tracing::info!(path = %self.path.display(), "Autostart enabled");
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Autostart disabled");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to remove autostart entry: {}", self.path.display())
            }),
        }
    }

    /// Re-creates the entry when `start_on_boot` is on but the file was
    /// removed behind our back. Returns true if it wrote the file.
    pub fn restore_if_missing(&self, start_on_boot: bool, exe: &Path) -> Result<bool> {
        if !start_on_boot || self.is_enabled() {
            return Ok(false);
        }
        tracing::info!(path = %self.path.display(), "Restoring missing autostart entry");
        self.enable(exe)?;
        Ok(true)
    }
}

fn desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name=Claude Tracker\n\
         Comment=Tray monitor for Claude plan usage limits\n\
         Exec=\"{}\" daemon\n\
         Terminal=false\n\
         X-GNOME-Autostart-enabled=true\n",
        exe.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(dir: &TempDir) -> AutostartEntry {
        AutostartEntry::new(dir.path().join("autostart").join(DESKTOP_FILE_NAME))
    }

    #[test]
    fn test_enable_writes_desktop_entry() {
        let dir = TempDir::new().unwrap();
        let entry = entry(&dir);
        assert!(!entry.is_enabled());

        entry.enable(Path::new("/opt/bin/claude-tracker")).unwrap();

        assert!(entry.is_enabled());
        let content = std::fs::read_to_string(entry.path()).unwrap();
        assert!(content.starts_with("[Desktop Entry]\n"));
        assert!(content.contains("Type=Application\n"));
        assert!(content.contains("Exec=\"/opt/bin/claude-tracker\" daemon\n"));
    }

    #[test]
    fn test_disable_removes_entry_and_tolerates_absence() {
        let dir = TempDir::new().unwrap();
        let entry = entry(&dir);

        entry.disable().unwrap();

        entry.enable(Path::new("/usr/bin/claude-tracker")).unwrap();
        entry.disable().unwrap();
        assert!(!entry.is_enabled());
        entry.disable().unwrap();
    }

    #[test]
    fn test_restore_if_missing() {
        let dir = TempDir::new().unwrap();
        let entry = entry(&dir);
        let exe = Path::new("/usr/bin/claude-tracker");

        assert!(!entry.restore_if_missing(false, exe).unwrap());
        assert!(!entry.is_enabled());

        assert!(entry.restore_if_missing(true, exe).unwrap());
        assert!(entry.is_enabled());

        // Present already: left untouched.
        std::fs::write(entry.path(), "[Desktop Entry]\nExec=custom\n").unwrap();
        assert!(!entry.restore_if_missing(true, exe).unwrap());
        assert_eq!(
            std::fs::read_to_string(entry.path()).unwrap(),
            "[Desktop Entry]\nExec=custom\n"
        );
    }
}
