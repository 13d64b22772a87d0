use crate::core::credentials::{write_atomic, CredentialStore};
use anyhow::{Context, Result};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 30;

const DEFAULT_USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";
const DEFAULT_TOKEN_URL: &str = "https://api.anthropic.com/v1/oauth/token";
const DEFAULT_BETA_HEADER: &str = "oauth-2025-04-20";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub refresh_interval_secs: u64,
    pub api: ApiSettings,
    pub credentials: CredentialSettings,
    pub display: DisplaySettings,
    /// Keep an XDG autostart entry for the daemon.
    pub start_on_boot: bool,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            api: ApiSettings::default(),
            credentials: CredentialSettings::default(),
            display: DisplaySettings::default(),
            start_on_boot: false,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub usage_url: String,
    pub token_url: String,
    pub beta_header: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            usage_url: DEFAULT_USAGE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            beta_header: DEFAULT_BETA_HEADER.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub show_as_remaining: bool,
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("claude-tracker").join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        write_atomic(path, content.as_bytes())
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        tracing::info!(?path, "Saved config");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_secs < MIN_REFRESH_INTERVAL_SECS {
            anyhow::bail!(
                "refresh_interval_secs must be at least {}, got {}",
                MIN_REFRESH_INTERVAL_SECS,
                self.refresh_interval_secs
            );
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than 0");
        }
        Ok(())
    }

    /// Poll interval with the rate floor applied.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials
            .path
            .clone()
            .unwrap_or_else(CredentialStore::default_path)
    }
}

/// Holds the current settings and broadcasts a fresh copy whenever the
/// config file changes on disk.
pub struct SettingsWatcher {
    path: Option<PathBuf>,
    current: Arc<RwLock<Settings>>,
    tx: broadcast::Sender<Settings>,
    _watcher: Option<RecommendedWatcher>,
}

impl SettingsWatcher {
    pub fn new() -> Result<Self> {
        let path = Settings::config_path();
        let settings = match &path {
            Some(path) => Settings::load_from(path)?,
            None => Settings::default(),
        };
        Ok(Self::with_settings(path, settings))
    }

    pub fn with_settings(path: Option<PathBuf>, settings: Settings) -> Self {
        if let Err(e) = settings.validate() {
            tracing::warn!(error = %e, "Config has out-of-range values, applying limits");
        }
        let (tx, _) = broadcast::channel(16);
        Self {
            path,
            current: Arc::new(RwLock::new(settings)),
            tx,
            _watcher: None,
        }
    }

    pub async fn get(&self) -> Settings {
        self.current.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Settings> {
        self.tx.subscribe()
    }

    pub fn start_watching(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            tracing::warn!("No config directory, settings will not be reloaded");
            return Ok(());
        };
        let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
            return Ok(());
        };
        let parent = parent.to_path_buf();
        let file_name = file_name.to_os_string();

        std::fs::create_dir_all(&parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;

        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<()>();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let Ok(event) = res else { return };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                if event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()))
                {
                    let _ = notify_tx.send(());
                }
            },
            Config::default(),
        )?;

        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", parent.display()))?;
        tracing::info!(?parent, "Watching config directory");

        let current = Arc::clone(&self.current);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while notify_rx.recv().await.is_some() {
                tokio::time::sleep(Duration::from_millis(200)).await;
                while notify_rx.try_recv().is_ok() {}

                match Settings::load_from(&path) {
                    Ok(settings) => {
                        if let Err(e) = settings.validate() {
                            tracing::warn!(error = %e, "Reloaded config has out-of-range values");
                        }
                        let changed = {
                            let mut guard = current.write().await;
                            let changed = *guard != settings;
                            *guard = settings.clone();
                            changed
                        };
                        if changed {
                            tracing::info!("Config changed on disk");
                            let _ = tx.send(settings);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to reload config, keeping previous");
                    }
                }
            }
        });

        self._watcher = Some(watcher);
        Ok(())
    }
}
