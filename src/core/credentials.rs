use crate::core::error::UsageError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const DEFAULT_CREDENTIALS_PATH: &str = ".claude/.credentials.json";
const CREDENTIALS_FILE: &str = ".credentials.json";
const OAUTH_KEY: &str = "claudeAiOauth";

/// OAuth credential as stored under `claudeAiOauth`.
///
/// Fields this crate does not interpret (scopes, subscription tier, ...) are
/// kept in `extra` so a refresh writes them back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch milliseconds. A missing value reads as 0, i.e. already expired.
    #[serde(default)]
    pub expires_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credential {
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Reads and writes the Claude Code credential file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$CLAUDE_CONFIG_DIR/.credentials.json`, falling back to
    /// `~/.claude/.credentials.json`.
    pub fn default_path() -> PathBuf {
        std::env::var_os("CLAUDE_CONFIG_DIR")
            .map(|dir| PathBuf::from(dir).join(CREDENTIALS_FILE))
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|p| p.join(DEFAULT_CREDENTIALS_PATH))
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH))
            })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Credential, UsageError> {
        let document = self.read_document()?.ok_or_else(|| UsageError::NotFound {
            path: self.path.clone(),
        })?;

        let oauth = document.get(OAUTH_KEY).ok_or_else(|| {
            UsageError::Parse(format!(
                "{} has no `{OAUTH_KEY}` entry",
                self.path.display()
            ))
        })?;

        Credential::deserialize(oauth).map_err(|e| {
            UsageError::Parse(format!(
                "invalid `{OAUTH_KEY}` entry in {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Merges `credential` into the document on disk, keeping every other
    /// top-level key as it was.
    pub fn write(&self, credential: &Credential) -> Result<(), UsageError> {
        let mut document = self
            .read_document()?
            .unwrap_or_else(|| Value::Object(Map::new()));

        let Some(root) = document.as_object_mut() else {
            return Err(UsageError::Parse(format!(
                "{} is not a JSON object, refusing to overwrite",
                self.path.display()
            )));
        };

        let oauth = serde_json::to_value(credential)
            .map_err(|e| UsageError::Parse(format!("failed to encode credentials: {e}")))?;
        root.insert(OAUTH_KEY.to_string(), oauth);

        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| UsageError::Parse(format!("failed to encode credentials: {e}")))?;

        write_atomic(&self.path, content.as_bytes()).map_err(|source| UsageError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(path = %self.path.display(), "Saved refreshed credentials");
        Ok(())
    }

    fn read_document(&self) -> Result<Option<Value>, UsageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(UsageError::Parse(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            UsageError::Parse(format!("{} is not valid JSON: {e}", self.path.display()))
        })
    }
}

/// Writes to a process-unique sibling temp file and renames it over `path`,
/// so readers only ever see a complete document.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "credentials".to_string());
    let tmp_path = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    let result = write_private(&tmp_path, content).and_then(|()| std::fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }
    result
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}
