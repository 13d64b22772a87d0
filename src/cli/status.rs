use crate::core::credentials::CredentialStore;
use crate::core::models::{UsageBucket, UsageSnapshot};
use crate::core::settings::Settings;
use crate::providers::{ClaudeUsageClient, UsageSource};
use crate::ui::format::{self, LONG_WINDOW_LABEL, SHORT_WINDOW_LABEL};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
struct StatusOutput {
    short_window: WindowStatus,
    long_window: WindowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorStatus>,
    #[serde(with = "chrono::serde::ts_seconds")]
    fetched_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct WindowStatus {
    used_percent: f64,
    remaining_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    resets_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resets_in: Option<String>,
}

#[derive(Serialize)]
struct ErrorStatus {
    kind: crate::core::error::UsageErrorKind,
    message: String,
    hint: &'static str,
}

impl StatusOutput {
    fn from_snapshot(snapshot: &UsageSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            short_window: WindowStatus::from_bucket(snapshot.short_window(), now),
            long_window: WindowStatus::from_bucket(snapshot.long_window(), now),
            error: snapshot.failure().map(|failure| ErrorStatus {
                kind: failure.kind,
                message: failure.message.clone(),
                hint: failure.kind.hint(),
            }),
            fetched_at: snapshot.fetched_at(),
        }
    }
}

impl WindowStatus {
    fn from_bucket(bucket: &UsageBucket, now: DateTime<Utc>) -> Self {
        Self {
            used_percent: bucket.utilization,
            remaining_percent: bucket.remaining_percent(),
            resets_at: bucket.resets_at,
            resets_in: bucket.time_until_reset(now),
        }
    }
}

/// Runs one fetch, including any token refresh it needs, and prints it.
pub async fn run(json: bool) -> Result<()> {
    let settings = Settings::load()?;
    let store = CredentialStore::new(settings.credentials_path());
    let client = ClaudeUsageClient::new(&settings.api, store)?;

    let snapshot = client.fetch().await;
    let now = Utc::now();

    if json {
        let output = StatusOutput::from_snapshot(&snapshot, now);
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for line in text_lines(&snapshot, settings.display.show_as_remaining, now) {
            println!("{}", line);
        }
    }

    Ok(())
}

fn text_lines(snapshot: &UsageSnapshot, show_as_remaining: bool, now: DateTime<Utc>) -> Vec<String> {
    let mut lines = vec!["Claude".to_string()];

    if let Some(failure) = snapshot.failure() {
        lines.push(format!("  Error: {}", failure.message));
        lines.push(format!("  Hint:  {}", failure.kind.hint()));
        return lines;
    }

    for (label, bucket) in [
        (SHORT_WINDOW_LABEL, snapshot.short_window()),
        (LONG_WINDOW_LABEL, snapshot.long_window()),
    ] {
        lines.push(format!(
            "  {}",
            format::window_line(label, bucket, show_as_remaining, now)
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::UsageError;
    use chrono::Duration;
    use std::path::PathBuf;

    #[test]
    fn test_json_output_for_success() {
        let now = Utc::now();
        let snapshot = UsageSnapshot::success(
            UsageBucket::new(42.0, Some(now + Duration::minutes(90))),
            UsageBucket::new(10.0, None),
        );

        let value = serde_json::to_value(StatusOutput::from_snapshot(&snapshot, now)).unwrap();

        assert_eq!(value["short_window"]["used_percent"], 42.0);
        assert_eq!(value["short_window"]["remaining_percent"], 58.0);
        assert_eq!(value["short_window"]["resets_in"], "~1h 30m");
        assert!(value["long_window"].get("resets_at").is_none());
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_json_output_for_failure() {
        let snapshot = UsageSnapshot::from_error(&UsageError::NotFound {
            path: PathBuf::from("/nowhere"),
        });

        let value =
            serde_json::to_value(StatusOutput::from_snapshot(&snapshot, Utc::now())).unwrap();

        assert_eq!(value["error"]["kind"], "not_found");
        assert_eq!(
            value["error"]["message"],
            "No credentials found. Log in to Claude Code first."
        );
        assert_eq!(value["short_window"]["used_percent"], 0.0);
        assert_eq!(value["long_window"]["used_percent"], 0.0);
    }

    #[test]
    fn test_text_lines() {
        let now = Utc::now();
        let snapshot =
            UsageSnapshot::success(UsageBucket::new(42.0, None), UsageBucket::new(10.0, None));
        assert_eq!(
            text_lines(&snapshot, false, now),
            vec!["Claude", "  5H  42% used", "  7D  10% used"]
        );

        let failed = UsageSnapshot::from_error(&UsageError::Network("timed out".into()));
        let lines = text_lines(&failed, false, now);
        assert_eq!(lines[1], "  Error: API error: timed out");
        assert_eq!(lines[2], "  Hint:  Check your network connection");
    }
}
