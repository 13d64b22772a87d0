use crate::core::models::{UsageBucket, UsageSnapshot};
use chrono::{DateTime, Utc};

pub const SHORT_WINDOW_LABEL: &str = "5H";
pub const LONG_WINDOW_LABEL: &str = "7D";

/// One-line summary used for the tray tooltip and title.
pub fn summary_line(snapshot: &UsageSnapshot, show_as_remaining: bool) -> String {
    if let Some(error) = snapshot.error() {
        return format!("Claude: {}", error);
    }

    format!(
        "Claude: {} {:.0}%  |  {} {:.0}%",
        SHORT_WINDOW_LABEL,
        snapshot.short_window().displayed_percent(show_as_remaining),
        LONG_WINDOW_LABEL,
        snapshot.long_window().displayed_percent(show_as_remaining),
    )
}

/// Menu or status line for a single window, e.g. `5H  42% used, resets ~2h 3m`.
pub fn window_line(
    label: &str,
    bucket: &UsageBucket,
    show_as_remaining: bool,
    now: DateTime<Utc>,
) -> String {
    let suffix = if show_as_remaining { "left" } else { "used" };
    let mut line = format!(
        "{}  {:.0}% {}",
        label,
        bucket.displayed_percent(show_as_remaining),
        suffix
    );
    if let Some(reset) = bucket.time_until_reset(now) {
        line.push_str(", resets ");
        line.push_str(&reset);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::UsageError;
    use chrono::Duration;
    use std::path::PathBuf;

    #[test]
    fn test_summary_line() {
        let snapshot =
            UsageSnapshot::success(UsageBucket::new(42.4, None), UsageBucket::new(9.6, None));
        assert_eq!(
            summary_line(&snapshot, false),
            "Claude: 5H 42%  |  7D 10%"
        );
        assert_eq!(summary_line(&snapshot, true), "Claude: 5H 58%  |  7D 90%");
    }

    #[test]
    fn test_summary_line_shows_error() {
        let snapshot = UsageSnapshot::from_error(&UsageError::NotFound {
            path: PathBuf::from("/nowhere"),
        });
        let line = summary_line(&snapshot, false);
        assert!(line.starts_with("Claude: No credentials found"));
    }

    #[test]
    fn test_window_line() {
        let now = Utc::now();
        let bucket = UsageBucket::new(42.0, Some(now + Duration::minutes(123) + Duration::seconds(5)));
        assert_eq!(
            window_line("5H", &bucket, false, now),
            "5H  42% used, resets ~2h 3m"
        );

        let no_reset = UsageBucket::new(10.0, None);
        assert_eq!(window_line("7D", &no_reset, true, now), "7D  90% left");
    }
}
