use crate::core::error::{UsageError, UsageErrorKind};
use chrono::{DateTime, Utc};

/// One rolling quota window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageBucket {
    /// Percent of the window consumed, 0-100 as reported by the server.
    pub utilization: f64,
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageBucket {
    pub fn new(utilization: f64, resets_at: Option<DateTime<Utc>>) -> Self {
        Self {
            utilization,
            resets_at,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn remaining_percent(&self) -> f64 {
        (100.0 - self.utilization).max(0.0)
    }

    pub fn displayed_percent(&self, show_as_remaining: bool) -> f64 {
        if show_as_remaining {
            self.remaining_percent()
        } else {
            self.utilization
        }
    }

    /// Human readable time until the window resets, relative to `now`.
    ///
    /// Always computed at display time so a redraw without a new fetch
    /// still shows a current countdown.
    pub fn time_until_reset(&self, now: DateTime<Utc>) -> Option<String> {
        self.resets_at.map(|resets_at| format_reset_in(resets_at, now))
    }
}

pub fn format_reset_in(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total_seconds = resets_at.signed_duration_since(now).num_seconds().max(0);
    if total_seconds == 0 {
        return "now".to_string();
    }

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;

    if hours >= 24 {
        format!("~{}d {}h", hours / 24, hours % 24)
    } else if hours > 0 {
        format!("~{}h {}m", hours, minutes)
    } else {
        format!("~{}m", minutes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub kind: UsageErrorKind,
    pub message: String,
}

impl From<&UsageError> for FetchFailure {
    fn from(err: &UsageError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of one fetch cycle. Replaces the previous snapshot wholesale.
///
/// A failed snapshot always carries zeroed buckets; the constructors are the
/// only way to build one so the two states cannot be mixed.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSnapshot {
    short_window: UsageBucket,
    long_window: UsageBucket,
    failure: Option<FetchFailure>,
    fetched_at: DateTime<Utc>,
}

impl UsageSnapshot {
    pub fn success(short_window: UsageBucket, long_window: UsageBucket) -> Self {
        Self {
            short_window,
            long_window,
            failure: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn failed(failure: FetchFailure) -> Self {
        Self {
            short_window: UsageBucket::empty(),
            long_window: UsageBucket::empty(),
            failure: Some(failure),
            fetched_at: Utc::now(),
        }
    }

    pub fn from_error(err: &UsageError) -> Self {
        Self::failed(FetchFailure::from(err))
    }

    pub fn short_window(&self) -> &UsageBucket {
        &self.short_window
    }

    pub fn long_window(&self) -> &UsageBucket {
        &self.long_window
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        self.failure.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.message.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.failure.is_some()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn max_utilization(&self) -> f64 {
        self.short_window
            .utilization
            .max(self.long_window.utilization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_reset_formatting() {
        let now = now();
        assert_eq!(format_reset_in(now, now), "now");
        assert_eq!(format_reset_in(now - Duration::minutes(5), now), "now");
        assert_eq!(format_reset_in(now + Duration::minutes(42), now), "~42m");
        assert_eq!(
            format_reset_in(now + Duration::hours(2) + Duration::minutes(14), now),
            "~2h 14m"
        );
        assert_eq!(
            format_reset_in(now + Duration::days(3) + Duration::hours(5), now),
            "~3d 5h"
        );
    }

    #[test]
    fn test_time_until_reset_is_relative_to_given_now() {
        let bucket = UsageBucket::new(10.0, Some(now() + Duration::hours(1)));
        assert_eq!(bucket.time_until_reset(now()).as_deref(), Some("~1h 0m"));
        assert_eq!(
            bucket
                .time_until_reset(now() + Duration::minutes(30))
                .as_deref(),
            Some("~30m")
        );
        assert_eq!(UsageBucket::empty().time_until_reset(now()), None);
    }

    #[test]
    fn test_failed_snapshot_has_zeroed_buckets() {
        let snapshot = UsageSnapshot::from_error(&UsageError::Unauthorized);
        assert!(snapshot.is_error());
        assert_eq!(snapshot.short_window(), &UsageBucket::empty());
        assert_eq!(snapshot.long_window(), &UsageBucket::empty());
        assert_eq!(
            snapshot.failure().map(|f| f.kind),
            Some(UsageErrorKind::Unauthorized)
        );
    }

    #[test]
    fn test_remaining_percent() {
        let bucket = UsageBucket::new(75.0, None);
        assert!((bucket.remaining_percent() - 25.0).abs() < f64::EPSILON);
        assert!((bucket.displayed_percent(true) - 25.0).abs() < f64::EPSILON);
        assert!((bucket.displayed_percent(false) - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_max_utilization() {
        let snapshot =
            UsageSnapshot::success(UsageBucket::new(42.0, None), UsageBucket::new(80.0, None));
        assert!(!snapshot.is_error());
        assert!((snapshot.max_utilization() - 80.0).abs() < f64::EPSILON);
    }
}
