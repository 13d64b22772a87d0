use crate::core::models::UsageSnapshot;
use crate::core::settings::DisplaySettings;
use crate::icons::IconRenderer;
use crate::ui::colors::CRITICAL_THRESHOLD;
use crate::ui::format::{self, LONG_WINDOW_LABEL, SHORT_WINDOW_LABEL};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ksni::menu::{MenuItem, StandardItem};
use ksni::TrayMethods;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

const TRAY_ID: &str = "claude-tracker";
const TRAY_TITLE: &str = "Claude Tracker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    Refresh,
    OpenDashboard,
    Quit,
}

/// Receives every completed snapshot, success or failure, on the daemon loop.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn on_snapshot(&self, snapshot: UsageSnapshot);

    async fn apply_display(&self, _display: &DisplaySettings) {}

    async fn shutdown(&self) {}
}

pub struct UsageTray {
    last_snapshot: Option<UsageSnapshot>,
    show_as_remaining: bool,
    renderer: IconRenderer,
    events: mpsc::UnboundedSender<TrayEvent>,
}

impl UsageTray {
    fn new(show_as_remaining: bool, events: mpsc::UnboundedSender<TrayEvent>) -> Self {
        Self {
            last_snapshot: None,
            show_as_remaining,
            renderer: IconRenderer::new(),
            events,
        }
    }

    fn summary(&self) -> String {
        match &self.last_snapshot {
            Some(snapshot) => format::summary_line(snapshot, self.show_as_remaining),
            None => format!("{}: loading...", TRAY_TITLE),
        }
    }

    /// Informational lines at the top of the menu.
    fn status_lines(&self, now: DateTime<Utc>) -> Vec<String> {
        let Some(snapshot) = &self.last_snapshot else {
            return vec!["Waiting for first update".to_string()];
        };

        if let Some(failure) = snapshot.failure() {
            return vec![failure.message.clone(), failure.kind.hint().to_string()];
        }

        vec![
            format::window_line(
                SHORT_WINDOW_LABEL,
                snapshot.short_window(),
                self.show_as_remaining,
                now,
            ),
            format::window_line(
                LONG_WINDOW_LABEL,
                snapshot.long_window(),
                self.show_as_remaining,
                now,
            ),
        ]
    }

    fn send(&self, event: TrayEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(?event, "Daemon loop gone, dropping tray event");
        }
    }
}

impl ksni::Tray for UsageTray {
    const MENU_ON_ACTIVATE: bool = true;

    fn id(&self) -> String {
        TRAY_ID.to_string()
    }

    fn title(&self) -> String {
        self.summary()
    }

    fn icon_pixmap(&self) -> Vec<ksni::Icon> {
        let size = self.renderer.size() as i32;
        vec![ksni::Icon {
            width: size,
            height: size,
            data: self
                .renderer
                .render_argb(self.last_snapshot.as_ref(), self.show_as_remaining),
        }]
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        ksni::ToolTip {
            title: TRAY_TITLE.to_string(),
            description: self.summary(),
            ..Default::default()
        }
    }

    fn menu(&self) -> Vec<MenuItem<Self>> {
        let mut items: Vec<MenuItem<Self>> = self
            .status_lines(Utc::now())
            .into_iter()
            .map(|label| {
                StandardItem {
                    label,
                    enabled: false,
                    ..Default::default()
                }
                .into()
            })
            .collect();

        items.push(MenuItem::Separator);
        items.push(
            StandardItem {
                label: "Refresh now".to_string(),
                activate: Box::new(|tray: &mut Self| tray.send(TrayEvent::Refresh)),
                ..Default::default()
            }
            .into(),
        );
        items.push(
            StandardItem {
                label: "Open usage page".to_string(),
                activate: Box::new(|tray: &mut Self| tray.send(TrayEvent::OpenDashboard)),
                ..Default::default()
            }
            .into(),
        );
        items.push(MenuItem::Separator);
        items.push(
            StandardItem {
                label: "Quit".to_string(),
                activate: Box::new(|tray: &mut Self| tray.send(TrayEvent::Quit)),
                ..Default::default()
            }
            .into(),
        );
        items
    }
}

/// StatusNotifier tray item. Owns the last delivered snapshot for redraws.
pub struct TrayManager {
    handle: ksni::Handle<UsageTray>,
}

impl TrayManager {
    pub async fn start(
        display: &DisplaySettings,
        events: mpsc::UnboundedSender<TrayEvent>,
    ) -> Result<Self> {
        let tray = UsageTray::new(display.show_as_remaining, events);
        let handle = tray
            .spawn()
            .await
            .context("Failed to register StatusNotifier tray item")?;
        tracing::info!(id = TRAY_ID, "Tray icon registered");
        Ok(Self { handle })
    }
}

#[async_trait]
impl SnapshotSink for TrayManager {
    async fn on_snapshot(&self, snapshot: UsageSnapshot) {
        let updated = self
            .handle
            .update(move |tray| tray.last_snapshot = Some(snapshot))
            .await;
        if updated.is_none() {
            tracing::warn!("Tray service stopped, snapshot not shown");
        }
    }

    async fn apply_display(&self, display: &DisplaySettings) {
        let show_as_remaining = display.show_as_remaining;
        self.handle
            .update(move |tray| tray.show_as_remaining = show_as_remaining)
            .await;
    }

    async fn shutdown(&self) {
        self.handle.shutdown().await;
    }
}

/// Used when no StatusNotifier host is running.
pub struct LogSink {
    show_as_remaining: AtomicBool,
}

impl LogSink {
    pub fn new(display: &DisplaySettings) -> Self {
        Self {
            show_as_remaining: AtomicBool::new(display.show_as_remaining),
        }
    }
}

#[async_trait]
impl SnapshotSink for LogSink {
    async fn on_snapshot(&self, snapshot: UsageSnapshot) {
        match snapshot.failure() {
            Some(failure) => tracing::warn!(
                kind = ?failure.kind,
                error = %failure.message,
                hint = failure.kind.hint(),
                "Usage fetch failed"
            ),
            None => {
                let summary =
                    format::summary_line(&snapshot, self.show_as_remaining.load(Ordering::Relaxed));
                if snapshot.max_utilization() >= CRITICAL_THRESHOLD {
                    tracing::warn!("{}", summary);
                } else {
                    tracing::info!("{}", summary);
                }
            }
        }
    }

    async fn apply_display(&self, display: &DisplaySettings) {
        self.show_as_remaining
            .store(display.show_as_remaining, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::UsageError;
    use crate::core::models::UsageBucket;
    use ksni::Tray;

    fn tray() -> (UsageTray, mpsc::UnboundedReceiver<TrayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (UsageTray::new(false, tx), rx)
    }

    fn activate(tray: &mut UsageTray, label: &str) {
        let menu = tray.menu();
        let item = menu
            .iter()
            .find_map(|item| match item {
                MenuItem::Standard(item) if item.label == label => Some(item),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no menu item {label}"));
        (item.activate)(tray);
    }

    #[test]
    fn test_initial_state() {
        let (tray, _rx) = tray();
        assert!(tray.last_snapshot.is_none());
        assert_eq!(tray.tool_tip().description, "Claude Tracker: loading...");
        assert_eq!(tray.status_lines(Utc::now()), vec!["Waiting for first update"]);
    }

    #[test]
    fn test_snapshot_replaces_previous() {
        let (mut tray, _rx) = tray();
        tray.last_snapshot = Some(UsageSnapshot::success(
            UsageBucket::new(12.0, None),
            UsageBucket::new(3.0, None),
        ));
        tray.last_snapshot = Some(UsageSnapshot::success(
            UsageBucket::new(42.0, None),
            UsageBucket::new(10.0, None),
        ));

        assert_eq!(tray.title(), "Claude: 5H 42%  |  7D 10%");
        assert_eq!(
            tray.status_lines(Utc::now()),
            vec!["5H  42% used", "7D  10% used"]
        );
    }

    #[test]
    fn test_error_snapshot_shows_message_and_hint() {
        let (mut tray, _rx) = tray();
        tray.last_snapshot = Some(UsageSnapshot::from_error(&UsageError::Unauthorized));

        let lines = tray.status_lines(Utc::now());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Unauthorized"));
        assert_eq!(lines[1], "Run `claude` to authenticate");
        assert!(tray.tool_tip().description.starts_with("Claude: Unauthorized"));
    }

    #[test]
    fn test_show_as_remaining() {
        let (mut tray, _rx) = tray();
        tray.show_as_remaining = true;
        tray.last_snapshot = Some(UsageSnapshot::success(
            UsageBucket::new(42.0, None),
            UsageBucket::new(10.0, None),
        ));
        assert_eq!(tray.title(), "Claude: 5H 58%  |  7D 90%");
    }

    #[test]
    fn test_menu_actions_send_events() {
        let (mut tray, mut rx) = tray();

        activate(&mut tray, "Refresh now");
        activate(&mut tray, "Open usage page");
        activate(&mut tray, "Quit");

        assert_eq!(rx.try_recv().unwrap(), TrayEvent::Refresh);
        assert_eq!(rx.try_recv().unwrap(), TrayEvent::OpenDashboard);
        assert_eq!(rx.try_recv().unwrap(), TrayEvent::Quit);
    }

    #[test]
    fn test_icon_pixmap_dimensions() {
        let (tray, _rx) = tray();
        let icons = tray.icon_pixmap();
        assert_eq!(icons.len(), 1);
        assert_eq!(icons[0].width, 22);
        assert_eq!(icons[0].data.len(), 22 * 22 * 4);
    }
}
