use crate::core::models::UsageSnapshot;
use crate::core::settings::MIN_REFRESH_INTERVAL_SECS;
use crate::providers::UsageSource;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(MIN_REFRESH_INTERVAL_SECS);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Started,
    /// A fetch is already outstanding, or the driver is stopped.
    Skipped,
}

/// Clears the in-flight flag when the fetch task ends, even by panic.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
struct Dispatcher {
    source: Arc<dyn UsageSource>,
    results: mpsc::UnboundedSender<UsageSnapshot>,
    in_flight: Arc<AtomicBool>,
    /// Cleared by `stop`, set by `start`. Checked when a fetch completes, so a
    /// fetch that outlives a stop/start pair is delivered to the new run.
    delivering: Arc<AtomicBool>,
}

impl Dispatcher {
    fn dispatch(&self) -> Dispatch {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Previous fetch still in flight, skipping");
            return Dispatch::Skipped;
        }

        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let source = Arc::clone(&self.source);
        let results = self.results.clone();
        let delivering = Arc::clone(&self.delivering);

        tokio::spawn(async move {
            let _guard = guard;
            let snapshot = source.fetch().await;
            if !delivering.load(Ordering::Acquire) {
                tracing::debug!("Polling stopped during fetch, discarding result");
                return;
            }
            if results.send(snapshot).is_err() {
                tracing::debug!("Snapshot receiver closed, discarding result");
            }
        });

        Dispatch::Started
    }
}

/// Runs a [`UsageSource`] on a fixed interval without blocking the caller.
///
/// Snapshots arrive on the channel given to [`PollingDriver::new`]. At most
/// one fetch is outstanding at a time; ticks that land while one is running
/// are skipped rather than queued.
pub struct PollingDriver {
    dispatcher: Dispatcher,
    timer: Option<JoinHandle<()>>,
    interval: Duration,
}

impl PollingDriver {
    pub fn new(source: Arc<dyn UsageSource>, results: mpsc::UnboundedSender<UsageSnapshot>) -> Self {
        Self {
            dispatcher: Dispatcher {
                source,
                results,
                in_flight: Arc::new(AtomicBool::new(false)),
                delivering: Arc::new(AtomicBool::new(false)),
            },
            timer: None,
            interval: MIN_POLL_INTERVAL,
        }
    }

    /// Fetches now, then every `interval` (never less than 30s).
    ///
    /// If a fetch from before a `stop` is still running, no second one is
    /// issued; its snapshot is delivered instead of being discarded.
    pub fn start(&mut self, interval: Duration) {
        self.cancel_timer();
        self.interval = clamp_interval(interval);
        self.dispatcher.delivering.store(true, Ordering::Release);
        if self.is_fetching() {
            tracing::debug!("Fetch from previous run still in flight, adopting its result");
        }
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            source = self.dispatcher.source.name(),
            "Polling started"
        );
        self.timer = Some(self.spawn_timer(Instant::now()));
    }

    /// Restarts the timer with a new period. The next fetch happens one full
    /// period from now; an outstanding fetch is left alone.
    pub fn reschedule(&mut self, interval: Duration) {
        let interval = clamp_interval(interval);
        if self.timer.is_none() {
            tracing::debug!("Polling not running, storing interval only");
            self.interval = interval;
            return;
        }

        self.cancel_timer();
        self.interval = interval;
        self.timer = Some(self.spawn_timer(Instant::now() + interval));
        tracing::info!(interval_secs = interval.as_secs(), "Polling rescheduled");
    }

    /// Cancels the timer. A fetch already on the wire finishes, but its
    /// snapshot is discarded unless `start` is called again first.
    pub fn stop(&mut self) {
        if self.cancel_timer() {
            self.dispatcher.delivering.store(false, Ordering::Release);
            tracing::info!("Polling stopped");
        }
    }

    /// On-demand fetch, subject to the same overlap rule as timer ticks.
    pub fn trigger(&self) -> Dispatch {
        if !self.is_running() {
            tracing::debug!("Polling not running, ignoring refresh request");
            return Dispatch::Skipped;
        }
        self.dispatcher.dispatch()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    pub fn is_fetching(&self) -> bool {
        self.dispatcher.in_flight.load(Ordering::Acquire)
    }

    /// Shared view of the in-flight flag, for status reporting.
    pub fn fetching_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.dispatcher.in_flight)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn spawn_timer(&self, first_tick: Instant) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                dispatcher.dispatch();
            }
        })
    }

    fn cancel_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for PollingDriver {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

fn clamp_interval(interval: Duration) -> Duration {
    if interval < MIN_POLL_INTERVAL {
        tracing::warn!(
            requested_secs = interval.as_secs(),
            min_secs = MIN_POLL_INTERVAL.as_secs(),
            "Poll interval below minimum, using minimum"
        );
        MIN_POLL_INTERVAL
    } else {
        interval
    }
}
