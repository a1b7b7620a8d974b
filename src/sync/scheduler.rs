use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::{RefreshSummary, SyncEngine};

/// Re-synchronizes every tracked repository on a fixed interval.
///
/// Runs are not cancelled. If one run outlasts the interval the missed tick
/// is skipped rather than starting a second, overlapping run.
pub struct RefreshScheduler {
    engine: SyncEngine,
    interval: Duration,
    run_immediately: bool,
}

impl RefreshScheduler {
    pub fn new(engine: SyncEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            run_immediately: false,
        }
    }

    /// Do a first run right away instead of waiting one interval.
    pub fn run_immediately(mut self, enabled: bool) -> Self {
        self.run_immediately = enabled;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let start = if self.run_immediately {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut ticker = time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Periodic repository refresh scheduled"
        );

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    pub async fn run_once(&self) -> RefreshSummary {
        tracing::info!("Starting periodic repository refresh");
        let started = Instant::now();
        let summary = self.engine.refresh_all().await;

        if summary.failed.is_empty() {
            tracing::info!(
                refreshed = summary.refreshed,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Periodic refresh completed"
            );
        } else {
            tracing::warn!(
                refreshed = summary.refreshed,
                failed = summary.failed.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Periodic refresh completed with failures"
            );
        }

        if started.elapsed() > self.interval {
            tracing::warn!("Refresh took longer than the refresh interval; next run skipped");
        }
        summary
    }
}
