//! Periodic auto-sync.
//!
//! A single background task ticks at the configured interval, with the
//! first run one full interval after start (never at startup). A tick that
//! finds the engine busy is skipped with a log line; completed runs are
//! summarized to the admin notifier when one is attached.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lingo::host::AdminNotifier;
use parking_lot::Mutex;
use tokio::time::{Instant, interval_at};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::SyncTrigger;

/// The running auto-sync loop.
pub struct AutoSyncScheduler {
    handle: JoinHandle<()>,
    last_run: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl AutoSyncScheduler {
    /// Start ticking every `interval_minutes`.
    pub fn start(
        trigger: Arc<dyn SyncTrigger>,
        interval_minutes: u64,
        notifier: Option<Arc<dyn AdminNotifier>>,
    ) -> Self {
        Self::start_with_period(
            trigger,
            Duration::from_secs(interval_minutes * 60),
            notifier,
        )
    }

    /// Start with an explicit period; the first tick fires one period from
    /// now.
    pub fn start_with_period(
        trigger: Arc<dyn SyncTrigger>,
        period: Duration,
        notifier: Option<Arc<dyn AdminNotifier>>,
    ) -> Self {
        let last_run = Arc::new(Mutex::new(None));
        let task_last_run = Arc::clone(&last_run);
        let handle = tokio::spawn(async move {
            let start = Instant::now() + period;
            let mut ticker = interval_at(start, period);
            loop {
                ticker.tick().await;
                if trigger.is_busy() {
                    info!("auto-sync tick skipped, sync already in progress");
                    continue;
                }
                debug!("auto-sync tick");
                trigger.trigger_full_sync().await;
                let finished = Utc::now();
                *task_last_run.lock() = Some(finished);
                if let Some(notifier) = &notifier {
                    notifier
                        .notify(&format!(
                            "auto-sync completed at {}",
                            finished.format("%Y-%m-%d %H:%M:%S UTC")
                        ))
                        .await;
                }
            }
        });
        info!(period_secs = period.as_secs(), "auto-sync scheduler started");
        Self { handle, last_run }
    }

    /// When the last full run completed, if any.
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.lock()
    }

    /// Stop ticking.
    pub fn stop(self) {
        self.handle.abort();
        info!("auto-sync scheduler stopped");
    }
}
