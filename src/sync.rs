//! Bulk fetching of all missing day details of a year.

use crate::calendar::days_of_year;
use crate::day_detail::DayDetailService;
use crate::enrichment::Prompt;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Number of days fetched concurrently.
pub const BATCH_SIZE: usize = 5;

/// Progress of a running sync. Only exists while a sync is running.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub current: usize,
    pub total: usize,
}

/// Receives `Some(progress)` while a sync runs and `None` once it is idle again.
pub type ProgressReceiver = watch::Receiver<Option<SyncProgress>>;

/// How a call to [`BatchSync::sync_year`] ended.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum SyncOutcome {
    /// Another sync is running, nothing was done.
    AlreadyRunning,
    /// Every day is cached already.
    NothingToDo,
    /// No fetcher is configured, nothing could be fetched.
    Unavailable,
    /// All batches ran. Failed days stay uncached and are retried by the next sync.
    Completed { fetched: usize, failed: usize },
}

/// The exclusive right to run a sync, obtained from [`BatchSync::claim`]. Released on drop.
#[derive(Debug)]
pub struct SyncClaim(Arc<AtomicBool>);

impl Drop for SyncClaim {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Fetches all days of a year that are not cached yet, in batches of [`BATCH_SIZE`] with a pause
/// between batches. At most one sync runs at a time.
pub struct BatchSync {
    service: DayDetailService,
    batch_delay: Duration,
    running: Arc<AtomicBool>,
    progress: watch::Sender<Option<SyncProgress>>,
}

impl BatchSync {
    pub fn new(service: DayDetailService, batch_delay: Duration) -> BatchSync {
        let (progress, _) = watch::channel(None);

        BatchSync {
            service,
            batch_delay,
            running: Arc::new(AtomicBool::new(false)),
            progress,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The current progress, `None` if idle.
    pub fn progress(&self) -> Option<SyncProgress> {
        *self.progress.borrow()
    }

    /// Subscribes to progress updates.
    pub fn subscribe(&self) -> ProgressReceiver {
        self.progress.subscribe()
    }

    /// Number of days of `year` that are not cached yet.
    pub async fn pending(&self, year: i32) -> usize {
        self.service.missing(&days_of_year(year)).await.len()
    }

    /// Claims the single sync slot, `None` if a sync is running already.
    pub fn claim(&self) -> Option<SyncClaim> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| SyncClaim(self.running.clone()))
    }

    /// Fetches every uncached day of `year`, unless a sync is running already.
    pub async fn sync_year(&self, year: i32) -> SyncOutcome {
        match self.claim() {
            Some(claim) => self.run(year, claim).await,
            None => {
                log::info!("sync already running, ignoring request");
                SyncOutcome::AlreadyRunning
            }
        }
    }

    /// Fetches every uncached day of `year` under a previously obtained claim, which is released
    /// when the sync ends.
    ///
    /// Batches run strictly one after another; within a batch all requests run concurrently and
    /// are awaited regardless of failures. Failed days are logged and skipped.
    pub async fn run(&self, year: i32, claim: SyncClaim) -> SyncOutcome {
        let _claim = claim;

        let missing = self.service.missing(&days_of_year(year)).await;
        if missing.is_empty() {
            log::info!("all days of {year} are cached, nothing to sync");
            return SyncOutcome::NothingToDo;
        }

        if !self.service.is_live() {
            log::warn!("cannot sync {} days without an API key", missing.len());
            return SyncOutcome::Unavailable;
        }

        let total = missing.len();
        log::info!("syncing {total} days of {year} in batches of {BATCH_SIZE}");
        self.progress
            .send_replace(Some(SyncProgress { current: 0, total }));

        let mut current = 0;
        let mut fetched = 0;
        let mut failed = 0;
        let mut batches = missing.chunks(BATCH_SIZE).peekable();

        while let Some(batch) = batches.next() {
            let futures: Vec<_> = batch
                .iter()
                .map(|&date| async move {
                    (date, self.service.fetch_and_store(date, Prompt::Batch).await)
                })
                .collect();

            for (date, result) in futures::future::join_all(futures).await {
                match result {
                    Ok(_) => fetched += 1,
                    Err(err) => {
                        log::warn!("failed to sync details for {date}: {err}");
                        failed += 1;
                    }
                }
            }

            current += batch.len();
            self.progress
                .send_replace(Some(SyncProgress { current, total }));
            log::debug!("synced {current} of {total} days");

            if batches.peek().is_some() && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        self.progress.send_replace(None);
        log::info!("sync of {year} finished: {fetched} fetched, {failed} failed");

        SyncOutcome::Completed { fetched, failed }
    }
}
