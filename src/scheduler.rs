//! Periodic background maintenance.
//!
//! The engine itself starts no tasks; a caller that wants background GC
//! sweeps registers [`GcTask`] (and usually [`DiscardSyncTask`]) on a
//! [`Scheduler`]. Each registered task gets its own timer loop; all of
//! them observe a shared shutdown flag and stop together. If the
//! scheduler is dropped without an explicit shutdown, the loops notice
//! the closed channel and exit on their own.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::EmberDb;
use crate::error::{Error, Result};
use crate::logfile::DataKind;

/// A maintenance job run on a fixed period.
#[async_trait::async_trait]
pub trait BackgroundTask: Send + Sync {
    /// Task name for logging.
    fn name(&self) -> &'static str;

    /// How often to run.
    fn interval(&self) -> Duration;

    /// One run of the task. Errors are logged, not fatal to the loop.
    async fn execute(&self) -> Result<()>;
}

/// Owns the timer loops of registered [`BackgroundTask`]s.
pub struct Scheduler {
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            handles: Mutex::new(Vec::new()),
            shutdown,
        }
    }

    /// Starts a timer loop for `task`. The first run happens one full
    /// interval after registration, not immediately.
    pub fn register<T: BackgroundTask + 'static>(&self, task: Arc<T>) {
        let mut stop = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(task.interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // consume the immediate first tick

            let mut runs = 0u64;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        runs += 1;
                        if let Err(e) = task.execute().await {
                            tracing::error!(
                                task = task.name(),
                                run = runs,
                                error = %e,
                                "background task failed"
                            );
                        }
                    }
                    // Fires on shutdown, and also when the scheduler is
                    // dropped and the channel closes.
                    _ = stop.changed() => {
                        tracing::debug!(task = task.name(), runs, "background task stopped");
                        return;
                    }
                }
            }
        });

        if let Ok(mut handles) = self.handles.lock() {
            handles.push(handle);
        }
    }

    /// Stops every task and waits for its loop to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);

        let handles = self
            .handles
            .into_inner()
            .map_err(|e| Error::Io(e.to_string()))?;
        for handle in handles {
            handle
                .await
                .map_err(|e| Error::Io(format!("task join error: {e}")))?;
        }
        Ok(())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Sweeps every data type for collectible log files.
pub struct GcTask {
    db: Arc<EmberDb>,
    interval: Duration,
    ratio: f64,
}

impl GcTask {
    /// Interval and ratio come from the database's options.
    pub fn new(db: Arc<EmberDb>) -> Self {
        let interval = db.options().log_file_gc_interval;
        let ratio = db.options().log_file_gc_ratio;
        Self {
            db,
            interval,
            ratio,
        }
    }
}

#[async_trait::async_trait]
impl BackgroundTask for GcTask {
    fn name(&self) -> &'static str {
        "log-file-gc"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<()> {
        for kind in DataKind::ALL {
            let db = Arc::clone(&self.db);
            let ratio = self.ratio;
            tokio::task::spawn_blocking(move || db.run_log_file_gc(kind, 0, ratio))
                .await
                .map_err(|e| Error::Io(format!("gc task join error: {e}")))??;
        }
        Ok(())
    }
}

/// Flushes the discard tables so GC candidate stats survive a crash.
pub struct DiscardSyncTask {
    db: Arc<EmberDb>,
    interval: Duration,
}

impl DiscardSyncTask {
    pub fn new(db: Arc<EmberDb>, interval: Duration) -> Self {
        Self { db, interval }
    }
}

#[async_trait::async_trait]
impl BackgroundTask for DiscardSyncTask {
    fn name(&self) -> &'static str {
        "discard-sync"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.sync_discards())
            .await
            .map_err(|e| Error::Io(format!("discard sync join error: {e}")))??;
        Ok(())
    }
}
