//! Periodic sweep runner.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::sync::SyncEngine;

/// Runs [`SyncEngine::sweep`] on a fixed interval.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
}

impl SyncScheduler {
    /// Create a scheduler.
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Start the scheduler on its own task.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SchedulerHandle { shutdown, task }
    }

    /// Run sweeps until `shutdown` flips to true or its sender is dropped.
    ///
    /// The first sweep happens one interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Sync scheduler started (interval: {} seconds)",
            self.interval.as_secs()
        );

        let mut interval = tokio::time::interval(self.interval);
        // A sweep longer than the interval is followed by one sweep, not a burst.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first immediate tick
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!("Starting scheduled sweep");
                    self.engine.sweep().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Sync scheduler stopped");
    }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler and wait for an in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Sync scheduler task failed: {}", e);
        }
    }

    /// Whether the scheduler task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
