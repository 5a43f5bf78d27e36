//! Feed sync engine.
//!
//! One sync cycle fetches a feed, stages the entries whose URL is not yet
//! stored, and commits them together with the feed's health update. A cycle
//! either commits a clean success or records exactly one more failure; any
//! persistence error rolls the whole cycle back.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqliteConnection;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::fetcher::FeedSource;
use super::health::{FeedHealth, HealthEvent};
use super::repository::{FeedRepository, ItemRepository};
use super::types::{Feed, FetchOutcome, FetchedEntry, NewItem, FAILURE_THRESHOLD};
use crate::config::SyncConfig;
use crate::db::{Database, DbTransaction};
use crate::FeedwatchError;

/// Why a sync cycle did not add items.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The feed could not be fetched or parsed. The failure was recorded
    /// in the feed's health.
    #[error("{0}")]
    Malformed(String),

    /// Reading or writing the store failed; nothing from the cycle was kept.
    #[error(transparent)]
    Persistence(#[from] FeedwatchError),
}

/// Tunables for the sync engine.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Failures beyond this count disable syncing.
    pub failure_threshold: i32,
    /// Skip entries whose URL is already stored.
    pub prevent_duplication: bool,
    /// Upper bound for a single fetch.
    pub fetch_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            failure_threshold: FAILURE_THRESHOLD,
            prevent_duplication: true,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            prevent_duplication: config.prevent_duplication,
            fetch_timeout: config.fetch_timeout(),
        }
    }
}

/// Totals for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Feeds visited.
    pub feeds: usize,
    /// Feeds whose cycle committed.
    pub synced: usize,
    /// Feeds whose cycle failed.
    pub failed: usize,
    /// Items added across all feeds.
    pub items_added: usize,
}

/// Orchestrates sync cycles against the store.
pub struct SyncEngine {
    db: Database,
    source: Arc<dyn FeedSource>,
    settings: SyncSettings,
}

impl SyncEngine {
    /// Create an engine.
    pub fn new(db: Database, source: Arc<dyn FeedSource>, settings: SyncSettings) -> Self {
        Self {
            db,
            source,
            settings,
        }
    }

    /// Run one sync cycle with the configured dedup policy.
    ///
    /// Returns the number of items added.
    pub async fn sync_one(&self, feed: &Feed) -> Result<usize, SyncError> {
        self.sync_one_with(feed, self.settings.prevent_duplication)
            .await
    }

    /// Run one sync cycle, choosing whether already-stored URLs are skipped.
    ///
    /// With `prevent_duplication` off, an entry whose URL is stored collides
    /// with the unique index and the cycle is rolled back.
    pub async fn sync_one_with(
        &self,
        feed: &Feed,
        prevent_duplication: bool,
    ) -> Result<usize, SyncError> {
        debug!(feed_id = feed.id, url = %feed.url, "Syncing feed");

        match self.fetch(&feed.url).await {
            FetchOutcome::Malformed(cause) => {
                let health = self.record_failure(feed.id, &cause).await?;
                if health.sync_enabled {
                    warn!(
                        feed_id = feed.id,
                        failures = health.consecutive_failures,
                        "Failed to get feed items: {}",
                        cause
                    );
                } else {
                    warn!(
                        feed_id = feed.id,
                        failures = health.consecutive_failures,
                        "Feed sync disabled after repeated failures: {}",
                        cause
                    );
                }
                Err(SyncError::Malformed(cause))
            }
            FetchOutcome::Ok(entries) => {
                let added = self.ingest(feed.id, entries, prevent_duplication).await?;
                if added > 0 {
                    info!(feed_id = feed.id, added, "Feed synced");
                } else {
                    debug!(feed_id = feed.id, "Feed synced: no new items");
                }
                Ok(added)
            }
        }
    }

    /// Run a cycle for every sync-enabled feed.
    ///
    /// A failing feed never stops the sweep.
    pub async fn sweep(&self) -> SweepReport {
        let feeds = match FeedRepository::new(self.db.pool()).list_sync_enabled().await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!("Failed to list sync-enabled feeds: {}", e);
                return SweepReport::default();
            }
        };

        let mut report = SweepReport {
            feeds: feeds.len(),
            ..SweepReport::default()
        };

        for feed in &feeds {
            match self.sync_one(feed).await {
                Ok(added) => {
                    report.synced += 1;
                    report.items_added += added;
                }
                Err(SyncError::Malformed(_)) => report.failed += 1,
                Err(SyncError::Persistence(e)) => {
                    error!(feed_id = feed.id, "Feed sync rolled back: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            feeds = report.feeds,
            synced = report.synced,
            failed = report.failed,
            items_added = report.items_added,
            "Sweep finished"
        );
        report
    }

    async fn fetch(&self, url: &str) -> FetchOutcome {
        match timeout(self.settings.fetch_timeout, self.source.fetch(url)).await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::Malformed(format!(
                "fetch timed out after {}s",
                self.settings.fetch_timeout.as_secs_f32()
            )),
        }
    }

    /// Commit one more failure for the feed.
    async fn record_failure(&self, feed_id: i64, cause: &str) -> Result<FeedHealth, SyncError> {
        let mut tx = self.db.begin_immediate().await?;
        let threshold = self.settings.failure_threshold;

        let result = async {
            let current = FeedRepository::health_of(&mut tx, feed_id)
                .await?
                .ok_or_else(|| FeedwatchError::NotFound(format!("feed {}", feed_id)))?;
            let next = current.apply(HealthEvent::FetchFailed(cause), threshold);
            FeedRepository::update_health(&mut tx, feed_id, &next).await?;
            Ok::<_, FeedwatchError>(next)
        }
        .await;

        finish(tx, result).await
    }

    /// Stage new items and reset health in one transaction.
    async fn ingest(
        &self,
        feed_id: i64,
        entries: Vec<FetchedEntry>,
        prevent_duplication: bool,
    ) -> Result<usize, SyncError> {
        let mut tx = self.db.begin_immediate().await?;

        let threshold = self.settings.failure_threshold;

        let result = async {
            let current = FeedRepository::health_of(&mut tx, feed_id)
                .await?
                .ok_or_else(|| FeedwatchError::NotFound(format!("feed {}", feed_id)))?;
            let added = stage_items(&mut tx, feed_id, entries, prevent_duplication).await?;
            let next = current.apply(HealthEvent::Synced, threshold);
            FeedRepository::update_health(&mut tx, feed_id, &next).await?;
            Ok::<_, FeedwatchError>(added)
        }
        .await;

        finish(tx, result).await
    }
}

/// Insert entries in document order, skipping stored URLs when asked.
///
/// Each insert is visible to the next lookup, so repeats within one
/// document are skipped too.
async fn stage_items(
    conn: &mut SqliteConnection,
    feed_id: i64,
    entries: Vec<FetchedEntry>,
    prevent_duplication: bool,
) -> crate::Result<usize> {
    let mut added = 0;
    for entry in entries {
        if prevent_duplication && ItemRepository::url_exists(&mut *conn, &entry.link).await? {
            debug!(feed_id, url = %entry.link, "Skipping stored item");
            continue;
        }
        ItemRepository::insert_items(&mut *conn, &[NewItem::from_entry(feed_id, entry)]).await?;
        added += 1;
    }
    Ok(added)
}

/// Commit on success, roll back on error.
async fn finish<T>(
    tx: DbTransaction<'static>,
    result: crate::Result<T>,
) -> Result<T, SyncError> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(FeedwatchError::from)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                error!("Failed to roll back sync cycle: {}", rollback_err);
            }
            Err(SyncError::Persistence(e))
        }
    }
}
