//! Feed health tracking.
//!
//! A feed's health is its consecutive failure count, whether it is still
//! synced, and a status line describing the last failure. Transitions are
//! pure so they can be checked without a database.

/// Status prefix recorded when a fetch fails.
pub const FAILURE_STATUS: &str = "Failed to get feed items";

/// Health fields of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedHealth {
    /// Failed cycles since the last success.
    pub consecutive_failures: i32,
    /// Whether the sweep syncs the feed.
    pub sync_enabled: bool,
    /// Last failure description; empty when healthy.
    pub last_status: String,
}

/// Outcome of a sync cycle as seen by the health tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent<'a> {
    /// The cycle completed and its items were committed.
    Synced,
    /// The document could not be fetched or parsed.
    FetchFailed(&'a str),
}

impl FeedHealth {
    /// Health after a clean sync.
    pub fn healthy() -> Self {
        Self {
            consecutive_failures: 0,
            sync_enabled: true,
            last_status: String::new(),
        }
    }

    /// Apply one sync outcome.
    ///
    /// A failure that pushes the count past `threshold` disables syncing.
    /// Any success resets the count and re-enables syncing. A disabled feed
    /// is never re-enabled by a failure.
    pub fn apply(&self, event: HealthEvent<'_>, threshold: i32) -> Self {
        match event {
            HealthEvent::Synced => Self::healthy(),
            HealthEvent::FetchFailed(cause) => {
                let consecutive_failures = self.consecutive_failures.saturating_add(1);
                Self {
                    consecutive_failures,
                    sync_enabled: self.sync_enabled && consecutive_failures <= threshold,
                    last_status: format!("{}: {}", FAILURE_STATUS, cause),
                }
            }
        }
    }
}
