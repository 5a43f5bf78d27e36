//! Feed subscription and sync module for feedwatch.
//!
//! This module provides feed fetching, item storage, the sync engine and
//! its periodic scheduler, and owner-scoped feed operations.

pub mod fetcher;
pub mod health;
pub mod repository;
pub mod scheduler;
pub mod service;
pub mod sync;
pub mod types;

pub use fetcher::{parse_feed, validate_scheme, validate_url, FeedFetcher, FeedSource};
pub use health::{FeedHealth, HealthEvent, FAILURE_STATUS};
pub use repository::{FeedRepository, ItemRepository};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use service::{FeedService, SubscribeOutcome};
pub use sync::{SweepReport, SyncEngine, SyncError, SyncSettings};
pub use types::{
    FeedToggle, FetchOutcome, FetchedEntry, Feed, Item, ItemFilter, NewItem, FAILURE_THRESHOLD,
    MAX_DESCRIPTION_LENGTH,
};
