//! Feed and item types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A feed stops syncing once its consecutive failures exceed this value.
pub const FAILURE_THRESHOLD: i32 = 3;

/// Maximum length for an item description.
pub const MAX_DESCRIPTION_LENGTH: usize = 10000;

/// A subscribed feed.
#[derive(Debug, Clone)]
pub struct Feed {
    /// Feed ID.
    pub id: i64,
    /// Owning user ID.
    pub user_id: i64,
    /// Feed URL (unique per owner).
    pub url: String,
    /// Whether the owner follows this feed.
    pub follow: bool,
    /// Whether the sweep syncs this feed.
    pub sync_enabled: bool,
    /// Number of failed sync cycles since the last success.
    pub consecutive_failures: i32,
    /// Description of the last failure, empty after a success.
    pub last_status: String,
    /// When the feed was subscribed.
    pub created_at: DateTime<Utc>,
}

/// A single ingested article.
#[derive(Debug, Clone)]
pub struct Item {
    /// Item ID.
    pub id: i64,
    /// Feed this item was ingested from.
    pub feed_id: i64,
    /// Source URL; unique across all feeds.
    pub url: String,
    /// Item title.
    pub title: String,
    /// Item summary.
    pub description: String,
    /// When the item was published upstream.
    pub published_at: DateTime<Utc>,
    /// Whether the item is still unread.
    pub unread: bool,
    /// When the item was ingested.
    pub created_at: DateTime<Utc>,
}

/// An item staged for insertion.
#[derive(Debug, Clone)]
pub struct NewItem {
    /// Owning feed ID.
    pub feed_id: i64,
    /// Source URL.
    pub url: String,
    /// Item title.
    pub title: String,
    /// Item summary.
    pub description: String,
    /// Publication time.
    pub published_at: DateTime<Utc>,
}

impl NewItem {
    /// Build an item for `feed_id` from a fetched entry.
    ///
    /// Entries without a publication time are stamped with the current time.
    pub fn from_entry(feed_id: i64, entry: FetchedEntry) -> Self {
        Self {
            feed_id,
            url: entry.link,
            title: entry.title,
            description: entry.summary,
            published_at: entry.published.unwrap_or_else(Utc::now),
        }
    }
}

/// Read-state filter for item listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemFilter {
    /// Every item.
    #[default]
    All,
    /// Only unread items.
    Unread,
    /// Only read items.
    Read,
}

/// One entry as returned by the feed parser.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedEntry {
    /// Entry link, used as the dedup key.
    pub link: String,
    /// Entry title.
    pub title: String,
    /// Entry summary with markup stripped.
    pub summary: String,
    /// Publication time, if the feed carried one.
    pub published: Option<DateTime<Utc>>,
}

impl FetchedEntry {
    /// Create an entry.
    pub fn new(link: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            title: title.into(),
            summary: String::new(),
            published: None,
        }
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the publication time.
    pub fn with_published(mut self, published: DateTime<Utc>) -> Self {
        self.published = Some(published);
        self
    }
}

/// Result of fetching one feed document.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The document was fetched and parsed; entries are in document order.
    Ok(Vec<FetchedEntry>),
    /// The document could not be fetched or parsed.
    Malformed(String),
}

/// Follow/sync toggle for one feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedToggle {
    /// Feed ID.
    pub id: i64,
    /// New follow state.
    pub follow: bool,
    /// New sync state; `Some(true)` re-enables a disabled feed.
    #[serde(default)]
    pub sync: Option<bool>,
}
