//! Response DTOs for Web API.

use serde::Serialize;

use crate::feed::{Feed, Item};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Human-readable message.
    pub message: String,
}

impl MessageResponse {
    /// Create a message response.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Token type (always "bearer").
    pub token_type: String,
    /// Access token expiry in seconds.
    pub expires_in: u64,
}

// ============================================================================
// Feeds
// ============================================================================

/// Feed with its health fields.
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    /// Feed ID.
    pub id: i64,
    /// Feed URL.
    pub url: String,
    /// Whether the feed is followed.
    pub follow: bool,
    /// Whether the feed is synced.
    pub sync_enabled: bool,
    /// Failed syncs since the last success.
    pub consecutive_failures: i32,
    /// Last failure description.
    pub last_status: String,
    /// Subscription timestamp.
    pub created_at: String,
}

impl From<Feed> for FeedResponse {
    fn from(feed: Feed) -> Self {
        Self {
            id: feed.id,
            url: feed.url,
            follow: feed.follow,
            sync_enabled: feed.sync_enabled,
            consecutive_failures: feed.consecutive_failures,
            last_status: feed.last_status,
            created_at: feed.created_at.to_rfc3339(),
        }
    }
}

/// Subscribe response.
#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    /// The subscribed feed.
    pub feed: FeedResponse,
    /// Human-readable message.
    pub message: String,
}

/// Forced sync response.
#[derive(Debug, Serialize)]
pub struct ForceSyncResponse {
    /// Items added by the sync.
    pub added: usize,
    /// Human-readable message.
    pub message: String,
}

// ============================================================================
// Items
// ============================================================================

/// Item response.
#[derive(Debug, Serialize)]
pub struct ItemResponse {
    /// Item ID.
    pub id: i64,
    /// Feed ID.
    pub feed_id: i64,
    /// Item URL.
    pub url: String,
    /// Item title.
    pub title: String,
    /// Item summary.
    pub description: String,
    /// Publication timestamp.
    pub published_at: String,
    /// Whether the item is unread.
    pub unread: bool,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            feed_id: item.feed_id,
            url: item.url,
            title: item.title,
            description: item.description,
            published_at: item.published_at.to_rfc3339(),
            unread: item.unread,
        }
    }
}
