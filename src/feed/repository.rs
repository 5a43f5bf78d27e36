//! Feed and item repositories.
//!
//! Methods taking `&self` run on the pool. Associated functions taking a
//! `&mut SqliteConnection` run on the caller's transaction, which owns the
//! commit-or-rollback decision.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use super::health::FeedHealth;
use super::types::{Feed, FeedToggle, Item, ItemFilter, NewItem};
use crate::{FeedwatchError, Result};

const FEED_COLUMNS: &str =
    "id, user_id, url, follow, sync_enabled, consecutive_failures, last_status, created_at";

const ITEM_COLUMNS: &str =
    "id, feed_id, url, title, description, published_at, unread, created_at";

/// Row type for a feed.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: i64,
    user_id: i64,
    url: String,
    follow: bool,
    sync_enabled: bool,
    consecutive_failures: i32,
    last_status: String,
    created_at: String,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            user_id: row.user_id,
            url: row.url,
            follow: row.follow,
            sync_enabled: row.sync_enabled,
            consecutive_failures: row.consecutive_failures,
            last_status: row.last_status,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Row type for an item.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ItemRow {
    id: i64,
    feed_id: i64,
    url: String,
    title: String,
    description: String,
    published_at: String,
    unread: bool,
    created_at: String,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: row.id,
            feed_id: row.feed_id,
            url: row.url,
            title: row.title,
            description: row.description,
            published_at: parse_datetime(&row.published_at).unwrap_or_else(Utc::now),
            unread: row.unread,
            created_at: parse_datetime(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Subscribe `user_id` to `url`.
    pub async fn create(&self, user_id: i64, url: &str) -> Result<Feed> {
        let result = sqlx::query("INSERT INTO feeds (user_id, url) VALUES (?, ?)")
            .bind(user_id)
            .bind(url)
            .execute(self.pool)
            .await?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| FeedwatchError::NotFound("feed".to_string()))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Feed::from))
    }

    /// Get a feed by ID if it belongs to `user_id`.
    pub async fn get_owned(&self, user_id: i64, id: i64) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Feed::from))
    }

    /// Get the feed `user_id` has subscribed at `url`.
    pub async fn get_by_user_url(&self, user_id: i64, url: &str) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE user_id = ? AND url = ?"
        ))
        .bind(user_id)
        .bind(url)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Feed::from))
    }

    /// List feeds owned by `user_id` in subscription order.
    pub async fn list_by_user(&self, user_id: i64) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE user_id = ? ORDER BY id ASC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// List every feed the sweep should sync.
    pub async fn list_sync_enabled(&self) -> Result<Vec<Feed>> {
        let rows = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE sync_enabled = 1 ORDER BY id ASC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Read a feed's health fields inside a transaction.
    pub async fn health_of(conn: &mut SqliteConnection, id: i64) -> Result<Option<FeedHealth>> {
        let row: Option<(i32, bool, String)> = sqlx::query_as(
            "SELECT consecutive_failures, sync_enabled, last_status FROM feeds WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(
            |(consecutive_failures, sync_enabled, last_status)| FeedHealth {
                consecutive_failures,
                sync_enabled,
                last_status,
            },
        ))
    }

    /// Write a feed's health fields inside a transaction.
    pub async fn update_health(
        conn: &mut SqliteConnection,
        id: i64,
        health: &FeedHealth,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE feeds
             SET consecutive_failures = ?, sync_enabled = ?, last_status = ?
             WHERE id = ?",
        )
        .bind(health.consecutive_failures)
        .bind(health.sync_enabled)
        .bind(&health.last_status)
        .bind(id)
        .execute(conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(FeedwatchError::NotFound(format!("feed {}", id)));
        }
        Ok(())
    }

    /// Apply a follow/sync toggle to a feed owned by `user_id`.
    ///
    /// Returns false if no such feed exists for the owner.
    pub async fn apply_toggle(
        conn: &mut SqliteConnection,
        user_id: i64,
        toggle: &FeedToggle,
    ) -> Result<bool> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE feeds SET follow = ");
        query.push_bind(toggle.follow);

        if let Some(sync) = toggle.sync {
            query.push(", sync_enabled = ");
            query.push_bind(sync);
        }

        query.push(" WHERE id = ");
        query.push_bind(toggle.id);
        query.push(" AND user_id = ");
        query.push_bind(user_id);

        let result = query.build().execute(conn).await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Repository for item operations.
pub struct ItemRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ItemRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Check inside a transaction whether any feed already has an item at `url`.
    pub async fn url_exists(conn: &mut SqliteConnection, url: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE url = ?)")
            .bind(url)
            .fetch_one(conn)
            .await?;
        Ok(exists)
    }

    /// Insert staged items inside a transaction.
    ///
    /// Stops at the first failing row; the caller rolls back.
    pub async fn insert_items(conn: &mut SqliteConnection, items: &[NewItem]) -> Result<u64> {
        let mut inserted = 0;
        for item in items {
            sqlx::query(
                "INSERT INTO items (feed_id, url, title, description, published_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(item.feed_id)
            .bind(&item.url)
            .bind(&item.title)
            .bind(&item.description)
            .bind(format_datetime(&item.published_at))
            .execute(&mut *conn)
            .await?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Get an item by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Item::from))
    }

    /// List a feed's items, newest first.
    pub async fn list_by_feed(&self, feed_id: i64, filter: ItemFilter) -> Result<Vec<Item>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ITEM_COLUMNS} FROM items WHERE feed_id = "));
        query.push_bind(feed_id);

        match filter {
            ItemFilter::All => {}
            ItemFilter::Unread => {
                query.push(" AND unread = 1");
            }
            ItemFilter::Read => {
                query.push(" AND unread = 0");
            }
        }

        query.push(" ORDER BY published_at DESC, id DESC");

        let rows = query
            .build_query_as::<ItemRow>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(Item::from).collect())
    }

    /// Count a feed's items.
    pub async fn count_by_feed(&self, feed_id: i64) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count.0)
    }

    /// Mark an item as read.
    pub async fn mark_read(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE items SET unread = 0 WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Format a timestamp for storage; the fixed UTC form sorts lexically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime('now') format
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserRepository;
    use crate::Database;
    use chrono::TimeZone;

    async fn setup() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let user = UserRepository::new(db.pool())
            .create("owner@example.com")
            .await
            .unwrap();
        (db, user.id)
    }

    fn new_item(feed_id: i64, url: &str, day: u32) -> NewItem {
        NewItem {
            feed_id,
            url: url.to_string(),
            title: format!("Title {}", day),
            description: String::new(),
            published_at: Utc.with_ymd_and_hms(2024, 1, day, 8, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_feed_defaults() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(db.pool());

        let feed = repo.create(user_id, "https://example.com/rss").await.unwrap();
        assert!(feed.id > 0);
        assert_eq!(feed.user_id, user_id);
        assert!(feed.follow);
        assert!(feed.sync_enabled);
        assert_eq!(feed.consecutive_failures, 0);
        assert!(feed.last_status.is_empty());
    }

    #[tokio::test]
    async fn test_feed_url_unique_per_owner() {
        let (db, user_id) = setup().await;
        let other = UserRepository::new(db.pool())
            .create("other@example.com")
            .await
            .unwrap();
        let repo = FeedRepository::new(db.pool());

        repo.create(user_id, "https://example.com/rss").await.unwrap();
        assert!(repo.create(user_id, "https://example.com/rss").await.is_err());
        assert!(repo.create(other.id, "https://example.com/rss").await.is_ok());
    }

    #[tokio::test]
    async fn test_get_owned_hides_foreign_feeds() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(db.pool());
        let feed = repo.create(user_id, "https://example.com/rss").await.unwrap();

        assert!(repo.get_owned(user_id, feed.id).await.unwrap().is_some());
        assert!(repo.get_owned(user_id + 1, feed.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_health_and_list_sync_enabled() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(db.pool());
        let a = repo.create(user_id, "https://a.example.com/rss").await.unwrap();
        let b = repo.create(user_id, "https://b.example.com/rss").await.unwrap();

        let disabled = FeedHealth {
            consecutive_failures: 4,
            sync_enabled: false,
            last_status: "Failed to get feed items: boom".to_string(),
        };
        let mut tx = db.begin().await.unwrap();
        FeedRepository::update_health(&mut tx, a.id, &disabled)
            .await
            .unwrap();
        let health = FeedRepository::health_of(&mut tx, a.id).await.unwrap();
        assert_eq!(health, Some(disabled));
        tx.commit().await.unwrap();

        let enabled = repo.list_sync_enabled().await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, b.id);
    }

    #[tokio::test]
    async fn test_update_health_missing_feed() {
        let (db, _) = setup().await;
        let mut tx = db.begin().await.unwrap();
        let result = FeedRepository::update_health(&mut tx, 999, &FeedHealth::healthy()).await;
        assert!(matches!(result, Err(FeedwatchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_apply_toggle_respects_owner() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(db.pool());
        let feed = repo.create(user_id, "https://example.com/rss").await.unwrap();

        let toggle = FeedToggle {
            id: feed.id,
            follow: false,
            sync: Some(false),
        };
        let mut tx = db.begin().await.unwrap();
        assert!(!FeedRepository::apply_toggle(&mut tx, user_id + 1, &toggle)
            .await
            .unwrap());
        assert!(FeedRepository::apply_toggle(&mut tx, user_id, &toggle)
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let feed = repo.get_by_id(feed.id).await.unwrap().unwrap();
        assert!(!feed.follow);
        assert!(!feed.sync_enabled);
    }

    #[tokio::test]
    async fn test_url_exists_is_global() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(db.pool());
        let a = repo.create(user_id, "https://a.example.com/rss").await.unwrap();

        let mut tx = db.begin().await.unwrap();
        ItemRepository::insert_items(&mut tx, &[new_item(a.id, "https://example.com/p1", 1)])
            .await
            .unwrap();
        assert!(ItemRepository::url_exists(&mut tx, "https://example.com/p1")
            .await
            .unwrap());
        assert!(!ItemRepository::url_exists(&mut tx, "https://example.com/p2")
            .await
            .unwrap());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_duplicate_url_fails() {
        let (db, user_id) = setup().await;
        let repo = FeedRepository::new(db.pool());
        let a = repo.create(user_id, "https://a.example.com/rss").await.unwrap();
        let b = repo.create(user_id, "https://b.example.com/rss").await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let result = ItemRepository::insert_items(
            &mut tx,
            &[
                new_item(a.id, "https://example.com/p1", 1),
                new_item(b.id, "https://example.com/p1", 2),
            ],
        )
        .await;
        assert!(matches!(result, Err(FeedwatchError::Database(_))));
        tx.rollback().await.unwrap();

        let items = ItemRepository::new(db.pool());
        assert_eq!(items.count_by_feed(a.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_by_feed_order_and_filter() {
        let (db, user_id) = setup().await;
        let feed = FeedRepository::new(db.pool())
            .create(user_id, "https://example.com/rss")
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        ItemRepository::insert_items(
            &mut tx,
            &[
                new_item(feed.id, "https://example.com/p1", 1),
                new_item(feed.id, "https://example.com/p3", 3),
                new_item(feed.id, "https://example.com/p2", 2),
            ],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let repo = ItemRepository::new(db.pool());
        let all = repo.list_by_feed(feed.id, ItemFilter::All).await.unwrap();
        let urls: Vec<_> = all.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.com/p3",
                "https://example.com/p2",
                "https://example.com/p1"
            ]
        );
        assert!(all.iter().all(|i| i.unread));

        assert!(repo.mark_read(all[0].id).await.unwrap());

        let unread = repo.list_by_feed(feed.id, ItemFilter::Unread).await.unwrap();
        assert_eq!(unread.len(), 2);
        let read = repo.list_by_feed(feed.id, ItemFilter::Read).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].url, "https://example.com/p3");
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2024-01-15T10:30:00Z").is_some());
        assert!(parse_datetime("2024-01-15 10:30:00").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn test_format_datetime_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_datetime(&dt), "2024-05-06T07:08:09Z");
        assert_eq!(parse_datetime(&format_datetime(&dt)), Some(dt));
    }
}
