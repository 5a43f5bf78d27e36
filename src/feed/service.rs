//! Feed service for feedwatch.
//!
//! Owner-scoped feed and item operations. Every lookup is filtered by the
//! requesting user so a foreign feed looks exactly like a missing one.

use tracing::info;

use super::fetcher::validate_scheme;
use super::repository::{FeedRepository, ItemRepository};
use super::types::{Feed, FeedToggle, Item, ItemFilter};
use crate::db::Database;
use crate::{FeedwatchError, Result};

/// Result of a subscribe request.
#[derive(Debug, Clone)]
pub enum SubscribeOutcome {
    /// A new subscription was created.
    Subscribed(Feed),
    /// The user already follows this URL.
    AlreadySubscribed(Feed),
}

impl SubscribeOutcome {
    /// The subscribed feed.
    pub fn feed(&self) -> &Feed {
        match self {
            Self::Subscribed(feed) | Self::AlreadySubscribed(feed) => feed,
        }
    }
}

/// Service for feed operations.
pub struct FeedService<'a> {
    db: &'a Database,
}

impl<'a> FeedService<'a> {
    /// Create a new FeedService with the given database reference.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Subscribe a user to a feed URL.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the URL is not an http(s) URL.
    pub async fn subscribe(&self, user_id: i64, url: &str) -> Result<SubscribeOutcome> {
        let url = url.trim();
        validate_scheme(url).map_err(|e| FeedwatchError::Validation(e.to_string()))?;

        let repo = FeedRepository::new(self.db.pool());
        if let Some(feed) = repo.get_by_user_url(user_id, url).await? {
            return Ok(SubscribeOutcome::AlreadySubscribed(feed));
        }

        let feed = repo.create(user_id, url).await?;
        info!(user_id, feed_id = feed.id, url = %url, "Subscribed to feed");
        Ok(SubscribeOutcome::Subscribed(feed))
    }

    /// List a user's feeds.
    pub async fn list_feeds(&self, user_id: i64) -> Result<Vec<Feed>> {
        FeedRepository::new(self.db.pool())
            .list_by_user(user_id)
            .await
    }

    /// Get a feed owned by the user.
    pub async fn get_owned_feed(&self, user_id: i64, feed_id: i64) -> Result<Feed> {
        FeedRepository::new(self.db.pool())
            .get_owned(user_id, feed_id)
            .await?
            .ok_or_else(|| FeedwatchError::NotFound(format!("Feed with ID {}", feed_id)))
    }

    /// Apply follow/sync toggles to the user's feeds.
    ///
    /// All toggles apply or none do; an unknown or foreign feed ID aborts
    /// the batch.
    pub async fn update_feeds(&self, user_id: i64, toggles: &[FeedToggle]) -> Result<()> {
        let mut tx = self.db.begin().await?;

        for toggle in toggles {
            if !FeedRepository::apply_toggle(&mut tx, user_id, toggle).await? {
                tx.rollback().await?;
                return Err(FeedwatchError::NotFound(format!(
                    "Feed with ID {}",
                    toggle.id
                )));
            }
        }

        tx.commit().await?;
        info!(user_id, count = toggles.len(), "Feeds updated");
        Ok(())
    }

    /// List a feed's items, newest first.
    pub async fn list_items(
        &self,
        user_id: i64,
        feed_id: i64,
        filter: ItemFilter,
    ) -> Result<Vec<Item>> {
        let feed = self.get_owned_feed(user_id, feed_id).await?;
        ItemRepository::new(self.db.pool())
            .list_by_feed(feed.id, filter)
            .await
    }

    /// Mark an item as read.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown item and `Permission` when the item
    /// belongs to another user's feed.
    pub async fn mark_read(&self, user_id: i64, item_id: i64) -> Result<()> {
        let items = ItemRepository::new(self.db.pool());
        let item = items
            .get_by_id(item_id)
            .await?
            .ok_or_else(|| FeedwatchError::NotFound(format!("Item ID {}", item_id)))?;

        let feed = FeedRepository::new(self.db.pool())
            .get_by_id(item.feed_id)
            .await?
            .ok_or_else(|| FeedwatchError::NotFound(format!("Item ID {}", item_id)))?;

        if feed.user_id != user_id {
            return Err(FeedwatchError::Permission(format!(
                "User {} does not have permission.",
                user_id
            )));
        }

        items.mark_read(item.id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserRepository;
    use crate::feed::types::NewItem;
    use chrono::Utc;

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        let alice = users.create("alice@example.com").await.unwrap();
        let bob = users.create("bob@example.com").await.unwrap();
        (db, alice.id, bob.id)
    }

    async fn add_item(db: &Database, feed_id: i64, url: &str) -> i64 {
        let mut tx = db.begin().await.unwrap();
        ItemRepository::insert_items(
            &mut tx,
            &[NewItem {
                feed_id,
                url: url.to_string(),
                title: "Title".to_string(),
                description: String::new(),
                published_at: Utc::now(),
            }],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM items WHERE url = ?")
            .bind(url)
            .fetch_one(db.pool())
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_subscribe_twice() {
        let (db, alice, _) = setup().await;
        let service = FeedService::new(&db);

        let first = service
            .subscribe(alice, "https://example.com/rss")
            .await
            .unwrap();
        assert!(matches!(first, SubscribeOutcome::Subscribed(_)));

        let second = service
            .subscribe(alice, "https://example.com/rss")
            .await
            .unwrap();
        assert!(matches!(second, SubscribeOutcome::AlreadySubscribed(_)));
        assert_eq!(first.feed().id, second.feed().id);
    }

    #[tokio::test]
    async fn test_subscribe_same_url_different_users() {
        let (db, alice, bob) = setup().await;
        let service = FeedService::new(&db);

        let a = service.subscribe(alice, "https://example.com/rss").await.unwrap();
        let b = service.subscribe(bob, "https://example.com/rss").await.unwrap();
        assert!(matches!(b, SubscribeOutcome::Subscribed(_)));
        assert_ne!(a.feed().id, b.feed().id);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_bad_url() {
        let (db, alice, _) = setup().await;
        let service = FeedService::new(&db);

        for url in ["not a url", "ftp://example.com/rss"] {
            let result = service.subscribe(alice, url).await;
            assert!(matches!(result, Err(FeedwatchError::Validation(_))));
        }
        assert!(service.list_feeds(alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_feeds_is_owner_scoped() {
        let (db, alice, bob) = setup().await;
        let service = FeedService::new(&db);
        service.subscribe(alice, "https://a.example.com/rss").await.unwrap();
        service.subscribe(alice, "https://b.example.com/rss").await.unwrap();
        service.subscribe(bob, "https://c.example.com/rss").await.unwrap();

        let feeds = service.list_feeds(alice).await.unwrap();
        assert_eq!(feeds.len(), 2);
        assert!(feeds.iter().all(|f| f.user_id == alice));
    }

    #[tokio::test]
    async fn test_get_owned_feed_foreign_is_not_found() {
        let (db, alice, bob) = setup().await;
        let service = FeedService::new(&db);
        let feed = service
            .subscribe(alice, "https://example.com/rss")
            .await
            .unwrap();

        let result = service.get_owned_feed(bob, feed.feed().id).await;
        assert!(matches!(result, Err(FeedwatchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_feeds_all_or_nothing() {
        let (db, alice, bob) = setup().await;
        let service = FeedService::new(&db);
        let mine = service
            .subscribe(alice, "https://a.example.com/rss")
            .await
            .unwrap();
        let theirs = service
            .subscribe(bob, "https://b.example.com/rss")
            .await
            .unwrap();

        let toggles = vec![
            FeedToggle {
                id: mine.feed().id,
                follow: false,
                sync: None,
            },
            FeedToggle {
                id: theirs.feed().id,
                follow: false,
                sync: None,
            },
        ];
        let result = service.update_feeds(alice, &toggles).await;
        assert!(matches!(result, Err(FeedwatchError::NotFound(_))));

        let feed = service.get_owned_feed(alice, mine.feed().id).await.unwrap();
        assert!(feed.follow);
    }

    #[tokio::test]
    async fn test_update_feeds_reenables_sync() {
        let (db, alice, _) = setup().await;
        let service = FeedService::new(&db);
        let feed = service
            .subscribe(alice, "https://example.com/rss")
            .await
            .unwrap();
        let id = feed.feed().id;

        sqlx::query("UPDATE feeds SET sync_enabled = 0, consecutive_failures = 4 WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();

        service
            .update_feeds(
                alice,
                &[FeedToggle {
                    id,
                    follow: true,
                    sync: Some(true),
                }],
            )
            .await
            .unwrap();

        let feed = service.get_owned_feed(alice, id).await.unwrap();
        assert!(feed.sync_enabled);
        assert!(feed.follow);
    }

    #[tokio::test]
    async fn test_list_items_filters() {
        let (db, alice, bob) = setup().await;
        let service = FeedService::new(&db);
        let feed = service
            .subscribe(alice, "https://example.com/rss")
            .await
            .unwrap();
        let feed_id = feed.feed().id;

        let first = add_item(&db, feed_id, "https://example.com/p1").await;
        add_item(&db, feed_id, "https://example.com/p2").await;
        service.mark_read(alice, first).await.unwrap();

        let all = service.list_items(alice, feed_id, ItemFilter::All).await.unwrap();
        assert_eq!(all.len(), 2);
        let unread = service
            .list_items(alice, feed_id, ItemFilter::Unread)
            .await
            .unwrap();
        assert_eq!(unread.len(), 1);
        let read = service
            .list_items(alice, feed_id, ItemFilter::Read)
            .await
            .unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].id, first);

        let result = service.list_items(bob, feed_id, ItemFilter::All).await;
        assert!(matches!(result, Err(FeedwatchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_items_empty_feed() {
        let (db, alice, _) = setup().await;
        let service = FeedService::new(&db);
        let feed = service
            .subscribe(alice, "https://example.com/rss")
            .await
            .unwrap();

        let items = service
            .list_items(alice, feed.feed().id, ItemFilter::All)
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_permissions() {
        let (db, alice, bob) = setup().await;
        let service = FeedService::new(&db);
        let feed = service
            .subscribe(alice, "https://example.com/rss")
            .await
            .unwrap();
        let item_id = add_item(&db, feed.feed().id, "https://example.com/p1").await;

        let result = service.mark_read(bob, item_id).await;
        assert!(matches!(result, Err(FeedwatchError::Permission(_))));
        let item = ItemRepository::new(db.pool())
            .get_by_id(item_id)
            .await
            .unwrap()
            .unwrap();
        assert!(item.unread);

        let result = service.mark_read(alice, item_id + 100).await;
        assert!(matches!(result, Err(FeedwatchError::NotFound(_))));

        service.mark_read(alice, item_id).await.unwrap();
        service.mark_read(alice, item_id).await.unwrap();
        let item = ItemRepository::new(db.pool())
            .get_by_id(item_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!item.unread);
    }
}
