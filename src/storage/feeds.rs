use chrono::Utc;

use super::db::Database;
use super::types::{is_unique_violation, Feed, FeedWithOwner, StoreError};

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Register a feed. Fails with `FeedExists` when the URL is taken.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: i64,
    ) -> Result<Feed, StoreError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, name, url, user_id, last_fetched_at, created_at, updated_at
        "#,
        )
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(feed) => Ok(feed),
            Err(e) if is_unique_violation(&e) => Err(StoreError::FeedExists(url.to_string())),
            Err(e) => Err(StoreError::from_sqlx(e)),
        }
    }

    /// Look up a feed by its source URL.
    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, StoreError> {
        sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, name, url, user_id, last_fetched_at, created_at, updated_at
            FROM feeds
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// All feeds with their owners' names, for the `feeds` listing.
    pub async fn list_feeds(&self) -> Result<Vec<FeedWithOwner>, StoreError> {
        sqlx::query_as::<_, FeedWithOwner>(
            r#"
            SELECT f.name, f.url, u.name AS owner
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.name
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// The feed the scheduler should fetch next: smallest `last_fetched_at`
    /// with NULL (never fetched) winning outright, ties broken by lowest id
    /// so the choice is deterministic. `None` when no feeds are registered.
    pub async fn next_feed_to_fetch(&self) -> Result<Option<Feed>, StoreError> {
        sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, name, url, user_id, last_fetched_at, created_at, updated_at
            FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT 1
        "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// Record a fetch attempt by stamping `last_fetched_at`.
    ///
    /// The scheduler calls this with the current time before any network
    /// I/O, so a feed whose source keeps failing still rotates to the back
    /// of the queue instead of starving every other feed.
    pub async fn mark_feed_fetched(&self, feed_id: i64, fetched_at: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
            .bind(fetched_at)
            .bind(fetched_at)
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(())
    }
}
