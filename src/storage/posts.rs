use chrono::Utc;

use super::db::Database;
use super::types::{IngestStats, NewPost, Post, PostWithFeed, StoreError};

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert one post. Returns true when a row was inserted, false when the
    /// (feed, guid) pair already existed and the insert was skipped.
    pub async fn create_post(&self, feed_id: i64, post: &NewPost) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (feed_id, guid, title, url, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, guid) DO NOTHING
        "#,
        )
        .bind(feed_id)
        .bind(&post.guid)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// Ingestion writer: persist items in sequence, one independent insert
    /// per item. Duplicates and single-row failures are counted and skipped;
    /// only an unusable connection aborts the batch (posts already inserted
    /// stay committed).
    pub async fn store_posts(
        &self,
        feed_id: i64,
        posts: &[NewPost],
    ) -> Result<IngestStats, StoreError> {
        let mut stats = IngestStats::default();

        for post in posts {
            match self.create_post(feed_id, post).await {
                Ok(true) => stats.inserted += 1,
                Ok(false) => stats.skipped += 1,
                Err(StoreError::Unavailable(e)) => return Err(StoreError::Unavailable(e)),
                Err(e) => {
                    stats.skipped += 1;
                    tracing::warn!(
                        feed_id,
                        title = %post.title,
                        error = %e,
                        "Failed to store post, continuing with batch"
                    );
                }
            }
        }

        Ok(stats)
    }

    /// All posts for one feed, newest publish date first.
    pub async fn posts_for_feed(&self, feed_id: i64) -> Result<Vec<Post>, StoreError> {
        sqlx::query_as::<_, Post>(
            r#"
            SELECT id, feed_id, guid, title, url, description, published_at, created_at, updated_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY published_at DESC, created_at DESC
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// The most recent posts from feeds the user follows, for `browse`.
    pub async fn posts_for_user(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<PostWithFeed>, StoreError> {
        sqlx::query_as::<_, PostWithFeed>(
            r#"
            SELECT p.title, p.description, p.published_at, f.name AS feed_name
            FROM posts p
            JOIN feeds f ON f.id = p.feed_id
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at DESC, p.created_at DESC
            LIMIT ?
        "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }
}
