use chrono::Utc;

use super::db::Database;
use super::types::{is_unique_violation, FollowSummary, StoreError};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Follow a feed. Fails with `DuplicateFollow` when the relationship
    /// already exists. Returns the feed and user names for display.
    pub async fn create_follow(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> Result<FollowSummary, StoreError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
        "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => return Err(StoreError::DuplicateFollow),
            Err(e) => return Err(StoreError::from_sqlx(e)),
        }

        sqlx::query_as::<_, FollowSummary>(
            r#"
            SELECT f.name AS feed_name, u.name AS user_name
            FROM feeds f, users u
            WHERE f.id = ? AND u.id = ?
        "#,
        )
        .bind(feed_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// Names of the feeds a user follows, in follow order.
    pub async fn list_follows_for_user(&self, user_id: i64) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT f.name
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY ff.id
        "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Remove a follow. Returns false when there was nothing to remove.
    pub async fn delete_follow(&self, user_id: i64, feed_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}
