use chrono::Utc;

use super::db::Database;
use super::types::{is_unique_violation, StoreError, User};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a user. Fails with `UserExists` if the name is taken.
    pub async fn create_user(&self, name: &str) -> Result<User, StoreError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING id, name, created_at, updated_at
        "#,
        )
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(e) if is_unique_violation(&e) => Err(StoreError::UserExists(name.to_string())),
            Err(e) => Err(StoreError::from_sqlx(e)),
        }
    }

    /// Look up a user by name.
    pub async fn get_user(&self, name: &str) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// List all users, alphabetically.
    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, created_at, updated_at FROM users ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from_sqlx)
    }

    /// Delete every user. Feeds, follows and posts go with them via
    /// ON DELETE CASCADE. Returns the number of users removed.
    pub async fn delete_all_users(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await
            .map_err(StoreError::from_sqlx)?;
        Ok(result.rows_affected())
    }
}
