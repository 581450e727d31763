use sqlx::FromRow;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Store-level errors surfaced to command handlers and the scheduler.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The connection or pool itself is unusable. Callers treat this as
    /// fatal for the current batch; single-row failures use `Other`.
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("user '{0}' already exists")]
    UserExists(String),

    #[error("a feed with url '{0}' is already registered")]
    FeedExists(String),

    #[error("already following that feed")]
    DuplicateFollow,

    #[error("database migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify an sqlx error: connection-level failures become
    /// `Unavailable` so callers can tell "this row failed" apart from
    /// "the store is gone".
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_connection_error(&err) {
            StoreError::Unavailable(err)
        } else {
            StoreError::Other(err)
        }
    }
}

pub(crate) fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_)
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.is_unique_violation(),
        _ => false,
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered account. `name` is the login identity and is unique.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A registered feed source.
///
/// `last_fetched_at` is the fetch-attempt marker: NULL until the scheduler
/// first picks the feed, then monotonically non-decreasing. The selector
/// orders on it with NULL first, so never-fetched feeds have absolute
/// priority.
#[derive(Debug, Clone, FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub last_fetched_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Feed joined with its owner's name, for the `feeds` listing.
#[derive(Debug, Clone, FromRow)]
pub struct FeedWithOwner {
    pub name: String,
    pub url: String,
    pub owner: String,
}

/// Names echoed back after a follow is created.
#[derive(Debug, Clone, FromRow)]
pub struct FollowSummary {
    pub feed_name: String,
    pub user_name: String,
}

/// An item normalized for insertion as a post.
///
/// `guid` is the stable per-item dedup key; `published_at` is epoch seconds,
/// `None` when the source gave no parseable publish date.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub guid: String,
    pub title: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<i64>,
}

/// A persisted post row.
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Post joined with its feed name, for `browse`.
#[derive(Debug, Clone, FromRow)]
pub struct PostWithFeed {
    pub title: String,
    pub description: Option<String>,
    pub published_at: Option<i64>,
    pub feed_name: String,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub inserted: usize,
    pub skipped: usize,
}
