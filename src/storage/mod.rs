mod db;
mod feeds;
mod follows;
mod posts;
mod types;
mod users;

pub use db::Database;
pub use types::{
    Feed, FeedWithOwner, FollowSummary, IngestStats, NewPost, Post, PostWithFeed, StoreError, User,
};
