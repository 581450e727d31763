//! Handlers for the CLI subcommands. Each is a thin layer over the storage
//! API; auth-gated handlers receive the already-resolved [`User`].

use std::path::Path;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::agg::{self, FailureMode, ParseIntervalError, TickError};
use crate::config::{Config, ConfigError};
use crate::feed::build_client;
use crate::session::SessionError;
use crate::storage::{Database, StoreError, User};
use crate::util::{validate_url, UrlValidationError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("user '{0}' does not exist")]
    UnknownUser(String),

    #[error("no feed registered with url '{0}'")]
    UnknownFeed(String),

    #[error("not following '{0}'")]
    NotFollowing(String),

    #[error(transparent)]
    NotLoggedIn(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),

    #[error(transparent)]
    InvalidInterval(#[from] ParseIntervalError),

    #[error(transparent)]
    Aggregation(#[from] TickError),

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// `register <name>`: create the user and start a session as them.
pub async fn register(
    db: &Database,
    config: &mut Config,
    config_path: &Path,
    name: &str,
) -> Result<(), CommandError> {
    let user = db.create_user(name).await?;
    config.set_current_user(&user.name, config_path)?;
    println!("Registered and logged in as {}", user.name);
    Ok(())
}

/// `login <name>`: switch the session to an existing user.
pub async fn login(
    db: &Database,
    config: &mut Config,
    config_path: &Path,
    name: &str,
) -> Result<(), CommandError> {
    let user = db
        .get_user(name)
        .await?
        .ok_or_else(|| CommandError::UnknownUser(name.to_string()))?;
    config.set_current_user(&user.name, config_path)?;
    println!("Logged in as {}", user.name);
    Ok(())
}

/// `reset`: delete all users; feeds, follows and posts cascade away.
pub async fn reset(db: &Database) -> Result<(), CommandError> {
    let removed = db.delete_all_users().await?;
    println!("Removed {} user(s)", removed);
    Ok(())
}

/// `users`: list users, marking the current session.
pub async fn users(db: &Database, config: &Config) -> Result<(), CommandError> {
    for user in db.list_users().await? {
        if config.current_user_name.as_deref() == Some(user.name.as_str()) {
            println!("* {} (current)", user.name);
        } else {
            println!("* {}", user.name);
        }
    }
    Ok(())
}

/// `addfeed <name> <url>`: register a feed for `user` and auto-follow it.
pub async fn add_feed(
    db: &Database,
    user: &User,
    name: &str,
    url: &str,
) -> Result<(), CommandError> {
    let url = validate_url(url)?;
    let feed = db.create_feed(name, url.as_str(), user.id).await?;
    db.create_follow(user.id, feed.id).await?;
    println!("Added feed '{}' ({})", feed.name, feed.url);
    Ok(())
}

/// `feeds`: list every feed with its owner.
pub async fn feeds(db: &Database) -> Result<(), CommandError> {
    for feed in db.list_feeds().await? {
        println!("{}  {}  (added by {})", feed.name, feed.url, feed.owner);
    }
    Ok(())
}

/// `follow <url>`: follow an already-registered feed.
pub async fn follow(db: &Database, user: &User, url: &str) -> Result<(), CommandError> {
    let url = validate_url(url)?;
    let feed = db
        .get_feed_by_url(url.as_str())
        .await?
        .ok_or_else(|| CommandError::UnknownFeed(url.to_string()))?;
    let summary = db.create_follow(user.id, feed.id).await?;
    println!("{} now follows '{}'", summary.user_name, summary.feed_name);
    Ok(())
}

/// `following`: names of the feeds the current user follows.
pub async fn following(db: &Database, user: &User) -> Result<(), CommandError> {
    for name in db.list_follows_for_user(user.id).await? {
        println!("* {}", name);
    }
    Ok(())
}

/// `unfollow <url>`: drop the follow relationship.
pub async fn unfollow(db: &Database, user: &User, url: &str) -> Result<(), CommandError> {
    let url = validate_url(url)?;
    let feed = db
        .get_feed_by_url(url.as_str())
        .await?
        .ok_or_else(|| CommandError::UnknownFeed(url.to_string()))?;
    if db.delete_follow(user.id, feed.id).await? {
        println!("Unfollowed '{}'", feed.name);
        Ok(())
    } else {
        Err(CommandError::NotFollowing(feed.url))
    }
}

/// `browse [limit]`: recent posts from followed feeds, newest first.
pub async fn browse(db: &Database, user: &User, limit: i64) -> Result<(), CommandError> {
    for post in db.posts_for_user(user.id, limit).await? {
        let published = post
            .published_at
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unknown date".to_string());
        println!("{} ({}, {})", post.title, post.feed_name, published);
        if let Some(description) = &post.description {
            println!("  {}", description);
        }
    }
    Ok(())
}

/// `agg <interval> [--fail-fast]`: run the poll scheduler until stopped.
///
/// The interval is parsed once here; a bad string never starts the loop.
/// Ctrl-C cancels the run, aborting an in-flight fetch promptly.
pub async fn aggregate(db: &Database, interval: &str, fail_fast: bool) -> Result<(), CommandError> {
    let interval = agg::parse_interval(interval)?;
    let client = build_client()?;
    let mode = if fail_fast {
        FailureMode::FailFast
    } else {
        FailureMode::Resilient
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, shutting down");
            signal_cancel.cancel();
        }
    });

    println!("Collecting feeds every {}", humanize(interval));
    agg::run(db, &client, interval, mode, &cancel).await?;
    Ok(())
}

fn humanize(interval: std::time::Duration) -> String {
    let secs = interval.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else if interval.subsec_millis() > 0 {
        format!("{}ms", interval.as_millis())
    } else {
        format!("{}s", secs)
    }
}
