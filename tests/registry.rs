//! Integration tests for the registry: users, feeds, follows, posts, and
//! the selector's recency ordering.
//!
//! Each test creates its own in-memory SQLite database for isolation.

use rivulet::storage::{Database, NewPost, StoreError};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn test_post(guid: &str, title: &str, published_at: Option<i64>) -> NewPost {
    NewPost {
        guid: guid.to_string(),
        title: title.to_string(),
        url: Some(format!("https://example.com/{}", guid)),
        description: Some("Test description".to_string()),
        published_at,
    }
}

// ============================================================================
// User Tests
// ============================================================================

#[tokio::test]
async fn test_register_and_get_user() {
    let db = test_db().await;

    let user = db.create_user("ana").await.unwrap();
    assert!(user.id > 0);
    assert_eq!(user.name, "ana");

    let found = db.get_user("ana").await.unwrap().unwrap();
    assert_eq!(found.id, user.id);

    assert!(db.get_user("nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_user_rejected() {
    let db = test_db().await;

    db.create_user("ana").await.unwrap();
    let result = db.create_user("ana").await;
    assert!(matches!(result, Err(StoreError::UserExists(name)) if name == "ana"));
}

#[tokio::test]
async fn test_list_users_alphabetical() {
    let db = test_db().await;

    db.create_user("carol").await.unwrap();
    db.create_user("ana").await.unwrap();
    db.create_user("ben").await.unwrap();

    let users = db.list_users().await.unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec!["ana", "ben", "carol"]);
}

#[tokio::test]
async fn test_reset_cascades_to_feeds_follows_posts() {
    let db = test_db().await;

    let user = db.create_user("ana").await.unwrap();
    let feed = db
        .create_feed("Blog", "https://example.com/feed.xml", user.id)
        .await
        .unwrap();
    db.create_follow(user.id, feed.id).await.unwrap();
    db.store_posts(feed.id, &[test_post("g1", "Post", None)])
        .await
        .unwrap();

    let removed = db.delete_all_users().await.unwrap();
    assert_eq!(removed, 1);

    assert!(db.list_users().await.unwrap().is_empty());
    assert!(db.list_feeds().await.unwrap().is_empty());
    assert!(db.posts_for_feed(feed.id).await.unwrap().is_empty());
    assert!(db.next_feed_to_fetch().await.unwrap().is_none());
}

// ============================================================================
// Feed Tests
// ============================================================================

#[tokio::test]
async fn test_duplicate_feed_url_rejected() {
    let db = test_db().await;

    let user = db.create_user("ana").await.unwrap();
    db.create_feed("One", "https://example.com/feed.xml", user.id)
        .await
        .unwrap();
    let result = db
        .create_feed("Two", "https://example.com/feed.xml", user.id)
        .await;
    assert!(matches!(result, Err(StoreError::FeedExists(_))));
}

#[tokio::test]
async fn test_list_feeds_includes_owner() {
    let db = test_db().await;

    let ana = db.create_user("ana").await.unwrap();
    let ben = db.create_user("ben").await.unwrap();
    db.create_feed("Alpha", "https://a.example.com/rss", ana.id)
        .await
        .unwrap();
    db.create_feed("Beta", "https://b.example.com/rss", ben.id)
        .await
        .unwrap();

    let feeds = db.list_feeds().await.unwrap();
    assert_eq!(feeds.len(), 2);
    assert_eq!(feeds[0].name, "Alpha");
    assert_eq!(feeds[0].owner, "ana");
    assert_eq!(feeds[1].owner, "ben");
}

// ============================================================================
// Selector Tests
// ============================================================================

#[tokio::test]
async fn test_selector_empty_registry() {
    let db = test_db().await;
    assert!(db.next_feed_to_fetch().await.unwrap().is_none());
}

#[tokio::test]
async fn test_selector_prefers_never_fetched() {
    let db = test_db().await;
    let user = db.create_user("ana").await.unwrap();

    let fetched = db
        .create_feed("Fetched", "https://a.example.com/rss", user.id)
        .await
        .unwrap();
    let fresh = db
        .create_feed("Fresh", "https://b.example.com/rss", user.id)
        .await
        .unwrap();

    // Fetched an hour ago; the never-fetched one must win regardless
    let hour_ago = chrono::Utc::now().timestamp() - 3600;
    db.mark_feed_fetched(fetched.id, hour_ago).await.unwrap();

    let next = db.next_feed_to_fetch().await.unwrap().unwrap();
    assert_eq!(next.id, fresh.id);
}

#[tokio::test]
async fn test_selector_tie_break_is_deterministic() {
    let db = test_db().await;
    let user = db.create_user("ana").await.unwrap();

    let first = db
        .create_feed("First", "https://a.example.com/rss", user.id)
        .await
        .unwrap();
    db.create_feed("Second", "https://b.example.com/rss", user.id)
        .await
        .unwrap();

    // Both never fetched: lowest id wins
    let next = db.next_feed_to_fetch().await.unwrap().unwrap();
    assert_eq!(next.id, first.id);
}

#[tokio::test]
async fn test_selector_rotates_after_marking() {
    let db = test_db().await;
    let user = db.create_user("ana").await.unwrap();

    let a = db
        .create_feed("A", "https://a.example.com/rss", user.id)
        .await
        .unwrap();
    let b = db
        .create_feed("B", "https://b.example.com/rss", user.id)
        .await
        .unwrap();

    let next = db.next_feed_to_fetch().await.unwrap().unwrap();
    assert_eq!(next.id, a.id);
    db.mark_feed_fetched(a.id, 1_700_000_000).await.unwrap();

    // Immediately re-running returns the other feed
    let next = db.next_feed_to_fetch().await.unwrap().unwrap();
    assert_eq!(next.id, b.id);

    // Once both are stamped, the least recently fetched one wins
    db.mark_feed_fetched(b.id, 1_700_000_100).await.unwrap();
    let next = db.next_feed_to_fetch().await.unwrap().unwrap();
    assert_eq!(next.id, a.id);
}

#[tokio::test]
async fn test_selector_single_feed_repeats() {
    let db = test_db().await;
    let user = db.create_user("ana").await.unwrap();
    let only = db
        .create_feed("Only", "https://a.example.com/rss", user.id)
        .await
        .unwrap();

    db.mark_feed_fetched(only.id, 1_700_000_000).await.unwrap();
    let next = db.next_feed_to_fetch().await.unwrap().unwrap();
    assert_eq!(next.id, only.id);
}

#[tokio::test]
async fn test_marking_twice_lowers_priority_against_fetched_feeds() {
    let db = test_db().await;
    let user = db.create_user("ana").await.unwrap();

    let a = db
        .create_feed("A", "https://a.example.com/rss", user.id)
        .await
        .unwrap();
    let b = db
        .create_feed("B", "https://b.example.com/rss", user.id)
        .await
        .unwrap();

    // a at t=100, b at t=200: a is due next
    db.mark_feed_fetched(a.id, 100).await.unwrap();
    db.mark_feed_fetched(b.id, 200).await.unwrap();
    assert_eq!(db.next_feed_to_fetch().await.unwrap().unwrap().id, a.id);

    // Marking a again with a later timestamp pushes it behind b
    db.mark_feed_fetched(a.id, 300).await.unwrap();
    assert_eq!(db.next_feed_to_fetch().await.unwrap().unwrap().id, b.id);

    let stored = db
        .get_feed_by_url("https://a.example.com/rss")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.last_fetched_at, Some(300));
}

#[tokio::test]
async fn test_marked_feed_stays_behind_never_fetched() {
    let db = test_db().await;
    let user = db.create_user("ana").await.unwrap();

    let a = db
        .create_feed("A", "https://a.example.com/rss", user.id)
        .await
        .unwrap();
    let b = db
        .create_feed("B", "https://b.example.com/rss", user.id)
        .await
        .unwrap();

    db.mark_feed_fetched(a.id, 100).await.unwrap();
    db.mark_feed_fetched(a.id, 200).await.unwrap();

    // The untouched (never fetched) feed still has priority
    let next = db.next_feed_to_fetch().await.unwrap().unwrap();
    assert_eq!(next.id, b.id);
}

// ============================================================================
// Follow Tests
// ============================================================================

#[tokio::test]
async fn test_follow_lifecycle() {
    let db = test_db().await;
    let ana = db.create_user("ana").await.unwrap();
    let ben = db.create_user("ben").await.unwrap();
    let feed = db
        .create_feed("Blog", "https://example.com/rss", ana.id)
        .await
        .unwrap();

    let summary = db.create_follow(ben.id, feed.id).await.unwrap();
    assert_eq!(summary.feed_name, "Blog");
    assert_eq!(summary.user_name, "ben");

    assert_eq!(db.list_follows_for_user(ben.id).await.unwrap(), vec!["Blog"]);

    assert!(db.delete_follow(ben.id, feed.id).await.unwrap());
    assert!(db.list_follows_for_user(ben.id).await.unwrap().is_empty());

    // Second delete has nothing to remove
    assert!(!db.delete_follow(ben.id, feed.id).await.unwrap());
}

#[tokio::test]
async fn test_duplicate_follow_rejected() {
    let db = test_db().await;
    let ana = db.create_user("ana").await.unwrap();
    let feed = db
        .create_feed("Blog", "https://example.com/rss", ana.id)
        .await
        .unwrap();

    db.create_follow(ana.id, feed.id).await.unwrap();
    let result = db.create_follow(ana.id, feed.id).await;
    assert!(matches!(result, Err(StoreError::DuplicateFollow)));
}

// ============================================================================
// Ingestion Tests
// ============================================================================

#[tokio::test]
async fn test_store_posts_counts_inserts() {
    let db = test_db().await;
    let user = db.create_user("ana").await.unwrap();
    let feed = db
        .create_feed("Blog", "https://example.com/rss", user.id)
        .await
        .unwrap();

    let posts = vec![
        test_post("g1", "One", Some(1_700_000_000)),
        test_post("g2", "Two", Some(1_700_000_100)),
        test_post("g3", "Three", None),
    ];
    let stats = db.store_posts(feed.id, &posts).await.unwrap();
    assert_eq!(stats.inserted, 3);
    assert_eq!(stats.skipped, 0);
}

#[tokio::test]
async fn test_reingesting_same_items_is_a_skip_not_an_error() {
    let db = test_db().await;
    let user = db.create_user("ana").await.unwrap();
    let feed = db
        .create_feed("Blog", "https://example.com/rss", user.id)
        .await
        .unwrap();

    let posts = vec![test_post("g1", "One", Some(1_700_000_000))];
    let first = db.store_posts(feed.id, &posts).await.unwrap();
    assert_eq!(first.inserted, 1);

    let second = db.store_posts(feed.id, &posts).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 1);

    // Store remains readable with a single copy
    assert_eq!(db.posts_for_feed(feed.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_same_guid_in_different_feeds_is_not_a_duplicate() {
    let db = test_db().await;
    let user = db.create_user("ana").await.unwrap();
    let feed_a = db
        .create_feed("A", "https://a.example.com/rss", user.id)
        .await
        .unwrap();
    let feed_b = db
        .create_feed("B", "https://b.example.com/rss", user.id)
        .await
        .unwrap();

    let posts = vec![test_post("shared", "Post", None)];
    assert_eq!(db.store_posts(feed_a.id, &posts).await.unwrap().inserted, 1);
    assert_eq!(db.store_posts(feed_b.id, &posts).await.unwrap().inserted, 1);
}

// ============================================================================
// Browse Tests
// ============================================================================

#[tokio::test]
async fn test_browse_scoped_to_follows_and_ordered() {
    let db = test_db().await;
    let ana = db.create_user("ana").await.unwrap();
    let ben = db.create_user("ben").await.unwrap();

    let followed = db
        .create_feed("Followed", "https://a.example.com/rss", ana.id)
        .await
        .unwrap();
    let other = db
        .create_feed("Other", "https://b.example.com/rss", ben.id)
        .await
        .unwrap();
    db.create_follow(ana.id, followed.id).await.unwrap();
    db.create_follow(ben.id, other.id).await.unwrap();

    db.store_posts(
        followed.id,
        &[
            test_post("old", "Old", Some(1_700_000_000)),
            test_post("new", "New", Some(1_700_100_000)),
            test_post("mid", "Mid", Some(1_700_050_000)),
        ],
    )
    .await
    .unwrap();
    db.store_posts(other.id, &[test_post("x", "Unseen", Some(1_700_200_000))])
        .await
        .unwrap();

    let posts = db.posts_for_user(ana.id, 10).await.unwrap();
    let titles: Vec<&str> = posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["New", "Mid", "Old"]);
    assert!(posts.iter().all(|p| p.feed_name == "Followed"));
}

#[tokio::test]
async fn test_browse_respects_limit() {
    let db = test_db().await;
    let ana = db.create_user("ana").await.unwrap();
    let feed = db
        .create_feed("Blog", "https://example.com/rss", ana.id)
        .await
        .unwrap();
    db.create_follow(ana.id, feed.id).await.unwrap();

    let posts: Vec<NewPost> = (0..5i64)
        .map(|i| test_post(&format!("g{}", i), &format!("Post {}", i), Some(1_700_000_000 + i)))
        .collect();
    db.store_posts(feed.id, &posts).await.unwrap();

    let limited = db.posts_for_user(ana.id, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].title, "Post 4");
}

#[tokio::test]
async fn test_browse_unknown_publish_dates_sort_last() {
    let db = test_db().await;
    let ana = db.create_user("ana").await.unwrap();
    let feed = db
        .create_feed("Blog", "https://example.com/rss", ana.id)
        .await
        .unwrap();
    db.create_follow(ana.id, feed.id).await.unwrap();

    db.store_posts(
        feed.id,
        &[
            test_post("undated", "Undated", None),
            test_post("dated", "Dated", Some(1_700_000_000)),
        ],
    )
    .await
    .unwrap();

    let posts = db.posts_for_user(ana.id, 10).await.unwrap();
    assert_eq!(posts[0].title, "Dated");
    assert_eq!(posts[1].title, "Undated");
}
