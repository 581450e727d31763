//! The poll scheduler: drives one feed per tick through
//! select -> mark -> fetch -> parse -> ingest, forever.

use chrono::Utc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::feed::{self, FetchError, ParseError};
use crate::storage::{Database, IngestStats, NewPost, StoreError};

// ============================================================================
// Interval parsing
// ============================================================================

#[derive(Debug, Error)]
pub enum ParseIntervalError {
    #[error("invalid interval '{0}': expected a duration like \"30s\", \"1m\" or \"1h30m\"")]
    Invalid(String),
    #[error("invalid interval '{0}': must be positive")]
    NonPositive(String),
}

/// Parse a human-readable poll interval: one or more integer+unit segments,
/// units `ms`, `s`, `m`, `h`. Checked once at startup, never per tick.
pub fn parse_interval(input: &str) -> Result<Duration, ParseIntervalError> {
    let invalid = || ParseIntervalError::Invalid(input.to_string());

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits_end == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits_end].parse().map_err(|_| invalid())?;
        let unit_rest = &rest[digits_end..];

        // Longest unit first so "ms" is not read as minutes
        let (consumed, millis_per_unit) = if let Some(after) = unit_rest.strip_prefix("ms") {
            (after, 1u64)
        } else if let Some(after) = unit_rest.strip_prefix('s') {
            (after, 1_000)
        } else if let Some(after) = unit_rest.strip_prefix('m') {
            (after, 60_000)
        } else if let Some(after) = unit_rest.strip_prefix('h') {
            (after, 3_600_000)
        } else {
            return Err(invalid());
        };

        let millis = value.checked_mul(millis_per_unit).ok_or_else(invalid)?;
        total = total
            .checked_add(Duration::from_millis(millis))
            .ok_or_else(invalid)?;
        rest = consumed;
    }

    if total.is_zero() {
        return Err(ParseIntervalError::NonPositive(input.to_string()));
    }
    Ok(total)
}

// ============================================================================
// Tick pipeline
// ============================================================================

/// How the scheduler treats pipeline failures inside a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Log the error and keep polling (default).
    Resilient,
    /// Stop the run on the first pipeline error.
    FailFast,
}

/// A tick failure, tagged with the stage it came from.
#[derive(Debug, Error)]
pub enum TickError {
    /// Recoverable: nothing to fetch yet. The loop skips the tick so feeds
    /// added concurrently by another command get picked up later.
    #[error("no feeds registered")]
    EmptyRegistry,
    #[error("selecting or marking next feed: {0}")]
    Registry(#[source] StoreError),
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("parsing document from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
    #[error("storing posts from {url}: {source}")]
    Ingest {
        url: String,
        #[source]
        source: StoreError,
    },
}

/// Outcome of a completed tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub feed_name: String,
    pub feed_url: String,
    pub stats: IngestStats,
}

/// Run one fetch cycle: pick the least recently fetched feed, stamp its
/// attempt marker, then fetch, parse and ingest.
///
/// The marker is written before any network I/O, so a feed whose source
/// keeps failing still rotates to the back of the queue instead of
/// starving every other feed.
pub async fn tick(
    db: &Database,
    client: &reqwest::Client,
    cancel: &CancellationToken,
) -> Result<TickReport, TickError> {
    let feed = db
        .next_feed_to_fetch()
        .await
        .map_err(TickError::Registry)?
        .ok_or(TickError::EmptyRegistry)?;

    db.mark_feed_fetched(feed.id, Utc::now().timestamp())
        .await
        .map_err(TickError::Registry)?;

    let bytes = feed::fetch_feed(client, &feed.url, cancel)
        .await
        .map_err(|source| TickError::Fetch {
            url: feed.url.clone(),
            source,
        })?;

    let document = feed::parse_document(&bytes).map_err(|source| TickError::Parse {
        url: feed.url.clone(),
        source,
    })?;

    let posts: Vec<NewPost> = document
        .items
        .into_iter()
        .map(|item| NewPost {
            guid: item.guid,
            title: item.title,
            url: item.url,
            description: item.description,
            published_at: item.published_at.map(|dt| dt.timestamp()),
        })
        .collect();

    let stats = db
        .store_posts(feed.id, &posts)
        .await
        .map_err(|source| TickError::Ingest {
            url: feed.url.clone(),
            source,
        })?;

    Ok(TickReport {
        feed_name: feed.name,
        feed_url: feed.url,
        stats,
    })
}

// ============================================================================
// Poll loop
// ============================================================================

/// Drive the tick pipeline on a fixed interval until cancelled (or, in
/// fail-fast mode, until a pipeline error).
///
/// The first tick fires immediately. A tick that overruns the interval
/// delays the next one rather than firing a burst of catch-up ticks, so a
/// slow source only postpones polling, never duplicates it.
pub async fn run(
    db: &Database,
    client: &reqwest::Client,
    interval: Duration,
    mode: FailureMode,
    cancel: &CancellationToken,
) -> Result<(), TickError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Shutdown requested, stopping poll loop");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        match tick(db, client, cancel).await {
            Ok(report) => {
                tracing::info!(
                    feed = %report.feed_name,
                    url = %report.feed_url,
                    inserted = report.stats.inserted,
                    skipped = report.stats.skipped,
                    "Feed collected"
                );
            }
            Err(TickError::EmptyRegistry) => {
                tracing::info!("No feeds registered yet, skipping tick");
            }
            Err(TickError::Fetch {
                source: FetchError::Cancelled,
                ..
            }) => {
                tracing::info!("Fetch cancelled, stopping poll loop");
                return Ok(());
            }
            Err(e) if mode == FailureMode::FailFast => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Tick failed, continuing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_interval("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_interval("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn test_parse_compound_durations() {
        assert_eq!(parse_interval("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_interval("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(
            parse_interval("1s500ms").unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_interval(" 1m ").unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_is_non_positive() {
        assert!(matches!(
            parse_interval("0s"),
            Err(ParseIntervalError::NonPositive(_))
        ));
        assert!(matches!(
            parse_interval("0h0m"),
            Err(ParseIntervalError::NonPositive(_))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        for input in ["", "m", "10", "ten seconds", "1x", "1.5h", "-1m", "1m-"] {
            assert!(
                matches!(parse_interval(input), Err(ParseIntervalError::Invalid(_))),
                "expected Invalid for {:?}",
                input
            );
        }
    }

    proptest! {
        #[test]
        fn test_generated_intervals_round_trip(value in 1u64..=9999, unit_idx in 0usize..4) {
            let units = ["ms", "s", "m", "h"];
            let factors: [u64; 4] = [1, 1_000, 60_000, 3_600_000];
            let input = format!("{}{}", value, units[unit_idx]);
            let parsed = parse_interval(&input).unwrap();
            prop_assert_eq!(parsed.as_millis() as u64, value * factors[unit_idx]);
        }
    }
}
