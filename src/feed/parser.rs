use chrono::{DateTime, Utc};
use feed_rs::parser::{ParseErrorKind, ParseFeedError};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from decoding a fetched document.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The bytes are not valid feed markup
    #[error("malformed document: {0}")]
    Malformed(String),
    /// Valid markup, but not a recognizable feed (no channel/items to locate)
    #[error("document is not a recognized feed schema")]
    UnsupportedSchema,
}

/// A normalized, in-memory feed document. Transient: lives only between
/// fetch and ingestion.
#[derive(Debug, Clone)]
pub struct FeedDocument {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub items: Vec<FeedItem>,
}

/// One entry of a [`FeedDocument`], in source order.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub guid: String,
    pub title: String,
    pub url: Option<String>,
    pub description: Option<String>,
    /// `None` means the source gave no publish date, or one that could not
    /// be parsed. Items are never rejected for a bad date.
    pub published_at: Option<DateTime<Utc>>,
}

/// Decode raw document bytes into a normalized feed.
///
/// Textual fields (channel title/description, item titles/descriptions) come
/// out with HTML character entities decoded to their literal characters. The
/// XML layer already unescapes standard entities; the extra pass catches
/// text that arrives double-encoded or wrapped in CDATA.
pub fn parse_document(bytes: &[u8]) -> Result<FeedDocument, ParseError> {
    let feed = feed_rs::parser::parse(bytes).map_err(map_parse_error)?;

    let title = feed
        .title
        .map(|t| decode_entities(&t.content))
        .unwrap_or_default();
    let description = feed.description.map(|d| decode_entities(&d.content));
    let link = feed.links.first().map(|l| l.href.clone());

    let items: Vec<FeedItem> = feed
        .entries
        .into_iter()
        .map(|entry| {
            let url = entry.links.first().map(|l| l.href.clone());
            let published_at = entry.published.or(entry.updated);
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|text| decode_entities(&text));
            let title = entry
                .title
                .map(|t| decode_entities(&t.content))
                .unwrap_or_else(|| "Untitled".to_string());

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let guid = generate_guid(
                existing_id,
                url.as_deref(),
                &title,
                published_at.map(|dt| dt.timestamp()),
            );

            FeedItem {
                guid,
                title,
                url,
                description,
                published_at,
            }
        })
        .collect();

    Ok(FeedDocument {
        title,
        description,
        link,
        items,
    })
}

fn map_parse_error(err: ParseFeedError) -> ParseError {
    match err {
        ParseFeedError::ParseError(ParseErrorKind::NoFeedRoot) => ParseError::UnsupportedSchema,
        ParseFeedError::ParseError(ParseErrorKind::MissingContent(_)) => {
            ParseError::UnsupportedSchema
        }
        other => ParseError::Malformed(other.to_string()),
    }
}

fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Stable per-item dedup key: the source's own id when it has one, else a
/// hash over the fields that identify the item.
fn generate_guid(
    existing: Option<&str>,
    url: Option<&str>,
    title: &str,
    published: Option<i64>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!(
        "{}|{}|{}",
        url.unwrap_or(""),
        title,
        published.map(|p| p.to_string()).unwrap_or_default()
    );
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
