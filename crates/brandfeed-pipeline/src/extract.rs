//! Field extraction from raw scraped items.
//!
//! Upstream items arrive in several shapes with inconsistent field names.
//! Everything downstream works on [`PostFields`]; nothing past this module
//! looks at raw JSON.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::error::PipelineError;

/// Arrays that mark an item as a profile carrying embedded posts.
const PROFILE_POST_ARRAYS: [&str; 2] = ["latestIgtvVideos", "latestPosts"];

const HANDLE_POINTERS: [&str; 5] = [
    "/ownerUsername",
    "/owner/username",
    "/username",
    "/user/username",
    "/userData/username",
];

const CAPTION_POINTERS: [&str; 3] = [
    "/caption",
    "/text",
    "/edge_media_to_caption/edges/0/node/text",
];

const MEDIA_POINTERS: [&str; 4] = ["/displayUrl", "/imageUrl", "/videoUrl", "/thumbnailUrl"];

const ID_POINTERS: [&str; 3] = ["/id", "/shortCode", "/code"];

const POST_URL_BASE: &str = "https://www.instagram.com/p/";

/// Semantic fields of one candidate post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFields {
    /// Author handle as written upstream; empty when none was found.
    pub handle: String,
    pub caption: String,
    /// Explicit hashtag list, without leading `#`. Empty when the item has none.
    pub hashtags: Vec<String>,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: i64,
    pub media_url: Option<String>,
    pub source_post_id: String,
    pub external_url: Option<String>,
}

/// What a raw item turned out to be.
#[derive(Debug)]
pub enum Extracted<'a> {
    /// An account record with embedded sub-records, each to be extracted on
    /// its own with [`extract_post`].
    Profile {
        handle: String,
        posts: Vec<&'a Value>,
    },
    Single(PostFields),
}

/// Classify the shape of `raw` and pull out its fields.
///
/// `now_ms` stands in for a missing timestamp or identifier.
///
/// # Errors
///
/// Returns [`PipelineError::Item`] when `raw` is not a JSON object.
pub fn extract(raw: &Value, index: usize, now_ms: i64) -> Result<Extracted<'_>, PipelineError> {
    let object = as_object(raw, index)?;

    let embedded: Vec<&Value> = PROFILE_POST_ARRAYS
        .iter()
        .filter_map(|key| object.get(*key).and_then(Value::as_array))
        .flatten()
        .collect();
    let is_profile = PROFILE_POST_ARRAYS
        .iter()
        .any(|key| object.get(*key).is_some_and(Value::is_array));

    if is_profile {
        return Ok(Extracted::Profile {
            handle: first_string(raw, &HANDLE_POINTERS).unwrap_or_default(),
            posts: embedded,
        });
    }

    Ok(Extracted::Single(extract_post(raw, None, index, now_ms)?))
}

/// Extract the fields of a single post-shaped record.
///
/// `inherited_handle` is used when the record names no author of its own,
/// which is the case for posts embedded in a profile.
///
/// # Errors
///
/// Returns [`PipelineError::Item`] when `raw` is not a JSON object.
pub fn extract_post(
    raw: &Value,
    inherited_handle: Option<&str>,
    index: usize,
    now_ms: i64,
) -> Result<PostFields, PipelineError> {
    let object = as_object(raw, index)?;

    let handle = first_string(raw, &HANDLE_POINTERS)
        .or_else(|| inherited_handle.map(str::to_string))
        .unwrap_or_default();
    let caption = first_string(raw, &CAPTION_POINTERS).unwrap_or_default();
    let hashtags = object
        .get("hashtags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(|t| t.trim().trim_start_matches('#').to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let short_code = first_string(raw, &["/shortCode", "/code"]);
    let external_url = first_string(raw, &["/url", "/postUrl"])
        .or_else(|| short_code.map(|code| format!("{POST_URL_BASE}{code}/")));

    Ok(PostFields {
        handle,
        caption,
        hashtags,
        timestamp: extract_timestamp(object).unwrap_or(now_ms),
        media_url: extract_media_url(raw, object),
        source_post_id: first_id(raw).unwrap_or_else(|| now_ms.to_string()),
        external_url,
    })
}

/// Extract a post embedded in a profile.
///
/// Unlike top-level items, embedded posts get no `now_ms` identifier: every
/// id-less sibling would share it and collapse into one post on merge.
///
/// # Errors
///
/// Returns [`PipelineError::Item`] when `raw` is not a JSON object or names
/// no `id`, `shortCode` or `code`.
pub fn extract_embedded(
    raw: &Value,
    profile_handle: &str,
    index: usize,
    now_ms: i64,
) -> Result<PostFields, PipelineError> {
    as_object(raw, index)?;
    if first_id(raw).is_none() {
        return Err(PipelineError::Item {
            index,
            reason: format!("embedded post of {profile_handle} has no identifier"),
        });
    }
    extract_post(raw, Some(profile_handle), index, now_ms)
}

fn as_object(raw: &Value, index: usize) -> Result<&Map<String, Value>, PipelineError> {
    raw.as_object().ok_or_else(|| PipelineError::Item {
        index,
        reason: format!("expected a JSON object, found {}", json_kind(raw)),
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// First non-empty string among `pointers`.
fn first_string(raw: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| raw.pointer(p).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Identifiers come as strings or bare numbers.
fn first_id(raw: &Value) -> Option<String> {
    ID_POINTERS.iter().find_map(|p| match raw.pointer(p)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// `timestamp` is an ISO-8601 string or epoch milliseconds;
/// `taken_at_timestamp` is UNIX seconds or an ISO-8601 string.
fn extract_timestamp(object: &Map<String, Value>) -> Option<i64> {
    let from_timestamp = object.get("timestamp").and_then(|v| match v {
        Value::String(s) => parse_iso_millis(s),
        Value::Number(n) => n.as_i64(),
        _ => None,
    });
    from_timestamp.or_else(|| {
        object.get("taken_at_timestamp").and_then(|v| match v {
            Value::Number(n) => n.as_i64().map(|secs| secs.saturating_mul(1000)),
            Value::String(s) => parse_iso_millis(s),
            _ => None,
        })
    })
}

fn parse_iso_millis(s: &str) -> Option<i64> {
    match DateTime::parse_from_rfc3339(s.trim()) {
        Ok(dt) => Some(dt.timestamp_millis()),
        Err(e) => {
            tracing::debug!(value = s, error = %e, "unparseable timestamp ignored");
            None
        }
    }
}

fn extract_media_url(raw: &Value, object: &Map<String, Value>) -> Option<String> {
    first_string(raw, &MEDIA_POINTERS)
        .or_else(|| first_image(object))
        .or_else(|| first_string(raw, &["/mediaUrl"]))
        .or_else(|| scan_url_fields(object))
}

/// `images[0]`, either a bare URL or an object with a `url`.
fn first_image(object: &Map<String, Value>) -> Option<String> {
    let first = object.get("images")?.as_array()?.first()?;
    let url = match first {
        Value::String(s) => s.as_str(),
        Value::Object(o) => o.get("url")?.as_str()?,
        _ => return None,
    };
    let url = url.trim();
    (!url.is_empty()).then(|| url.to_string())
}

/// Last resort: any string field whose key looks media-related and whose
/// value is an absolute URL. Keys are visited in document order.
fn scan_url_fields(object: &Map<String, Value>) -> Option<String> {
    object.iter().find_map(|(key, value)| {
        let value = value.as_str()?;
        let media_key = key.ends_with("Url")
            || key.contains("image")
            || key.contains("photo")
            || key.contains("display");
        (media_key && value.starts_with("http")).then(|| value.to_string())
    })
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;
