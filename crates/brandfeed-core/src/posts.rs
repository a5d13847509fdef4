use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::slugify;

/// Post ids of the placeholder entries that early deployments seeded into the
/// feed file. They are never produced by ingestion.
pub const SAMPLE_POST_IDS: [&str; 5] = ["google-1", "microsoft-1", "apple-1", "amazon-1", "nike-1"];

/// Host serving the placeholder images used by the seeded entries.
const SAMPLE_MEDIA_HOST: &str = "picsum.photos";

/// A normalized, brand-tagged post as stored and displayed.
///
/// Field aliases accept feed files written before the fields were renamed
/// (`postId`, `imageUrl`, `url`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPost {
    /// `slug(brand) + "-" + source_post_id`; the dedup key.
    pub id: String,
    pub brand: String,
    /// Platform the post was scraped from (e.g., `"instagram"`).
    pub source: String,
    #[serde(alias = "postId")]
    pub source_post_id: String,
    #[serde(alias = "imageUrl")]
    pub media_url: String,
    #[serde(default)]
    pub caption: String,
    /// Milliseconds since the UNIX epoch.
    pub timestamp: i64,
    #[serde(alias = "url", default, skip_serializing_if = "Option::is_none")]
    pub external_url: Option<String>,
}

impl CanonicalPost {
    /// Build the dedup id for a post of `brand` with upstream id `source_post_id`.
    #[must_use]
    pub fn make_id(brand: &str, source_post_id: &str) -> String {
        format!("{}-{source_post_id}", slugify(brand))
    }
}

/// Returns `true` for the seeded placeholder entries.
#[must_use]
pub fn is_sample_post(post: &CanonicalPost) -> bool {
    SAMPLE_POST_IDS.contains(&post.id.as_str()) || post.media_url.contains(SAMPLE_MEDIA_HOST)
}

/// The most recently processed ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub processed_at: DateTime<Utc>,
    /// Number of raw items in the run's dataset.
    pub item_count: usize,
}
