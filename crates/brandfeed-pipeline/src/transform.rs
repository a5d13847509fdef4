use brandfeed_core::{BrandDirectory, CanonicalPost};
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use crate::classify::classify;
use crate::extract::{extract, extract_embedded, Extracted, PostFields};
use crate::filter::RecordFilter;
use crate::stats::{brand_tally, AccountCensus, TransformStats};

/// Origin tag stamped on every post produced here.
pub const SOURCE_INSTAGRAM: &str = "instagram";

#[derive(Debug, Clone, Default)]
pub struct TransformOutput {
    /// Accepted posts in input order; profiles expand in place.
    pub posts: Vec<CanonicalPost>,
    pub stats: TransformStats,
}

/// Turns a batch of raw items into canonical posts. Pure apart from logging.
#[derive(Debug, Clone, Copy)]
pub struct Transformer<'a> {
    directory: &'a BrandDirectory,
    max_age: TimeDelta,
}

impl<'a> Transformer<'a> {
    #[must_use]
    pub fn new(directory: &'a BrandDirectory, max_age: TimeDelta) -> Self {
        Self { directory, max_age }
    }

    /// Extract, classify and filter every item of `items` as of `now`.
    ///
    /// Items that cannot be interpreted are counted under `errors` and
    /// skipped; they never abort the batch.
    #[must_use]
    pub fn transform(&self, items: &[Value], now: DateTime<Utc>) -> TransformOutput {
        let now_ms = now.timestamp_millis();
        let filter = RecordFilter::new(self.directory, self.max_age, now_ms);
        let mut out = TransformOutput {
            posts: Vec::new(),
            stats: TransformStats {
                total: items.len(),
                ..TransformStats::default()
            },
        };

        AccountCensus::from_items(self.directory, items).log();

        for (index, item) in items.iter().enumerate() {
            match extract(item, index, now_ms) {
                Ok(Extracted::Profile { handle, posts }) => {
                    out.stats.profiles += 1;
                    tracing::debug!(
                        handle = %handle,
                        embedded = posts.len(),
                        "profile item"
                    );
                    for embedded in posts {
                        match extract_embedded(embedded, &handle, index, now_ms) {
                            Ok(fields) => self.accept(fields, &filter, &mut out),
                            Err(e) => {
                                out.stats.errors += 1;
                                tracing::debug!(error = %e, "embedded post skipped");
                            }
                        }
                    }
                }
                Ok(Extracted::Single(fields)) => {
                    out.stats.singles += 1;
                    self.accept(fields, &filter, &mut out);
                }
                Err(e) => {
                    out.stats.errors += 1;
                    tracing::warn!(error = %e, "raw item skipped");
                }
            }
        }

        out.stats.log();
        for (brand, count) in brand_tally(&out.posts) {
            tracing::info!(brand = %brand, count, "posts this batch");
        }
        out
    }

    fn accept(&self, fields: PostFields, filter: &RecordFilter<'_>, out: &mut TransformOutput) {
        let classification = classify(self.directory, &fields);
        let brand = classification.as_ref().map(|c| c.brand.as_str());

        if let Err(reason) = filter.check(brand, fields.timestamp, fields.media_url.as_deref()) {
            tracing::debug!(
                handle = %fields.handle,
                source_post_id = %fields.source_post_id,
                %reason,
                "candidate rejected"
            );
            out.stats.reject(reason);
            return;
        }

        // The filter only passes candidates with a tracked brand and a media url.
        let (Some(classification), Some(media_url)) = (classification, fields.media_url) else {
            return;
        };

        tracing::debug!(
            brand = %classification.brand,
            signal = %classification.signal,
            source_post_id = %fields.source_post_id,
            "post accepted"
        );
        out.stats.transformed += 1;
        out.posts.push(CanonicalPost {
            id: CanonicalPost::make_id(&classification.brand, &fields.source_post_id),
            brand: classification.brand,
            source: SOURCE_INSTAGRAM.to_string(),
            source_post_id: fields.source_post_id,
            media_url,
            caption: fields.caption,
            timestamp: fields.timestamp,
            external_url: fields.external_url,
        });
    }
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod tests;
