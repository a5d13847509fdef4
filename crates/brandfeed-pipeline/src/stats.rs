//! Diagnostic counters and dataset summaries. None of this affects what is
//! stored; it only feeds logs and API responses.

use std::collections::{BTreeSet, HashMap};

use brandfeed_core::{BrandDirectory, CanonicalPost};
use serde::Serialize;
use serde_json::Value;

use crate::filter::Rejection;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformStats {
    /// Raw items in the batch.
    pub total: usize,
    pub profiles: usize,
    pub singles: usize,
    pub filtered_by_brand: usize,
    pub filtered_by_age: usize,
    pub filtered_by_media: usize,
    /// Items that could not be interpreted at all.
    pub errors: usize,
    pub transformed: usize,
}

impl TransformStats {
    pub(crate) fn reject(&mut self, reason: Rejection) {
        match reason {
            Rejection::Brand => self.filtered_by_brand += 1,
            Rejection::Age => self.filtered_by_age += 1,
            Rejection::Media => self.filtered_by_media += 1,
        }
    }

    pub(crate) fn log(&self) {
        tracing::info!(
            total = self.total,
            profiles = self.profiles,
            singles = self.singles,
            filtered_by_brand = self.filtered_by_brand,
            filtered_by_age = self.filtered_by_age,
            filtered_by_media = self.filtered_by_media,
            errors = self.errors,
            transformed = self.transformed,
            "transform statistics"
        );
    }
}

/// Post counts per brand, largest first, ties by name.
#[must_use]
pub fn brand_tally(posts: &[CanonicalPost]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for post in posts {
        *counts.entry(post.brand.as_str()).or_default() += 1;
    }
    let mut tally: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(brand, count)| (brand.to_string(), count))
        .collect();
    tally.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    tally
}

/// Which author handles a dataset contains and how they map to brands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountCensus {
    /// Every lower-cased handle seen, sorted.
    pub detected: Vec<String>,
    /// `(handle, brand)` for handles that are known accounts.
    pub mapped: Vec<(String, String)>,
    /// Handles the directory does not know.
    pub unmapped: Vec<String>,
}

impl AccountCensus {
    /// Collect top-level author handles from `items`. Non-object items are ignored.
    #[must_use]
    pub fn from_items(directory: &BrandDirectory, items: &[Value]) -> Self {
        const POINTERS: [&str; 4] = [
            "/username",
            "/ownerUsername",
            "/owner/username",
            "/userData/username",
        ];

        let detected: BTreeSet<String> = items
            .iter()
            .filter_map(|item| {
                POINTERS
                    .iter()
                    .filter_map(|p| item.pointer(p).and_then(Value::as_str))
                    .map(|h| h.trim().to_lowercase())
                    .find(|h| !h.is_empty())
            })
            .collect();

        let mut census = Self::default();
        for handle in detected {
            match directory.account_brand(&handle) {
                Some(brand) => census.mapped.push((handle.clone(), brand.to_string())),
                None => census.unmapped.push(handle.clone()),
            }
            census.detected.push(handle);
        }
        census
    }

    pub(crate) fn log(&self) {
        tracing::debug!(handles = ?self.detected, "account handles detected in dataset");
        for (handle, brand) in &self.mapped {
            tracing::debug!(handle = %handle, brand = %brand, "known account in dataset");
        }
        if !self.unmapped.is_empty() {
            tracing::debug!(
                handles = ?self.unmapped,
                "handles not mapped to any brand; consider adding them to brands.yaml"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brandfeed_core::parse_brands;
    use serde_json::json;

    fn post(brand: &str, id: &str) -> CanonicalPost {
        CanonicalPost {
            id: CanonicalPost::make_id(brand, id),
            brand: brand.to_string(),
            source: "instagram".to_string(),
            source_post_id: id.to_string(),
            media_url: "https://cdn/x.jpg".to_string(),
            caption: String::new(),
            timestamp: 0,
            external_url: None,
        }
    }

    #[test]
    fn tally_orders_by_count_then_name() {
        let posts = vec![
            post("Nike", "1"),
            post("Adidas", "2"),
            post("Nike", "3"),
            post("Anthropic", "4"),
        ];
        assert_eq!(
            brand_tally(&posts),
            vec![
                ("Nike".to_string(), 2),
                ("Adidas".to_string(), 1),
                ("Anthropic".to_string(), 1)
            ]
        );
    }

    #[test]
    fn census_splits_known_and_unknown_handles() {
        let dir = BrandDirectory::from_config(
            &parse_brands(
                r"
tracked: [Nike]
brands:
  - name: Nike
    category: Fashion
    sub_brands:
      - name: Nike
        account: nike
",
            )
            .unwrap(),
        );
        let items = vec![
            json!({"username": "Nike"}),
            json!({"owner": {"username": "fan_page"}}),
            json!({"ownerUsername": "nike"}),
            json!(null),
            json!({"caption": "anonymous"}),
        ];
        let census = AccountCensus::from_items(&dir, &items);
        assert_eq!(census.detected, vec!["fan_page", "nike"]);
        assert_eq!(census.mapped, vec![("nike".to_string(), "Nike".to_string())]);
        assert_eq!(census.unmapped, vec!["fan_page"]);
    }

    #[test]
    fn rejections_land_in_their_counters() {
        let mut stats = TransformStats::default();
        stats.reject(Rejection::Brand);
        stats.reject(Rejection::Age);
        stats.reject(Rejection::Age);
        stats.reject(Rejection::Media);
        assert_eq!(stats.filtered_by_brand, 1);
        assert_eq!(stats.filtered_by_age, 2);
        assert_eq!(stats.filtered_by_media, 1);
    }
}
