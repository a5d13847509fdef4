use std::collections::HashSet;
use std::sync::Arc;

use brandfeed_core::{is_sample_post, CanonicalPost};
use tokio::sync::Mutex;

use crate::{StateBackend, StoreError};

pub const DEFAULT_MAX_RETAINED: usize = 100;

const POSTS_SLOT: &str = "posts";

/// Result of a [`PostStore::merge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Incoming posts whose id was not already stored.
    pub added: usize,
    /// Posts dropped from the tail to honour the cap.
    pub evicted: usize,
    /// Length of the stored sequence after the merge.
    pub total: usize,
}

/// The persisted feed: unique ids, newest first, at most `max_retained` long.
pub struct PostStore {
    backend: Arc<dyn StateBackend>,
    max_retained: usize,
    // Serialises every read-modify-write of the posts slot.
    write_lock: Mutex<()>,
}

impl PostStore {
    #[must_use]
    pub fn new(backend: Arc<dyn StateBackend>, max_retained: usize) -> Self {
        Self {
            backend,
            max_retained: max_retained.max(1),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    async fn load(&self) -> Result<Vec<CanonicalPost>, StoreError> {
        match self.backend.load(POSTS_SLOT).await? {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value).map_err(|source| StoreError::Decode {
                slot: POSTS_SLOT.to_string(),
                source,
            }),
        }
    }

    async fn persist(&self, posts: &[CanonicalPost]) -> Result<(), StoreError> {
        let value = serde_json::to_value(posts).map_err(|source| StoreError::Encode {
            slot: POSTS_SLOT.to_string(),
            source,
        })?;
        self.backend.store(POSTS_SLOT, &value).await
    }

    /// The feed as displayed, with seeded sample entries filtered out.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the stored feed cannot be read or decoded.
    pub async fn get_all(&self) -> Result<Vec<CanonicalPost>, StoreError> {
        let mut posts = self.load().await?;
        posts.retain(|p| !is_sample_post(p));
        Ok(posts)
    }

    /// Feed entries whose brand matches `brand`, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the stored feed cannot be read or decoded.
    pub async fn by_brand(&self, brand: &str) -> Result<Vec<CanonicalPost>, StoreError> {
        let mut posts = self.get_all().await?;
        posts.retain(|p| p.brand.eq_ignore_ascii_case(brand));
        Ok(posts)
    }

    /// Merge `incoming` into the stored feed.
    ///
    /// Posts whose id is already stored (or repeated earlier in `incoming`)
    /// are dropped. When anything new remains the combined sequence is sorted
    /// newest first, truncated to the cap, and written back in one store; when
    /// nothing new remains the stored feed is not touched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the feed cannot be read or written. A failed
    /// write leaves the previous feed in place.
    pub async fn merge(&self, incoming: Vec<CanonicalPost>) -> Result<MergeReport, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut posts = self.load().await?;
        let mut seen: HashSet<String> = posts.iter().map(|p| p.id.clone()).collect();
        let fresh: Vec<CanonicalPost> = incoming
            .into_iter()
            .filter(|p| seen.insert(p.id.clone()))
            .collect();

        if fresh.is_empty() {
            tracing::debug!(stored = posts.len(), "no new posts to merge");
            return Ok(MergeReport {
                added: 0,
                evicted: 0,
                total: posts.len(),
            });
        }

        let added = fresh.len();
        posts.extend(fresh);
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let evicted = posts.len().saturating_sub(self.max_retained);
        posts.truncate(self.max_retained);

        self.persist(&posts).await?;
        tracing::info!(added, evicted, total = posts.len(), "merged posts into feed");

        Ok(MergeReport {
            added,
            evicted,
            total: posts.len(),
        })
    }

    /// Rewrite the stored feed without seeded sample entries.
    ///
    /// Returns the number of entries removed; nothing is written when the
    /// feed holds no samples.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the feed cannot be read or written.
    pub async fn purge_samples(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut posts = self.load().await?;
        let before = posts.len();
        posts.retain(|p| !is_sample_post(p));
        let removed = before - posts.len();

        if removed > 0 {
            self.persist(&posts).await?;
        }
        tracing::info!(removed, remaining = posts.len(), "purged sample posts");
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "posts_test.rs"]
mod tests;
