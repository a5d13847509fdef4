use std::sync::Arc;

use async_trait::async_trait;

use crate::StoreError;

/// Named JSON slots with all-or-nothing writes.
///
/// A `store` either replaces the whole slot or leaves the previous value
/// intact; readers never observe a partial write.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Current value of `slot`, or `None` if it was never written.
    async fn load(&self, slot: &str) -> Result<Option<serde_json::Value>, StoreError>;

    async fn store(&self, slot: &str, value: &serde_json::Value) -> Result<(), StoreError>;
}

#[async_trait]
impl<B: StateBackend + ?Sized> StateBackend for Arc<B> {
    async fn load(&self, slot: &str) -> Result<Option<serde_json::Value>, StoreError> {
        (**self).load(slot).await
    }

    async fn store(&self, slot: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        (**self).store(slot, value).await
    }
}
