use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{StateBackend, StoreError};

/// Process-local backend. State is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn load(&self, slot: &str) -> Result<Option<serde_json::Value>, StoreError> {
        Ok(self.slots.read().await.get(slot).cloned())
    }

    async fn store(&self, slot: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        self.slots
            .write()
            .await
            .insert(slot.to_string(), value.clone());
        Ok(())
    }
}
