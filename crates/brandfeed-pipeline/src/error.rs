use brandfeed_core::SourceError;
use brandfeed_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// One raw item could not be interpreted; it is skipped, the batch goes on.
    #[error("item {index} skipped: {reason}")]
    Item { index: usize, reason: String },

    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),
}
