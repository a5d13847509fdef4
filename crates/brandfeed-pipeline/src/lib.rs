//! Ingestion, classification and dedup of scraped brand posts.
//!
//! Raw items flow through [`extract`] → [`classify`] → [`RecordFilter`] inside
//! a [`Transformer`]; [`Ingestor`] wraps that with the run ledger and the
//! post store.

pub mod classify;
pub mod error;
pub mod extract;
pub mod filter;
pub mod ingest;
pub mod stats;
pub mod transform;

pub use classify::{classify, infer_brand, Classification, Signal};
pub use error::PipelineError;
pub use extract::{extract, extract_embedded, extract_post, Extracted, PostFields};
pub use filter::{RecordFilter, Rejection};
pub use ingest::{IngestFailure, IngestOptions, IngestOutcome, Ingestor};
pub use stats::{brand_tally, AccountCensus, TransformStats};
pub use transform::{TransformOutput, Transformer, SOURCE_INSTAGRAM};
