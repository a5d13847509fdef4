//! Client for the Apify REST API.
//!
//! [`ApifyClient`] reads the runs of one actor task and the items of a run's
//! default dataset, and implements [`brandfeed_core::RunSource`] so the
//! pipeline can pull the latest successful run through it.

pub mod client;
pub mod error;
pub(crate) mod retry;
pub mod types;

pub use client::ApifyClient;
pub use error::ApifyError;
pub use types::{ApiResponse, RunData, RunList, RUN_STATUS_SUCCEEDED};
