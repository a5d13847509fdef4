//! Contract for the upstream scraping service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The source is not configured or refused to serve runs.
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    /// Transport or decoding failure inside the source client.
    #[error("data source request failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Metadata describing one upstream scrape run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRun {
    pub run_id: String,
    /// Upstream status string, e.g. `"SUCCEEDED"` or `"RUNNING"`.
    pub status: String,
    /// Reference passed back to [`RunSource::dataset_items`].
    pub dataset_ref: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SourceRun {
    /// Only succeeded runs carry a dataset worth ingesting.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.status.eq_ignore_ascii_case("succeeded")
    }
}

/// A data source that returns a run identifier, a status, and a dataset of
/// raw items on demand.
#[async_trait]
pub trait RunSource: Send + Sync {
    /// Latest run worth ingesting, or `None` when no successful run exists.
    async fn latest_run(&self) -> Result<Option<SourceRun>, SourceError>;

    /// Raw items of the dataset referenced by a run.
    async fn dataset_items(&self, dataset_ref: &str)
        -> Result<Vec<serde_json::Value>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(status: &str) -> SourceRun {
        SourceRun {
            run_id: "r1".to_string(),
            status: status.to_string(),
            dataset_ref: Some("d1".to_string()),
            finished_at: None,
        }
    }

    #[test]
    fn succeeded_status_is_case_insensitive() {
        assert!(run("SUCCEEDED").is_succeeded());
        assert!(run("succeeded").is_succeeded());
        assert!(!run("RUNNING").is_succeeded());
        assert!(!run("FAILED").is_succeeded());
    }
}
