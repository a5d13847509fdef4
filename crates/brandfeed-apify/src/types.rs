//! Wire types for the subset of the Apify API this crate reads.

use brandfeed_core::SourceRun;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub const RUN_STATUS_SUCCEEDED: &str = "SUCCEEDED";

/// Apify wraps every object response in `{ "data": ... }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// One actor run as returned by `/actor-tasks/{task}/runs/last` and the run
/// list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub default_dataset_id: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunData {
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        self.status == RUN_STATUS_SUCCEEDED
    }
}

impl From<RunData> for SourceRun {
    fn from(run: RunData) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            dataset_ref: run.default_dataset_id,
            finished_at: run.finished_at,
        }
    }
}

/// Paginated run list (`data.items`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunList {
    #[serde(default)]
    pub items: Vec<RunData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_data_reads_camel_case_fields() {
        let body = serde_json::json!({
            "data": {
                "id": "run-1",
                "actId": "act-9",
                "status": "SUCCEEDED",
                "defaultDatasetId": "ds-1",
                "startedAt": "2025-05-01T10:00:00.000Z",
                "finishedAt": "2025-05-01T10:04:12.000Z"
            }
        });
        let resp: ApiResponse<RunData> = serde_json::from_value(body).unwrap();
        assert_eq!(resp.data.id, "run-1");
        assert_eq!(resp.data.default_dataset_id.as_deref(), Some("ds-1"));
        assert!(resp.data.is_succeeded());
        assert!(resp.data.finished_at.is_some());
    }

    #[test]
    fn unfinished_run_has_no_finish_time() {
        let run: RunData = serde_json::from_value(serde_json::json!({
            "id": "run-2",
            "status": "RUNNING",
            "finishedAt": null
        }))
        .unwrap();
        assert!(!run.is_succeeded());
        assert!(run.finished_at.is_none());
        assert!(run.default_dataset_id.is_none());
    }

    #[test]
    fn converts_into_source_run() {
        let run = RunData {
            id: "run-3".to_string(),
            status: "SUCCEEDED".to_string(),
            default_dataset_id: Some("ds-3".to_string()),
            started_at: None,
            finished_at: None,
        };
        let source: SourceRun = run.into();
        assert_eq!(source.run_id, "run-3");
        assert_eq!(source.dataset_ref.as_deref(), Some("ds-3"));
        assert!(source.is_succeeded());
    }
}
