//! The ingestion entry point.
//!
//! [`Ingestor::ingest`] runs one batch through ledger check, transform, merge
//! and ledger record. It never returns an error: every failure is folded into
//! an [`IngestOutcome`] so triggers can report it as-is.

use std::sync::Arc;

use brandfeed_core::{AppConfig, BrandDirectory, RunSource, SourceRun};
use brandfeed_store::{PostStore, RunLedger, StateBackend};
use chrono::{TimeDelta, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::PipelineError;
use crate::stats::TransformStats;
use crate::transform::Transformer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Re-process a run even if the ledger already holds it.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestFailure {
    /// No successful run, no dataset to read it from, or a dataset with
    /// no items.
    SourceUnavailable,
    /// Items were fetched but none became a post.
    NoQualifyingPosts,
    /// The ledger or the feed could not be read or written.
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub success: bool,
    pub message: String,
    pub run_id: Option<String>,
    pub new_posts_count: usize,
    pub already_processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TransformStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<IngestFailure>,
}

impl IngestOutcome {
    fn failed(run_id: Option<&str>, failure: IngestFailure, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            run_id: run_id.map(str::to_string),
            new_posts_count: 0,
            already_processed: false,
            stats: None,
            failure: Some(failure),
        }
    }

    fn skipped(run_id: &str) -> Self {
        Self {
            success: true,
            message: format!("run {run_id} was already processed"),
            run_id: Some(run_id.to_string()),
            new_posts_count: 0,
            already_processed: true,
            stats: None,
            failure: None,
        }
    }
}

/// Owns the handles ingestion needs: the brand directory, the feed and the ledger.
#[derive(Clone)]
pub struct Ingestor {
    directory: Arc<BrandDirectory>,
    posts: Arc<PostStore>,
    ledger: Arc<RunLedger>,
    max_age: TimeDelta,
    default_dataset: Option<String>,
}

impl Ingestor {
    #[must_use]
    pub fn new(
        directory: Arc<BrandDirectory>,
        posts: Arc<PostStore>,
        ledger: Arc<RunLedger>,
        max_age: TimeDelta,
    ) -> Self {
        Self {
            directory,
            posts,
            ledger,
            max_age,
            default_dataset: None,
        }
    }

    /// Wire the stores over `backend` with the cap, age limit and fallback
    /// dataset from `config`.
    #[must_use]
    pub fn from_config(
        config: &AppConfig,
        directory: Arc<BrandDirectory>,
        backend: Arc<dyn StateBackend>,
    ) -> Self {
        Self::new(
            directory,
            Arc::new(PostStore::new(Arc::clone(&backend), config.max_retained)),
            Arc::new(RunLedger::new(backend)),
            TimeDelta::days(i64::from(config.max_post_age_days)),
        )
        .with_default_dataset(config.apify_dataset_id.clone())
    }

    /// Dataset to read when a run does not name one.
    #[must_use]
    pub fn with_default_dataset(mut self, dataset: Option<String>) -> Self {
        self.default_dataset = dataset;
        self
    }

    #[must_use]
    pub fn directory(&self) -> &BrandDirectory {
        &self.directory
    }

    #[must_use]
    pub fn posts(&self) -> &PostStore {
        &self.posts
    }

    #[must_use]
    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    /// Ingest `raw_items` as run `run_id`.
    pub async fn ingest(
        &self,
        run_id: &str,
        raw_items: &[Value],
        options: IngestOptions,
    ) -> IngestOutcome {
        match self.try_ingest(run_id, raw_items, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "ingestion failed");
                IngestOutcome::failed(Some(run_id), IngestFailure::Persistence, e.to_string())
            }
        }
    }

    async fn try_ingest(
        &self,
        run_id: &str,
        raw_items: &[Value],
        options: IngestOptions,
    ) -> Result<IngestOutcome, PipelineError> {
        if !options.force && self.ledger.already_processed(run_id).await? {
            tracing::info!(run_id = %run_id, "run already processed; skipping");
            return Ok(IngestOutcome::skipped(run_id));
        }

        if raw_items.is_empty() {
            tracing::warn!(run_id = %run_id, "dataset is empty");
            return Ok(IngestOutcome::failed(
                Some(run_id),
                IngestFailure::SourceUnavailable,
                format!("run {run_id} has no items"),
            ));
        }

        tracing::info!(
            run_id = %run_id,
            items = raw_items.len(),
            force = options.force,
            "transforming run"
        );
        let output =
            Transformer::new(&self.directory, self.max_age).transform(raw_items, Utc::now());

        if output.posts.is_empty() {
            tracing::warn!(run_id = %run_id, "no items qualified as posts");
            let mut outcome = IngestOutcome::failed(
                Some(run_id),
                IngestFailure::NoQualifyingPosts,
                format!(
                    "none of the {} items in run {run_id} qualified as posts",
                    raw_items.len()
                ),
            );
            outcome.stats = Some(output.stats);
            return Ok(outcome);
        }

        let report = self.posts.merge(output.posts).await?;
        self.ledger.record(run_id, raw_items.len()).await?;

        tracing::info!(
            run_id = %run_id,
            new_posts = report.added,
            stored = report.total,
            "run ingested"
        );
        Ok(IngestOutcome {
            success: true,
            message: format!("added {} new posts from run {run_id}", report.added),
            run_id: Some(run_id.to_string()),
            new_posts_count: report.added,
            already_processed: false,
            stats: Some(output.stats),
            failure: None,
        })
    }

    /// Fetch the latest successful run from `source` and ingest it.
    ///
    /// The ledger is consulted before the dataset is downloaded, so an
    /// already-processed run costs one metadata request.
    pub async fn refresh(&self, source: &dyn RunSource, options: IngestOptions) -> IngestOutcome {
        let run = match source.latest_run().await {
            Ok(Some(run)) if run.is_succeeded() => run,
            Ok(Some(run)) => {
                return IngestOutcome::failed(
                    Some(&run.run_id),
                    IngestFailure::SourceUnavailable,
                    format!("latest run {} has status {}", run.run_id, run.status),
                );
            }
            Ok(None) => {
                return IngestOutcome::failed(
                    None,
                    IngestFailure::SourceUnavailable,
                    "no successful run found",
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not fetch latest run");
                return IngestOutcome::failed(None, IngestFailure::SourceUnavailable, e.to_string());
            }
        };

        if !options.force {
            match self.ledger.already_processed(&run.run_id).await {
                Ok(true) => {
                    tracing::info!(run_id = %run.run_id, "latest run already processed");
                    return IngestOutcome::skipped(&run.run_id);
                }
                Ok(false) => {}
                Err(e) => {
                    return IngestOutcome::failed(
                        Some(&run.run_id),
                        IngestFailure::Persistence,
                        e.to_string(),
                    );
                }
            }
        }

        let Some(dataset) = self.dataset_for(&run) else {
            return IngestOutcome::failed(
                Some(&run.run_id),
                IngestFailure::SourceUnavailable,
                format!("run {} has no dataset", run.run_id),
            );
        };

        let items = match source.dataset_items(dataset).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(run_id = %run.run_id, dataset, error = %e, "dataset fetch failed");
                return IngestOutcome::failed(
                    Some(&run.run_id),
                    IngestFailure::SourceUnavailable,
                    e.to_string(),
                );
            }
        };

        self.ingest(&run.run_id, &items, options).await
    }

    fn dataset_for<'a>(&'a self, run: &'a SourceRun) -> Option<&'a str> {
        run.dataset_ref
            .as_deref()
            .or(self.default_dataset.as_deref())
    }
}

#[cfg(test)]
#[path = "ingest_test.rs"]
mod tests;
