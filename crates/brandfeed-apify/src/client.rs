//! HTTP client for the Apify REST API.
//!
//! Reads task runs and dataset items with bearer-token auth. Transient
//! failures are retried under the client's [`Backoff`] policy.

use std::time::Duration;

use async_trait::async_trait;
use brandfeed_core::{AppConfig, RunSource, SourceError, SourceRun};
use reqwest::{
    header::{HeaderMap, RETRY_AFTER},
    Client, StatusCode, Url,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApifyError;
use crate::retry::Backoff;
use crate::types::{ApiResponse, RunData, RunList};

const DEFAULT_BASE_URL: &str = "https://api.apify.com/v2";

/// How many recent runs are scanned when the last run did not succeed.
pub const RECENT_RUNS_LIMIT: u32 = 10;

const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Client for the Apify REST API, bound to one actor task.
pub struct ApifyClient {
    client: Client,
    token: String,
    task_id: Option<String>,
    base_url: Url,
    backoff: Backoff,
}

impl ApifyClient {
    /// Creates a client pointed at the production Apify API.
    ///
    /// # Errors
    ///
    /// Returns [`ApifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        token: &str,
        task_id: Option<&str>,
        timeout_secs: u64,
        max_retries: u32,
    ) -> Result<Self, ApifyError> {
        Self::with_base_url(token, task_id, timeout_secs, max_retries, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ApifyError::Http`] if the `reqwest::Client` cannot be built,
    /// or [`ApifyError::Config`] if `base_url` is not a valid URL.
    pub fn with_base_url(
        token: &str,
        task_id: Option<&str>,
        timeout_secs: u64,
        max_retries: u32,
        base_url: &str,
    ) -> Result<Self, ApifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("brandfeed/0.1 (feed-ingest)")
            .build()?;

        // Exactly one trailing slash so path segments append under `/v2/`.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ApifyError::Config(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            token: token.to_owned(),
            task_id: task_id
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned),
            base_url,
            backoff: Backoff {
                max_retries,
                base: DEFAULT_BACKOFF_BASE,
            },
        })
    }

    /// Builds a client from the application config, or `None` when no API
    /// token is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ApifyError::Http`] if the `reqwest::Client` cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, ApifyError> {
        let Some(token) = config.apify_api_token.as_deref() else {
            return Ok(None);
        };
        Self::new(
            token,
            config.apify_task_id.as_deref(),
            config.apify_request_timeout_secs,
            config.apify_max_retries,
        )
        .map(Some)
    }

    /// Overrides the base delay of the retry back-off.
    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff.base = Duration::from_millis(backoff_base_ms);
        self
    }

    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Fetches the most recent run of the configured task, whatever its status.
    ///
    /// Returns `Ok(None)` when the task has never run.
    ///
    /// # Errors
    ///
    /// - [`ApifyError::Config`] if no task id is configured.
    /// - [`ApifyError::Http`] on network failure or non-2xx status other than 404.
    /// - [`ApifyError::Deserialize`] if the response does not match [`RunData`].
    pub async fn last_task_run(&self) -> Result<Option<RunData>, ApifyError> {
        let task = self.require_task()?;
        let url = self.build_url(&["actor-tasks", task, "runs", "last"], &[])?;
        match self.get_json::<ApiResponse<Option<RunData>>>(&url).await {
            Ok(envelope) => Ok(envelope.data),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Lists up to `limit` runs of the configured task, newest first.
    ///
    /// # Errors
    ///
    /// Same as [`ApifyClient::last_task_run`], except that 404 is an error.
    pub async fn recent_task_runs(&self, limit: u32) -> Result<Vec<RunData>, ApifyError> {
        let task = self.require_task()?;
        let limit = limit.to_string();
        let url = self.build_url(
            &["actor-tasks", task, "runs"],
            &[("desc", "1"), ("limit", limit.as_str())],
        )?;
        let envelope: ApiResponse<RunList> = self.get_json(&url).await?;
        Ok(envelope.data.items)
    }

    /// Newest run of the task whose status is `SUCCEEDED`.
    ///
    /// Checks the last run first; if it has not succeeded, scans the
    /// [`RECENT_RUNS_LIMIT`] most recent runs.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ApifyClient::last_task_run`] and
    /// [`ApifyClient::recent_task_runs`].
    pub async fn latest_succeeded_run(&self) -> Result<Option<RunData>, ApifyError> {
        let Some(last) = self.last_task_run().await? else {
            tracing::warn!(task_id = ?self.task_id, "task has no runs");
            return Ok(None);
        };
        if last.is_succeeded() {
            tracing::info!(run_id = %last.id, finished_at = ?last.finished_at, "latest task run found");
            return Ok(Some(last));
        }

        tracing::info!(
            run_id = %last.id,
            status = %last.status,
            "latest task run not successful; checking recent runs"
        );
        let found = self
            .recent_task_runs(RECENT_RUNS_LIMIT)
            .await?
            .into_iter()
            .find(RunData::is_succeeded);
        match &found {
            Some(run) => tracing::info!(run_id = %run.id, "found recent successful run"),
            None => tracing::warn!("no successful task runs found"),
        }
        Ok(found)
    }

    /// Fetches every item of a dataset as raw JSON values.
    ///
    /// # Errors
    ///
    /// - [`ApifyError::Http`] on network failure or non-2xx status.
    /// - [`ApifyError::Deserialize`] if the body is not a JSON array.
    pub async fn dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>, ApifyError> {
        let url = self.build_url(
            &["datasets", dataset_id, "items"],
            &[("format", "json"), ("clean", "true")],
        )?;
        let items: Vec<Value> = self.get_json(&url).await?;
        tracing::info!(dataset_id, items = items.len(), "fetched dataset items");
        Ok(items)
    }

    fn require_task(&self) -> Result<&str, ApifyError> {
        self.task_id
            .as_deref()
            .ok_or_else(|| ApifyError::Config("APIFY_TASK_ID is not set".to_owned()))
    }

    fn build_url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, ApifyError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApifyError::Config(format!("base URL '{}' has no path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    /// Sends a GET with bearer auth, asserts a 2xx status and decodes the body.
    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, ApifyError> {
        self.backoff
            .run(|| {
                let url = url.clone();
                async move {
                    let response = self
                        .client
                        .get(url.clone())
                        .bearer_auth(&self.token)
                        .send()
                        .await?;
                    if response.status() == StatusCode::TOO_MANY_REQUESTS {
                        return Err(ApifyError::RateLimited {
                            retry_after: retry_after(response.headers()),
                        });
                    }
                    let body = response.error_for_status()?.text().await?;
                    serde_json::from_str(&body).map_err(|e| ApifyError::Deserialize {
                        context: url.path().to_owned(),
                        source: e,
                    })
                }
            })
            .await
    }
}

/// `Retry-After` in delta-seconds form; HTTP dates are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

fn transport(err: ApifyError) -> SourceError {
    match err {
        ApifyError::Config(message) => SourceError::Unavailable(message),
        other => SourceError::Transport(Box::new(other)),
    }
}

#[async_trait]
impl RunSource for ApifyClient {
    async fn latest_run(&self) -> Result<Option<SourceRun>, SourceError> {
        self.latest_succeeded_run()
            .await
            .map(|run| run.map(SourceRun::from))
            .map_err(transport)
    }

    async fn dataset_items(&self, dataset_ref: &str) -> Result<Vec<Value>, SourceError> {
        ApifyClient::dataset_items(self, dataset_ref)
            .await
            .map_err(transport)
    }
}
