use std::path::Path;

use brandfeed_apify::ApifyClient;
use brandfeed_core::AppConfig;
use brandfeed_pipeline::{IngestOptions, IngestOutcome, Ingestor};
use serde_json::Value;

/// Read a dataset export: either a bare JSON array of items or an object
/// carrying them under `data`.
pub(crate) fn parse_dataset(text: &str) -> anyhow::Result<Vec<Value>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            _ => anyhow::bail!("expected a JSON array or an object with a `data` array"),
        },
        _ => anyhow::bail!("expected a JSON array or an object with a `data` array"),
    }
}

/// Ingest a dataset file as run `run_id`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if ingestion
/// reports a failure.
pub(crate) async fn run_ingest_file(
    ingestor: &Ingestor,
    path: &Path,
    run_id: &str,
    force: bool,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let items = parse_dataset(&text)?;
    tracing::info!(file = %path.display(), items = items.len(), "dataset loaded");

    let outcome = ingestor.ingest(run_id, &items, IngestOptions { force }).await;
    report(&outcome)
}

/// Pull the latest successful Apify run and ingest it.
///
/// # Errors
///
/// Returns an error if no Apify token is configured or the refresh fails.
pub(crate) async fn run_refresh(
    ingestor: &Ingestor,
    config: &AppConfig,
    force: bool,
) -> anyhow::Result<()> {
    let Some(client) = ApifyClient::from_config(config)? else {
        anyhow::bail!("APIFY_API_TOKEN is not set; cannot refresh from Apify");
    };
    let outcome = ingestor.refresh(&client, IngestOptions { force }).await;
    report(&outcome)
}

pub(crate) fn render_outcome(outcome: &IngestOutcome) -> String {
    let mut lines = vec![outcome.message.clone()];
    if let Some(run_id) = &outcome.run_id {
        lines.push(format!("run:          {run_id}"));
    }
    lines.push(format!("new posts:    {}", outcome.new_posts_count));
    if let Some(stats) = &outcome.stats {
        lines.push(format!(
            "items:        {} ({} profiles, {} single posts, {} errors)",
            stats.total, stats.profiles, stats.singles, stats.errors
        ));
        lines.push(format!(
            "filtered:     {} brand, {} age, {} media",
            stats.filtered_by_brand, stats.filtered_by_age, stats.filtered_by_media
        ));
        lines.push(format!("transformed:  {}", stats.transformed));
    }
    lines.join("\n")
}

fn report(outcome: &IngestOutcome) -> anyhow::Result<()> {
    println!("{}", render_outcome(outcome));
    if outcome.success {
        Ok(())
    } else {
        match outcome.failure {
            Some(failure) => anyhow::bail!("ingestion failed ({failure:?})"),
            None => anyhow::bail!("ingestion failed"),
        }
    }
}
