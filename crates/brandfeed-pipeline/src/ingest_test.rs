use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use brandfeed_core::{parse_brands, Environment, SourceError, StorageKind};
use brandfeed_store::{MemoryBackend, StateBackend, StoreError};
use serde_json::json;

use super::*;

const YAML: &str = r"
tracked: [Nike, Adidas]
brands:
  - name: Nike
    category: Fashion
    sub_brands:
      - name: Nike
        account: nike
        keywords: [nike]
  - name: Adidas
    category: Fashion
    sub_brands:
      - name: Adidas
        account: adidas
        keywords: [adidas]
";

fn ingestor_on(backend: Arc<dyn StateBackend>, cap: usize) -> Ingestor {
    let directory = Arc::new(BrandDirectory::from_config(
        &parse_brands(YAML).expect("valid fixture"),
    ));
    Ingestor::new(
        directory,
        Arc::new(PostStore::new(backend.clone(), cap)),
        Arc::new(RunLedger::new(backend)),
        TimeDelta::days(730),
    )
}

fn ingestor() -> Ingestor {
    ingestor_on(Arc::new(MemoryBackend::new()), 100)
}

fn item(handle: &str, id: &str, age_minutes: i64) -> Value {
    let ts = Utc::now() - TimeDelta::minutes(age_minutes);
    json!({
        "ownerUsername": handle,
        "id": id,
        "timestamp": ts.timestamp_millis(),
        "displayUrl": format!("https://cdn.example.com/{id}.jpg"),
    })
}

fn batch() -> Vec<Value> {
    vec![item("nike", "11", 5), item("adidas", "12", 10), item("nike", "13", 1)]
}

const FORCE: IngestOptions = IngestOptions { force: true };
const NO_FORCE: IngestOptions = IngestOptions { force: false };

#[tokio::test]
async fn same_run_twice_merges_once() {
    let ingestor = ingestor();

    let first = ingestor.ingest("run-1", &batch(), NO_FORCE).await;
    assert!(first.success);
    assert!(!first.already_processed);
    assert_eq!(first.new_posts_count, 3);
    let after_first = ingestor.posts().get_all().await.unwrap();

    let second = ingestor
        .ingest("run-1", &[item("nike", "99", 0)], NO_FORCE)
        .await;
    assert!(second.success);
    assert!(second.already_processed);
    assert_eq!(second.new_posts_count, 0);
    assert!(second.stats.is_none());
    assert_eq!(ingestor.posts().get_all().await.unwrap(), after_first);
}

#[tokio::test]
async fn overlapping_runs_store_each_id_once() {
    let ingestor = ingestor();
    ingestor.ingest("run-1", &batch(), NO_FORCE).await;
    let second = ingestor
        .ingest("run-2", &[item("nike", "11", 5), item("nike", "14", 2)], NO_FORCE)
        .await;

    assert_eq!(second.new_posts_count, 1);
    let feed = ingestor.posts().get_all().await.unwrap();
    let nike_11 = feed.iter().filter(|p| p.id == "nike-11").count();
    assert_eq!(nike_11, 1);
    assert_eq!(feed.len(), 4);
}

#[tokio::test]
async fn feed_is_newest_first_after_ingest() {
    let ingestor = ingestor();
    ingestor.ingest("run-1", &batch(), NO_FORCE).await;
    let feed = ingestor.posts().get_all().await.unwrap();
    let ids: Vec<&str> = feed.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["nike-13", "nike-11", "adidas-12"]);
    assert!(feed.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
}

#[tokio::test]
async fn feed_never_exceeds_cap() {
    let ingestor = ingestor_on(Arc::new(MemoryBackend::new()), 2);
    let outcome = ingestor.ingest("run-1", &batch(), NO_FORCE).await;
    assert!(outcome.success);
    assert_eq!(ingestor.posts().get_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn forced_reingest_reruns_but_adds_nothing() {
    let ingestor = ingestor();
    ingestor.ingest("run-1", &batch(), NO_FORCE).await;

    let forced = ingestor.ingest("run-1", &batch(), FORCE).await;
    assert!(forced.success);
    assert!(!forced.already_processed);
    assert_eq!(forced.new_posts_count, 0);
    assert_eq!(forced.stats.map(|s| s.transformed), Some(3));
    assert_eq!(ingestor.posts().get_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn ledger_records_raw_item_count() {
    let ingestor = ingestor();
    let mut items = batch();
    items.push(json!({"ownerUsername": "nobody", "id": "x"}));
    ingestor.ingest("run-9", &items, NO_FORCE).await;

    let last = ingestor.ledger().last_run().await.unwrap().unwrap();
    assert_eq!(last.run_id, "run-9");
    assert_eq!(last.item_count, 4);
}

#[tokio::test]
async fn empty_dataset_is_source_unavailable() {
    let ingestor = ingestor();
    let outcome = ingestor.ingest("run-1", &[], NO_FORCE).await;
    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(IngestFailure::SourceUnavailable));
    assert!(outcome.message.contains("has no items"));
    assert!(ingestor.ledger().last_run().await.unwrap().is_none());
}

#[tokio::test]
async fn nothing_qualifying_leaves_ledger_untouched() {
    let ingestor = ingestor();
    let outcome = ingestor
        .ingest("run-1", &[json!({"ownerUsername": "nobody", "id": "1"})], NO_FORCE)
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(IngestFailure::NoQualifyingPosts));
    assert_eq!(outcome.stats.map(|s| s.filtered_by_brand), Some(1));
    assert!(!ingestor.ledger().already_processed("run-1").await.unwrap());

    // A retry of the same run is not short-circuited.
    let retry = ingestor.ingest("run-1", &batch(), NO_FORCE).await;
    assert!(retry.success);
    assert_eq!(retry.new_posts_count, 3);
}

struct FailingWrites;

#[async_trait]
impl StateBackend for FailingWrites {
    async fn load(&self, _slot: &str) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }

    async fn store(&self, slot: &str, _value: &Value) -> Result<(), StoreError> {
        Err(StoreError::Io {
            path: format!("{slot}.json").into(),
            source: std::io::Error::other("disk full"),
        })
    }
}

#[tokio::test]
async fn write_failure_is_reported_not_raised() {
    let ingestor = ingestor_on(Arc::new(FailingWrites), 100);
    let outcome = ingestor.ingest("run-1", &batch(), NO_FORCE).await;
    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(IngestFailure::Persistence));
    assert!(outcome.message.contains("disk full"));
}

// ---------------------------------------------------------------------------
// refresh
// ---------------------------------------------------------------------------

struct FakeSource {
    run: Option<SourceRun>,
    items: Vec<Value>,
    dataset_calls: AtomicUsize,
}

impl FakeSource {
    fn new(run: Option<SourceRun>, items: Vec<Value>) -> Self {
        Self {
            run,
            items,
            dataset_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RunSource for FakeSource {
    async fn latest_run(&self) -> Result<Option<SourceRun>, SourceError> {
        Ok(self.run.clone())
    }

    async fn dataset_items(&self, dataset_ref: &str) -> Result<Vec<Value>, SourceError> {
        self.dataset_calls.fetch_add(1, Ordering::SeqCst);
        if dataset_ref == "missing" {
            return Err(SourceError::Unavailable(format!("dataset {dataset_ref} not found")));
        }
        Ok(self.items.clone())
    }
}

fn succeeded(run_id: &str, dataset: Option<&str>) -> SourceRun {
    SourceRun {
        run_id: run_id.to_string(),
        status: "SUCCEEDED".to_string(),
        dataset_ref: dataset.map(str::to_string),
        finished_at: None,
    }
}

#[tokio::test]
async fn refresh_ingests_latest_run() {
    let ingestor = ingestor();
    let source = FakeSource::new(Some(succeeded("run-5", Some("ds-5"))), batch());

    let outcome = ingestor.refresh(&source, NO_FORCE).await;
    assert!(outcome.success);
    assert_eq!(outcome.run_id.as_deref(), Some("run-5"));
    assert_eq!(outcome.new_posts_count, 3);
}

#[tokio::test]
async fn refresh_skips_dataset_fetch_for_processed_run() {
    let ingestor = ingestor();
    let source = FakeSource::new(Some(succeeded("run-5", Some("ds-5"))), batch());
    ingestor.refresh(&source, NO_FORCE).await;

    let again = ingestor.refresh(&source, NO_FORCE).await;
    assert!(again.already_processed);
    assert_eq!(source.dataset_calls.load(Ordering::SeqCst), 1);

    let forced = ingestor.refresh(&source, FORCE).await;
    assert!(!forced.already_processed);
    assert_eq!(source.dataset_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn refresh_without_successful_run_is_source_unavailable() {
    let ingestor = ingestor();
    let outcome = ingestor.refresh(&FakeSource::new(None, vec![]), NO_FORCE).await;
    assert_eq!(outcome.failure, Some(IngestFailure::SourceUnavailable));

    let mut running = succeeded("run-6", Some("ds-6"));
    running.status = "RUNNING".to_string();
    let outcome = ingestor
        .refresh(&FakeSource::new(Some(running), batch()), NO_FORCE)
        .await;
    assert_eq!(outcome.failure, Some(IngestFailure::SourceUnavailable));
    assert!(ingestor.ledger().last_run().await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_falls_back_to_default_dataset() {
    let source = FakeSource::new(Some(succeeded("run-7", None)), batch());

    let without = ingestor().refresh(&source, NO_FORCE).await;
    assert_eq!(without.failure, Some(IngestFailure::SourceUnavailable));

    let with = ingestor()
        .with_default_dataset(Some("ds-default".to_string()))
        .refresh(&source, NO_FORCE)
        .await;
    assert!(with.success);
}

#[tokio::test]
async fn refresh_of_empty_dataset_is_source_unavailable() {
    let ingestor = ingestor();
    let source = FakeSource::new(Some(succeeded("run-e", Some("ds-e"))), vec![]);
    let outcome = ingestor.refresh(&source, NO_FORCE).await;
    assert!(!outcome.success);
    assert_eq!(outcome.failure, Some(IngestFailure::SourceUnavailable));
    assert_eq!(outcome.run_id.as_deref(), Some("run-e"));
    assert!(ingestor.ledger().last_run().await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_dataset_error_is_source_unavailable() {
    let ingestor = ingestor();
    let source = FakeSource::new(Some(succeeded("run-8", Some("missing"))), batch());
    let outcome = ingestor.refresh(&source, NO_FORCE).await;
    assert_eq!(outcome.failure, Some(IngestFailure::SourceUnavailable));
    assert!(outcome.message.contains("not found"));
}

fn config(max_retained: usize, dataset: Option<&str>) -> AppConfig {
    AppConfig {
        env: Environment::Test,
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "info".to_string(),
        brands_path: "brands.yaml".into(),
        storage: StorageKind::Memory,
        data_dir: "data".into(),
        database_url: None,
        max_post_age_days: 730,
        max_retained,
        apify_api_token: None,
        apify_task_id: None,
        apify_dataset_id: dataset.map(str::to_string),
        apify_request_timeout_secs: 30,
        apify_max_retries: 0,
        webhook_secret: None,
        refresh_cron: "0 0 * * * *".to_string(),
    }
}

#[tokio::test]
async fn from_config_applies_cap_and_default_dataset() {
    let directory = Arc::new(BrandDirectory::from_config(
        &parse_brands(YAML).expect("valid fixture"),
    ));
    let ingestor = Ingestor::from_config(
        &config(2, Some("ds-default")),
        directory,
        Arc::new(MemoryBackend::new()),
    );
    assert_eq!(ingestor.posts().max_retained(), 2);

    let source = FakeSource::new(Some(succeeded("run-1", None)), batch());
    let outcome = ingestor.refresh(&source, NO_FORCE).await;
    assert!(outcome.success);
    assert_eq!(ingestor.posts().get_all().await.unwrap().len(), 2);
}

#[test]
fn outcome_serializes_with_camel_case_keys() {
    let outcome = IngestOutcome::skipped("run-1");
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["runId"], "run-1");
    assert_eq!(json["newPostsCount"], 0);
    assert_eq!(json["alreadyProcessed"], true);
    assert!(json.get("failure").is_none());
}
