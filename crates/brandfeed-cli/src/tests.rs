use std::io::Write;

use brandfeed_core::{parse_brands, CanonicalPost};
use brandfeed_pipeline::{IngestFailure, IngestOutcome, TransformStats};
use brandfeed_store::{MemoryBackend, PostStore, RunLedger, StateBackend};
use chrono::{TimeDelta, Utc};
use clap::Parser;

use super::*;

const YAML: &str = r"
tracked: [Nike]
brands:
  - name: Nike
    category: Fashion
    sub_brands:
      - name: Nike
        account: nike
      - name: Jordan
        account: jumpman23
        keywords: [jordan, airjordan]
      - name: Converse
        account: converse
  - name: Google
    category: Technology
    sub_brands:
      - name: Google
        account: google
        keywords: [jordan]
";

fn directory() -> BrandDirectory {
    BrandDirectory::from_config(&parse_brands(YAML).expect("valid fixture"))
}

fn ingestor() -> Ingestor {
    let backend: Arc<dyn StateBackend> = Arc::new(MemoryBackend::new());
    Ingestor::new(
        Arc::new(directory()),
        Arc::new(PostStore::new(Arc::clone(&backend), 100)),
        Arc::new(RunLedger::new(backend)),
        TimeDelta::days(730),
    )
}

#[test]
fn parses_ingest_command() {
    let cli = Cli::try_parse_from([
        "brandfeed-cli",
        "ingest",
        "--file",
        "dataset.json",
        "--run-id",
        "run-7",
        "--force",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Commands::Ingest {
            file,
            run_id,
            force,
        } => {
            assert_eq!(file, PathBuf::from("dataset.json"));
            assert_eq!(run_id, "run-7");
            assert!(force);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn ingest_requires_run_id() {
    assert!(Cli::try_parse_from(["brandfeed-cli", "ingest", "--file", "x.json"]).is_err());
}

#[test]
fn parses_refresh_without_force() {
    let cli = Cli::try_parse_from(["brandfeed-cli", "refresh"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Refresh { force: false }));
}

#[test]
fn posts_limit_defaults_to_twenty() {
    let cli = Cli::try_parse_from(["brandfeed-cli", "posts", "--brand", "Nike"])
        .expect("expected valid cli args");
    match cli.command {
        Commands::Posts { brand, limit } => {
            assert_eq!(brand.as_deref(), Some("Nike"));
            assert_eq!(limit, 20);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_purge_samples_and_brands() {
    let cli = Cli::try_parse_from(["brandfeed-cli", "purge-samples"]).unwrap();
    assert!(matches!(cli.command, Commands::PurgeSamples));
    let cli = Cli::try_parse_from(["brandfeed-cli", "brands"]).unwrap();
    assert!(matches!(cli.command, Commands::Brands));
}

#[test]
fn missing_subcommand_is_an_error() {
    assert!(Cli::try_parse_from(["brandfeed-cli"]).is_err());
}

#[test]
fn parse_dataset_accepts_array_and_data_wrapper() {
    let items = ingest::parse_dataset(r#"[{"id": "1"}, {"id": "2"}]"#).unwrap();
    assert_eq!(items.len(), 2);

    let items = ingest::parse_dataset(r#"{"runId": "r", "data": [{"id": "1"}]}"#).unwrap();
    assert_eq!(items.len(), 1);
}

#[test]
fn parse_dataset_rejects_other_shapes() {
    assert!(ingest::parse_dataset(r#"{"items": []}"#).is_err());
    assert!(ingest::parse_dataset("42").is_err());
    assert!(ingest::parse_dataset("not json").is_err());
}

#[tokio::test]
async fn ingest_file_stores_qualifying_posts() {
    let now = Utc::now().timestamp_millis();
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        "{}",
        serde_json::json!([
            {"ownerUsername": "nike", "id": "501", "timestamp": now, "displayUrl": "https://cdn/501.jpg"},
            {"ownerUsername": "converse", "id": "502", "timestamp": now, "displayUrl": "https://cdn/502.jpg"}
        ])
    )
    .expect("write dataset");

    let ingestor = ingestor();
    ingest::run_ingest_file(&ingestor, file.path(), "file-run", false)
        .await
        .expect("ingest succeeds");

    let feed = ingestor.posts().get_all().await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, "nike-501");
    assert_eq!(
        ingestor.ledger().last_run().await.unwrap().map(|r| r.item_count),
        Some(2)
    );
}

#[tokio::test]
async fn ingest_file_with_no_qualifying_posts_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, r#"[{{"ownerUsername": "converse", "id": "1"}}]"#).expect("write dataset");

    let result = ingest::run_ingest_file(&ingestor(), file.path(), "file-run", false).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn ingest_missing_file_is_an_error() {
    let result = ingest::run_ingest_file(
        &ingestor(),
        std::path::Path::new("/definitely/not/here.json"),
        "run",
        false,
    )
    .await;
    assert!(result.is_err());
}

#[test]
fn render_outcome_includes_stats() {
    let outcome = IngestOutcome {
        success: false,
        message: "none of the 3 items in run r1 qualified as posts".to_string(),
        run_id: Some("r1".to_string()),
        new_posts_count: 0,
        already_processed: false,
        stats: Some(TransformStats {
            total: 3,
            singles: 3,
            filtered_by_brand: 2,
            filtered_by_media: 1,
            ..TransformStats::default()
        }),
        failure: Some(IngestFailure::NoQualifyingPosts),
    };
    let text = ingest::render_outcome(&outcome);
    assert!(text.contains("run:          r1"));
    assert!(text.contains("filtered:     2 brand, 0 age, 1 media"));
}

#[test]
fn render_posts_truncates_long_captions() {
    let post = CanonicalPost {
        id: "nike-abc".to_string(),
        brand: "Nike".to_string(),
        source: "instagram".to_string(),
        source_post_id: "abc".to_string(),
        media_url: "https://cdn/abc.jpg".to_string(),
        caption: "x".repeat(80),
        timestamp: 1_735_689_600_000,
        external_url: None,
    };
    let text = feed::render_posts(&[post]);
    let row = text.lines().nth(1).expect("one row");
    assert!(row.starts_with("2025-01-01 00:00"));
    assert!(row.contains("nike-abc"));
    assert!(row.ends_with(&format!("{}...", "x".repeat(50))));
}

#[test]
fn render_brands_marks_tracked_and_overlaps() {
    let text = brands::render_brands(&directory());
    assert!(text.contains("Fashion:"));
    assert!(text.contains("Technology:"));
    assert!(text.contains("* Nike"));
    assert!(!text.contains("* Converse"));
    assert!(text.contains("tracked: Nike"));
    assert!(text.contains("warning: alias 'jordan' maps to Google (was Jordan)"));
}
