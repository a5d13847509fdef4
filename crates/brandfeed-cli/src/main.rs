mod brands;
mod feed;
mod ingest;

use std::path::PathBuf;
use std::sync::Arc;

use brandfeed_core::{AppConfig, BrandDirectory};
use brandfeed_pipeline::Ingestor;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "brandfeed-cli")]
#[command(about = "Brand feed command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ingest a dataset exported to a JSON file
    Ingest {
        /// JSON array of raw items, or an object with a `data` array
        #[arg(long)]
        file: PathBuf,
        /// Run id recorded in the ledger
        #[arg(long)]
        run_id: String,
        /// Re-process the run even if it was already ingested
        #[arg(long)]
        force: bool,
    },
    /// Pull the latest successful Apify run and ingest it
    Refresh {
        #[arg(long)]
        force: bool,
    },
    /// Print the stored feed, newest first
    Posts {
        /// Only posts of this brand (case-insensitive)
        #[arg(long)]
        brand: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Remove seeded placeholder posts from the stored feed
    PurgeSamples,
    /// Print the brand directory, the tracked list and alias overlaps
    Brands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = brandfeed_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let directory = Arc::new(load_directory(&config)?);

    match cli.command {
        Commands::Brands => brands::run_brands(&directory),
        Commands::Ingest {
            file,
            run_id,
            force,
        } => {
            let ingestor = open_ingestor(&config, directory).await?;
            ingest::run_ingest_file(&ingestor, &file, &run_id, force).await
        }
        Commands::Refresh { force } => {
            let ingestor = open_ingestor(&config, directory).await?;
            ingest::run_refresh(&ingestor, &config, force).await
        }
        Commands::Posts { brand, limit } => {
            let ingestor = open_ingestor(&config, directory).await?;
            feed::run_posts(ingestor.posts(), brand.as_deref(), limit).await
        }
        Commands::PurgeSamples => {
            let ingestor = open_ingestor(&config, directory).await?;
            feed::run_purge_samples(ingestor.posts()).await
        }
    }
}

fn load_directory(config: &AppConfig) -> anyhow::Result<BrandDirectory> {
    let brands = brandfeed_core::load_brands(&config.brands_path)?;
    Ok(BrandDirectory::from_config(&brands))
}

async fn open_ingestor(
    config: &AppConfig,
    directory: Arc<BrandDirectory>,
) -> anyhow::Result<Ingestor> {
    let backend = brandfeed_store::open_backend(config).await?;
    Ok(Ingestor::from_config(config, directory, backend))
}

#[cfg(test)]
mod tests;
