//! Persistence for the post feed and the run ledger.
//!
//! Both stores sit on a [`StateBackend`] holding named JSON slots, so the
//! pipeline never knows whether it is talking to files, memory or Postgres.

use std::path::PathBuf;
use std::sync::Arc;

use brandfeed_core::{AppConfig, StorageKind};
use thiserror::Error;

mod backend;
mod file;
mod ledger;
mod memory;
mod postgres;
mod posts;

pub use backend::StateBackend;
pub use file::FileBackend;
pub use ledger::RunLedger;
pub use memory::MemoryBackend;
pub use postgres::{connect_pool, run_migrations, PgBackend};
pub use posts::{MergeReport, PostStore, DEFAULT_MAX_RETAINED};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("slot '{slot}' holds malformed JSON: {source}")]
    Decode {
        slot: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode slot '{slot}': {source}")]
    Encode {
        slot: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("DATABASE_URL is required for postgres storage")]
    MissingDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Open the backend selected by `config.storage`.
///
/// The Postgres backend connects and applies pending migrations before it is
/// returned.
///
/// # Errors
///
/// Returns [`StoreError`] if the database cannot be reached or migrated.
pub async fn open_backend(config: &AppConfig) -> Result<Arc<dyn StateBackend>, StoreError> {
    match config.storage {
        StorageKind::File => Ok(Arc::new(FileBackend::new(config.data_dir.clone()))),
        StorageKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        StorageKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(StoreError::MissingDatabaseUrl)?;
            let pool = connect_pool(url).await?;
            let applied = run_migrations(&pool).await?;
            tracing::info!(applied, "feed_state migrations up to date");
            Ok(Arc::new(PgBackend::new(pool)))
        }
    }
}
