use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Where the feed and the run ledger are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// JSON files under `data_dir`.
    File,
    /// Process memory; lost on restart.
    Memory,
    /// A singleton-row table in Postgres.
    Postgres,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::File => write!(f, "file"),
            StorageKind::Memory => write!(f, "memory"),
            StorageKind::Postgres => write!(f, "postgres"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub brands_path: PathBuf,
    pub storage: StorageKind,
    pub data_dir: PathBuf,
    /// Required when `storage` is [`StorageKind::Postgres`].
    pub database_url: Option<String>,
    pub max_post_age_days: u32,
    pub max_retained: usize,
    pub apify_api_token: Option<String>,
    pub apify_task_id: Option<String>,
    pub apify_dataset_id: Option<String>,
    pub apify_request_timeout_secs: u64,
    pub apify_max_retries: u32,
    pub webhook_secret: Option<String>,
    pub refresh_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("brands_path", &self.brands_path)
            .field("storage", &self.storage)
            .field("data_dir", &self.data_dir)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("max_post_age_days", &self.max_post_age_days)
            .field("max_retained", &self.max_retained)
            .field(
                "apify_api_token",
                &self.apify_api_token.as_ref().map(|_| "[redacted]"),
            )
            .field("apify_task_id", &self.apify_task_id)
            .field("apify_dataset_id", &self.apify_dataset_id)
            .field(
                "apify_request_timeout_secs",
                &self.apify_request_timeout_secs,
            )
            .field("apify_max_retries", &self.apify_max_retries)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("refresh_cron", &self.refresh_cron)
            .finish()
    }
}
