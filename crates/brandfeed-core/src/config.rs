use crate::app_config::{AppConfig, Environment, StorageKind};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Tests drive this with a `HashMap` lookup instead of mutating the process
/// environment.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("BRANDFEED_ENV", "development"));

    let bind_addr = or_default("BRANDFEED_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("BRANDFEED_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("BRANDFEED_LOG_LEVEL", "info");
    let brands_path = PathBuf::from(or_default("BRANDFEED_BRANDS_PATH", "./config/brands.yaml"));

    let storage = parse_storage(&or_default("BRANDFEED_STORAGE", "file"))
        .ok_or_else(|| invalid("BRANDFEED_STORAGE", "expected file, memory, or postgres".into()))?;
    let data_dir = PathBuf::from(or_default("BRANDFEED_DATA_DIR", "./data"));
    let database_url = optional("DATABASE_URL");
    if storage == StorageKind::Postgres && database_url.is_none() {
        return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
    }

    let max_post_age_days = parse_u32("BRANDFEED_MAX_POST_AGE_DAYS", "730")?;
    let max_retained = parse_usize("BRANDFEED_MAX_RETAINED", "100")?;
    if max_retained == 0 {
        return Err(invalid("BRANDFEED_MAX_RETAINED", "must be at least 1".into()));
    }

    let apify_api_token = optional("APIFY_API_TOKEN");
    let apify_task_id = optional("APIFY_TASK_ID");
    let apify_dataset_id = optional("APIFY_DATASET_ID");
    let apify_request_timeout_secs = parse_u64("APIFY_REQUEST_TIMEOUT_SECS", "30")?;
    let apify_max_retries = parse_u32("APIFY_MAX_RETRIES", "3")?;

    let webhook_secret = optional("BRANDFEED_WEBHOOK_SECRET");
    let refresh_cron = or_default("BRANDFEED_REFRESH_CRON", "0 0 * * * *");

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        brands_path,
        storage,
        data_dir,
        database_url,
        max_post_age_days,
        max_retained,
        apify_api_token,
        apify_task_id,
        apify_dataset_id,
        apify_request_timeout_secs,
        apify_max_retries,
        webhook_secret,
        refresh_cron,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

fn parse_storage(s: &str) -> Option<StorageKind> {
    match s.trim().to_ascii_lowercase().as_str() {
        "file" => Some(StorageKind::File),
        "memory" => Some(StorageKind::Memory),
        "postgres" => Some(StorageKind::Postgres),
        _ => None,
    }
}
