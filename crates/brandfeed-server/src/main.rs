mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use brandfeed_apify::ApifyClient;
use brandfeed_core::{BrandDirectory, Environment, RunSource};
use brandfeed_pipeline::Ingestor;
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::{AuthState, RateLimits},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(brandfeed_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(config = ?config, "configuration loaded");

    let brands = brandfeed_core::load_brands(&config.brands_path)?;
    let directory = Arc::new(BrandDirectory::from_config(&brands));
    for overlap in directory.overlaps() {
        tracing::warn!(
            alias = %overlap.alias,
            replaced = %overlap.replaced,
            winner = %overlap.winner,
            "alias registered for two brands"
        );
    }

    let backend = brandfeed_store::open_backend(&config).await?;
    let ingestor = Ingestor::from_config(&config, directory, backend);

    let source: Option<Arc<dyn RunSource>> = match ApifyClient::from_config(&config)? {
        Some(client) => Some(Arc::new(client) as Arc<dyn RunSource>),
        None => {
            tracing::warn!("APIFY_API_TOKEN not set; refresh from Apify disabled");
            None
        }
    };

    let _scheduler =
        scheduler::build_scheduler(ingestor.clone(), source.clone(), &config.refresh_cron).await?;

    let auth = AuthState::from_env(matches!(config.env, Environment::Development))?;
    let state = AppState {
        ingestor,
        source,
        webhook_secret: config.webhook_secret.as_deref().map(Arc::from),
        storage: config.storage,
    };
    let app = build_app(state, auth, &RateLimits::default());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, storage = %config.storage, "brandfeed server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
