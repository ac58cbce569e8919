pub mod api; // HTTP surface
pub mod config;
pub mod db;
pub mod egfr; // CKD-EPI 2021
pub mod export; // PDF + plain text artifacts
pub mod models;
pub mod range_table; // Administrator staging rules
pub mod report;
pub mod resolution; // Score → staging rule

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::{DatabaseLocation, ServerConfig};
use crate::range_table::{MemoryRangeTable, RangeTableStore, SqliteRangeTable};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Store(#[from] range_table::StoreError),
    #[error("Server failed to start: {0}")]
    Server(String),
}

/// Open the configured range table, seeding the default staging rules when
/// asked to and the table is empty.
pub fn open_store(config: &ServerConfig) -> Result<Arc<dyn RangeTableStore>, StartupError> {
    let store: Arc<dyn RangeTableStore> = match &config.database {
        DatabaseLocation::Memory => Arc::new(MemoryRangeTable::new()),
        DatabaseLocation::File(path) => {
            tracing::info!(path = %path.display(), "Opening range table");
            Arc::new(SqliteRangeTable::open(path)?)
        }
    };

    if config.seed_defaults {
        range_table::seed_defaults_if_empty(store.as_ref())?;
    }
    Ok(store)
}

pub async fn run() -> Result<(), StartupError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServerConfig::from_env()?;
    if config.tokens.is_empty() {
        tracing::warn!("No bearer tokens configured; only /api/health is reachable");
    }

    let store = open_store(&config)?;
    let ctx = api::ApiContext::from_config(store, &config);

    let mut server = api::start_api_server(ctx, config.bind)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.session.server_addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    server.shutdown();
    server.wait().await;
    Ok(())
}
