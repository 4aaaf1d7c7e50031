pub mod config;
pub mod devices;
pub mod error;
pub mod events;
pub mod identity;
pub mod profiles;
pub mod rest;
pub mod results;
pub mod storage;
pub mod telemetry;

use std::sync::Arc;

use config::ServerConfig;
use results::ResultsStorage;
use storage::Storage;
use telemetry::TelemetryStorage;

/// Shared application state passed to every route handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub storage: Arc<Storage>,
    /// Append-only telemetry rows, sharing the same SQLite pool.
    pub telemetry: Arc<TelemetryStorage>,
    /// Generated result documents, sharing the same SQLite pool.
    pub results: Arc<ResultsStorage>,
    pub started_at: std::time::Instant,
}

impl AppContext {
    pub async fn new(config: Arc<ServerConfig>) -> anyhow::Result<Self> {
        let storage = Arc::new(
            Storage::new_with_slow_query(&config.data_dir, config.slow_query_threshold_ms).await?,
        );
        let telemetry = Arc::new(TelemetryStorage::new(storage.pool()));
        let results = Arc::new(ResultsStorage::new(storage.pool()));
        Ok(Self {
            config,
            storage,
            telemetry,
            results,
            started_at: std::time::Instant::now(),
        })
    }
}
