mod api;
mod cache_warmer;
mod config;
mod db;
mod error;
mod fetcher;
mod projection;
mod service;
mod state;
mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::UpstreamLatency;
use crate::api::routes::{router, ApiState};
use crate::cache_warmer::CacheWarmer;
use crate::config::Config;
use crate::db::DraftBoard;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::service::ProjectionService;
use crate::state::ProjectionStore;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let options = SqliteConnectOptions::new()
        .filename(&cfg.db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Draft board ready at {}", cfg.db_path);

    // --- Shared services ---
    let health = Arc::new(HealthState::new());
    let latency = Arc::new(UpstreamLatency::new());
    let fetcher = Fetcher::new(&cfg, Arc::clone(&latency), Arc::clone(&health))?;
    let store = ProjectionStore::new(Duration::from_secs(cfg.cache_ttl_secs));
    let service = Arc::new(ProjectionService::new(
        fetcher,
        store,
        Arc::clone(&health),
        cfg.seasons.clone(),
    ));
    info!(
        seasons = ?cfg.seasons,
        concurrency = cfg.fetch_concurrency,
        timeout_secs = cfg.fetch_timeout_secs,
        ttl_secs = cfg.cache_ttl_secs,
        "Projection engine configured: {} week endpoint(s), {} roster endpoint(s)",
        cfg.week_endpoints.len(),
        cfg.player_endpoints.len(),
    );

    // Cache warmer (background, on start then every 30 min)
    if cfg.warm_cache {
        let warmer = CacheWarmer::new(Arc::clone(&service));
        tokio::spawn(async move { warmer.run().await });
    } else {
        info!("WARM_CACHE disabled: positions build on first request");
    }

    // HTTP API server
    let api_state = ApiState {
        service,
        board: DraftBoard::new(pool),
        health,
        latency,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
