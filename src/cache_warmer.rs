use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::interval;
use tracing::{error, info};

use crate::config::WARM_INTERVAL_SECS;
use crate::service::ProjectionService;
use crate::types::ScoringConfig;

/// Keeps the default-scoring position entries warm so the first draft-room
/// request doesn't pay for a full build.
pub struct CacheWarmer {
    service: Arc<ProjectionService>,
    scoring: ScoringConfig,
    every: Duration,
}

impl CacheWarmer {
    pub fn new(service: Arc<ProjectionService>) -> Self {
        Self {
            service,
            scoring: ScoringConfig::default(),
            every: Duration::from_secs(WARM_INTERVAL_SECS),
        }
    }

    pub async fn run(self) {
        // first tick fires immediately, so startup warms right away
        let mut ticker = interval(self.every);

        loop {
            ticker.tick().await;
            if let Err(e) = self.warm().await {
                error!("Cache warm failed, retrying next tick: {e}");
            }
        }
    }

    async fn warm(&self) -> crate::error::Result<()> {
        let started = Instant::now();
        let rows = self.service.warm(&self.scoring).await?;
        info!(
            scoring = %self.scoring.key(),
            rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cache warm complete: {rows} rows across all positions",
        );
        Ok(())
    }
}
