use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::{NaiveDate, Utc};
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::projection::builder::{self, bucket_by_player};
use crate::projection::played::sort_chronological;
use crate::state::projection_store::{id_key, position_key};
use crate::state::ProjectionStore;
use crate::types::{
    Player, Position, ProjectionRow, ProjectionsResponse, RankBy, ScoringConfig, WeeklyStat,
};

/// What a projection request asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Position(Position),
    /// Explicit ids. Bypasses the position tables and uses the per-id table.
    Ids(Vec<String>),
    /// All four positions merged.
    All,
}

#[derive(Debug, Clone)]
pub struct ProjectionQuery {
    pub scoring: ScoringConfig,
    pub target: Target,
    /// Removed after projection, before truncation.
    pub exclude: HashSet<String>,
    pub limit: usize,
    /// `None` uses the service defaults.
    pub seasons: Option<Vec<u16>>,
    pub rank: RankBy,
    /// For `All`: serve only what is already cached, unless nothing is.
    pub fast: bool,
}

/// Cache layer in front of the projection builder, plus the lookups the API
/// needs. Built once at startup and shared behind an `Arc`.
pub struct ProjectionService {
    fetcher: Fetcher,
    store: Arc<ProjectionStore>,
    health: Arc<HealthState>,
    default_seasons: Vec<u16>,
}

impl ProjectionService {
    pub fn new(
        fetcher: Fetcher,
        store: Arc<ProjectionStore>,
        health: Arc<HealthState>,
        default_seasons: Vec<u16>,
    ) -> Self {
        Self {
            fetcher,
            store,
            health,
            default_seasons,
        }
    }

    pub fn store(&self) -> &ProjectionStore {
        &self.store
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    fn seasons_or_default(&self, seasons: Option<&[u16]>) -> Vec<u16> {
        match seasons {
            Some(s) if !s.is_empty() => s.to_vec(),
            _ => self.default_seasons.clone(),
        }
    }

    pub async fn get_projections(&self, query: ProjectionQuery) -> Result<ProjectionsResponse> {
        let cfg = query.scoring;
        let seasons = self.seasons_or_default(query.seasons.as_deref());

        let rows: Vec<ProjectionRow> = match &query.target {
            Target::Position(pos) => self.position_rows(&cfg, &seasons, *pos).await?.to_vec(),
            Target::All => self.all_rows(&cfg, &seasons, query.fast).await?,
            Target::Ids(ids) => self.id_rows(&cfg, &seasons, ids).await?,
        };

        Ok(ProjectionsResponse {
            preset: cfg.preset,
            pass_td: cfg.pass_td(),
            players: rank_rows(rows, &query.exclude, query.rank, query.limit),
        })
    }

    /// Pool roster, cached with the projection TTL.
    pub async fn players(&self) -> Result<Arc<Vec<Player>>> {
        if let Some(players) = self.store.roster() {
            return Ok(players);
        }
        let _flight = self.store.enter("roster").await;
        if let Some(players) = self.store.roster() {
            return Ok(players);
        }

        let players = match self.fetcher.fetch_players().await {
            Ok(p) => Arc::new(p),
            Err(e) => {
                error!("Roster fetch failed: {e}");
                return Err(e);
            }
        };
        self.store.put_roster(Arc::clone(&players));
        Ok(players)
    }

    /// Rows for every pool player at `position`, from cache or freshly built.
    pub async fn position_rows(
        &self,
        cfg: &ScoringConfig,
        seasons: &[u16],
        position: Position,
    ) -> Result<Arc<Vec<ProjectionRow>>> {
        let key = position_key(cfg, seasons, position);
        if let Some(rows) = self.cached_position(&key) {
            return Ok(rows);
        }

        let _flight = self.store.enter(&key).await;
        if let Some(rows) = self.cached_position(&key) {
            return Ok(rows);
        }
        self.health.record_miss();

        let started = Instant::now();
        let built = async {
            let roster = self.players().await?;
            let pool: Vec<Player> = roster
                .iter()
                .filter(|p| p.position == position)
                .cloned()
                .collect();
            builder::build(&self.fetcher, &pool, cfg, seasons, today()).await
        }
        .await;

        match built {
            Ok(build) if build.is_complete() => {
                let rows = Arc::new(build.rows);
                self.store.put_position_rows(key.clone(), Arc::clone(&rows));
                self.health.record_build(now_ms());
                info!(
                    key = %key,
                    rows = rows.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Projection build complete for {position}"
                );
                Ok(rows)
            }
            Ok(build) => {
                self.health.record_build_failure();
                warn!(
                    key = %key,
                    failed_pages = build.failed_pages,
                    "Projection build incomplete, serving without caching"
                );
                Ok(Arc::new(build.rows))
            }
            Err(e) => {
                self.health.record_build_failure();
                warn!(key = %key, "Projection build failed, keeping previous entry: {e}");
                Err(e)
            }
        }
    }

    fn cached_position(&self, key: &str) -> Option<Arc<Vec<ProjectionRow>>> {
        let rows = self.store.position_rows(key)?;
        self.health.record_hit();
        debug!(key = %key, "position cache hit");
        Some(rows)
    }

    async fn all_rows(
        &self,
        cfg: &ScoringConfig,
        seasons: &[u16],
        fast: bool,
    ) -> Result<Vec<ProjectionRow>> {
        if fast {
            let cached: Vec<Arc<Vec<ProjectionRow>>> = Position::ALL
                .iter()
                .filter_map(|p| self.cached_position(&position_key(cfg, seasons, *p)))
                .collect();
            if !cached.is_empty() {
                return Ok(cached.iter().flat_map(|rows| rows.iter().cloned()).collect());
            }
            debug!("fast path found nothing cached, building every position");
        }

        // Sequential: later positions reuse pages fetched by the first build.
        let mut merged = Vec::new();
        for position in Position::ALL {
            let rows = self.position_rows(cfg, seasons, position).await?;
            merged.extend(rows.iter().cloned());
        }
        Ok(merged)
    }

    async fn id_rows(
        &self,
        cfg: &ScoringConfig,
        seasons: &[u16],
        ids: &[String],
    ) -> Result<Vec<ProjectionRow>> {
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            if let Some(row) = self.id_row(cfg, seasons, id).await? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// One player's row through the per-id table. `None` when the id isn't a
    /// pool player; unknown ids are never cached.
    pub async fn id_row(
        &self,
        cfg: &ScoringConfig,
        seasons: &[u16],
        player_id: &str,
    ) -> Result<Option<ProjectionRow>> {
        let key = id_key(cfg, seasons, player_id);
        if let Some(row) = self.store.id_row(&key) {
            self.health.record_hit();
            return Ok(Some(row));
        }

        let roster = match self.players().await {
            Ok(r) => r,
            Err(e) => {
                self.health.record_build_failure();
                warn!(key = %key, "Projection build failed: {e}");
                return Err(e);
            }
        };
        let Some(player) = roster.iter().find(|p| p.player_id == player_id) else {
            debug!(player_id = %player_id, "id is not a pool player");
            return Ok(None);
        };

        let _flight = self.store.enter(&key).await;
        if let Some(row) = self.store.id_row(&key) {
            self.health.record_hit();
            return Ok(Some(row));
        }
        self.health.record_miss();

        let build = match builder::build(
            &self.fetcher,
            std::slice::from_ref(player),
            cfg,
            seasons,
            today(),
        )
        .await
        {
            Ok(b) => b,
            Err(e) => {
                self.health.record_build_failure();
                warn!(key = %key, "Projection build failed, keeping previous entry: {e}");
                return Err(e);
            }
        };
        let complete = build.is_complete();
        let Some(row) = build.rows.into_iter().next() else {
            return Ok(None);
        };

        if complete {
            self.store.put_id_row(key, row.clone());
            self.health.record_build(now_ms());
        } else {
            self.health.record_build_failure();
            warn!(key = %key, "Projection build incomplete, serving without caching");
        }
        Ok(Some(row))
    }

    /// Chronological normalized lines for one player, played or not. Errors
    /// only when every weekly page failed; missing pages are otherwise skipped.
    pub async fn weekly_history(
        &self,
        player_id: &str,
        seasons: Option<&[u16]>,
    ) -> Result<Vec<WeeklyStat>> {
        let seasons = self.seasons_or_default(seasons);
        let matrix = self.fetcher.fetch_seasons(&seasons).await;
        if matrix.all_failed() {
            return Err(AppError::Upstream(format!(
                "all {} weekly stat pages failed",
                matrix.pages
            )));
        }
        if !matrix.is_complete() {
            warn!(
                player_id = %player_id,
                failed_pages = matrix.failed_pages,
                "weekly history is missing pages"
            );
        }
        let mut history =
            bucket_by_player(matrix.stats.into_iter().filter(|s| s.player_id == player_id))
                .remove(player_id)
                .unwrap_or_default();
        sort_chronological(&mut history);
        Ok(history)
    }

    pub async fn player(&self, player_id: &str) -> Result<Player> {
        self.players()
            .await?
            .iter()
            .find(|p| p.player_id == player_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("player {player_id} not found")))
    }

    /// Case-insensitive substring match on full name, alphabetical.
    pub async fn search(&self, text: &str, limit: usize) -> Result<Vec<Player>> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Err(AppError::BadRequest("query text is required".to_string()));
        }
        let mut hits: Vec<Player> = self
            .players()
            .await?
            .iter()
            .filter(|p| p.full_name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Brings every position entry for `cfg` up to date. Returns the total row count.
    pub async fn warm(&self, cfg: &ScoringConfig) -> Result<usize> {
        let seasons = self.default_seasons.clone();
        let mut total = 0;
        for position in Position::ALL {
            total += self.position_rows(cfg, &seasons, position).await?.len();
        }
        Ok(total)
    }
}

/// Shared post-processing for every read path: drop excluded ids, order best
/// first (ties by id for a stable order), keep the first `limit`.
pub fn rank_rows(
    rows: Vec<ProjectionRow>,
    exclude: &HashSet<String>,
    rank: RankBy,
    limit: usize,
) -> Vec<ProjectionRow> {
    let mut kept: Vec<ProjectionRow> = rows
        .into_iter()
        .filter(|r| !exclude.contains(&r.player_id))
        .collect();
    kept.sort_by(|a, b| {
        rank.score(b)
            .total_cmp(&rank.score(a))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    kept.truncate(limit);
    kept
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
