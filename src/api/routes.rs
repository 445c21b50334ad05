use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::{LatencySnapshot, UpstreamLatency};
use crate::config::{parse_seasons, DEFAULT_LIMIT, DEFAULT_SEASON_GAMES, MAX_LIMIT};
use crate::db::models::{DraftPickRow, NewPick};
use crate::db::DraftBoard;
use crate::error::AppError;
use crate::projection::played::did_play;
use crate::projection::scoring::points;
use crate::service::{ProjectionQuery, ProjectionService, Target};
use crate::types::{
    Player, Position, ProjectionsResponse, RankBy, ScoringConfig, ScoringPreset, WeeklyStat,
};

const DEFAULT_SEARCH_LIMIT: usize = 20;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ProjectionService>,
    pub board: DraftBoard,
    pub health: Arc<HealthState>,
    pub latency: Arc<UpstreamLatency>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/projections", get(get_projections))
        .route("/players/search", get(search_players))
        .route("/players/:id", get(get_player))
        .route("/players/:id/weekly", get(get_player_weekly))
        .route(
            "/draft/picks",
            get(list_picks).post(add_pick).delete(reset_picks),
        )
        .route("/draft/picks/:player_id", delete(remove_pick))
        .route("/draft/undo", post(undo_pick))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

/// Raw `/projections` params. Numbers arrive as text and are validated in
/// `parse_projection_query`.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectionsParams {
    pub preset: Option<String>,
    #[serde(rename = "passTd")]
    pub pass_td_camel: Option<String>,
    pub pass_td: Option<String>,
    pub position: Option<String>,
    pub ids: Option<String>,
    pub exclude: Option<String>,
    pub exclude_drafted: Option<String>,
    pub limit: Option<String>,
    pub seasons: Option<String>,
    pub rank: Option<String>,
    pub games: Option<String>,
    pub fast: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WeeklyParams {
    pub seasons: Option<String>,
    pub preset: Option<String>,
    #[serde(rename = "passTd")]
    pub pass_td_camel: Option<String>,
    pub pass_td: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct WeeklyRow {
    #[serde(flatten)]
    pub stat: WeeklyStat,
    pub points: f64,
    pub played: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub builds_ok: u64,
    pub builds_failed: u64,
    pub upstream_failures: u64,
    pub last_build_at_ms: Option<u64>,
    pub position_entries: usize,
    pub id_entries: usize,
    pub cached_pages: usize,
}

// ---------------------------------------------------------------------------
// Param parsing
// ---------------------------------------------------------------------------

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_scoring(
    preset: Option<&str>,
    pass_td_camel: Option<&str>,
    pass_td: Option<&str>,
) -> Result<ScoringConfig, AppError> {
    let preset = match preset.map(str::trim).filter(|s| !s.is_empty()) {
        Some(p) => p.parse::<ScoringPreset>()?,
        None => ScoringPreset::Ppr,
    };
    let pass_td = match pass_td_camel.or(pass_td).map(str::trim) {
        Some(raw) => raw
            .parse::<u8>()
            .map_err(|_| AppError::BadRequest(format!("passTd must be 4 or 6, got '{raw}'")))?,
        None => 4,
    };
    ScoringConfig::new(preset, pass_td)
}

/// `true`/`false`, `1`/`0` or `yes`/`no`, any case. Absent or blank is `false`.
fn parse_flag(raw: Option<&str>, name: &str) -> Result<bool, AppError> {
    match raw.map(|r| r.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(false),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(AppError::BadRequest(format!(
            "{name} must be true or false, got '{other}'"
        ))),
    }
}

/// Clamped to `1..=MAX_LIMIT`; `default` when absent.
fn parse_limit(raw: Option<&str>, default: usize) -> Result<usize, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => {
            let n = raw
                .parse::<i64>()
                .map_err(|_| AppError::BadRequest(format!("limit must be a number, got '{raw}'")))?;
            Ok(n.clamp(1, MAX_LIMIT as i64) as usize)
        }
        None => Ok(default),
    }
}

fn parse_seasons_param(raw: Option<&str>) -> Option<Vec<u16>> {
    let seasons = parse_seasons(raw?);
    (!seasons.is_empty()).then_some(seasons)
}

/// Turns raw params into a validated query. Explicit ids win over `position`;
/// with neither, every position is served.
pub fn parse_projection_query(p: &ProjectionsParams) -> Result<ProjectionQuery, AppError> {
    let scoring = parse_scoring(
        p.preset.as_deref(),
        p.pass_td_camel.as_deref(),
        p.pass_td.as_deref(),
    )?;

    let ids = split_list(p.ids.as_deref());
    let target = if !ids.is_empty() {
        Target::Ids(ids)
    } else {
        match p.position.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => Target::All,
            Some(raw) if raw.eq_ignore_ascii_case("ALL") => Target::All,
            Some(raw) => Target::Position(raw.parse::<Position>()?),
        }
    };

    let limit = parse_limit(p.limit.as_deref(), DEFAULT_LIMIT)?;

    let games = match p.games.as_deref().map(str::trim) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| AppError::BadRequest(format!("games must be a number, got '{raw}'")))?
            .max(1),
        None => DEFAULT_SEASON_GAMES,
    };
    let rank = match p.rank.as_deref().map(|r| r.trim().to_ascii_lowercase()) {
        None => RankBy::PerGame,
        Some(r) if r == "ppg" => RankBy::PerGame,
        Some(r) if r == "season" || r == "total" => RankBy::SeasonTotal { games },
        Some(other) => {
            return Err(AppError::BadRequest(format!(
                "unsupported rank '{other}'; expected ppg or season"
            )))
        }
    };

    Ok(ProjectionQuery {
        scoring,
        target,
        exclude: split_list(p.exclude.as_deref()).into_iter().collect(),
        limit,
        seasons: parse_seasons_param(p.seasons.as_deref()),
        rank,
        fast: parse_flag(p.fast.as_deref(), "fast")?,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_projections(
    State(state): State<ApiState>,
    Query(params): Query<ProjectionsParams>,
) -> Result<Json<ProjectionsResponse>, AppError> {
    let mut query = parse_projection_query(&params)?;
    if parse_flag(params.exclude_drafted.as_deref(), "exclude_drafted")? {
        query.exclude.extend(state.board.drafted_ids().await?);
    }
    Ok(Json(state.service.get_projections(query).await?))
}

async fn search_players(
    State(state): State<ApiState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Player>>, AppError> {
    let limit = parse_limit(params.limit.as_deref(), DEFAULT_SEARCH_LIMIT)?;
    let hits = state
        .service
        .search(params.q.as_deref().unwrap_or_default(), limit)
        .await?;
    Ok(Json(hits))
}

async fn get_player(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
) -> Result<Json<Player>, AppError> {
    Ok(Json(state.service.player(&player_id).await?))
}

async fn get_player_weekly(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
    Query(params): Query<WeeklyParams>,
) -> Result<Json<Vec<WeeklyRow>>, AppError> {
    let scoring = parse_scoring(
        params.preset.as_deref(),
        params.pass_td_camel.as_deref(),
        params.pass_td.as_deref(),
    )?;
    state.service.player(&player_id).await?;

    let seasons = parse_seasons_param(params.seasons.as_deref());
    let rows = state
        .service
        .weekly_history(&player_id, seasons.as_deref())
        .await?
        .into_iter()
        .map(|stat| WeeklyRow {
            points: points(&stat, &scoring),
            played: did_play(&stat),
            stat,
        })
        .collect();
    Ok(Json(rows))
}

async fn list_picks(State(state): State<ApiState>) -> Result<Json<Vec<DraftPickRow>>, AppError> {
    Ok(Json(state.board.picks().await?))
}

async fn add_pick(
    State(state): State<ApiState>,
    Json(pick): Json<NewPick>,
) -> Result<(StatusCode, Json<DraftPickRow>), AppError> {
    let row = state.board.record_pick(&pick).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn remove_pick(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.board.remove_pick(&player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn undo_pick(State(state): State<ApiState>) -> Result<Json<DraftPickRow>, AppError> {
    Ok(Json(state.board.undo_last().await?))
}

async fn reset_picks(State(state): State<ApiState>) -> Result<Json<serde_json::Value>, AppError> {
    let removed = state.board.reset().await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let h = &state.health;
    let last = h.last_build_at_ms();
    Json(HealthResponse {
        status: "ok",
        cache_hits: h.cache_hits(),
        cache_misses: h.cache_misses(),
        builds_ok: h.builds_ok(),
        builds_failed: h.builds_failed(),
        upstream_failures: h.upstream_failures(),
        last_build_at_ms: (last > 0).then_some(last),
        position_entries: state.service.store().position_entry_count(),
        id_entries: state.service.store().id_entry_count(),
        cached_pages: state.service.fetcher().cached_pages(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}
