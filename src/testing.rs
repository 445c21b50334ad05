//! In-process fake of the upstream stats API for tests.
//!
//! Routes:
//! - `GET /players` — the roster, or 503 while the roster is marked down
//! - `GET /primary/:season/:week` — the week as a bare array (500 when `primary_down`)
//! - `GET /secondary/:season/:week` — the same week wrapped as `{"stats": [...]}`
//!
//! Weeks that were never registered come back as an empty array. Weeks listed in
//! `failing_weeks` return 500 from both week routes, as do all weeks while the
//! weeks are marked down.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::config::Config;

#[derive(Default)]
pub struct FakeUpstream {
    pub roster: Value,
    pub weeks: HashMap<(u16, u8), Value>,
    pub primary_down: bool,
    pub primary_delay: Option<Duration>,
    pub failing_weeks: HashSet<(u16, u8)>,
}

struct FakeState {
    upstream: FakeUpstream,
    roster_down: AtomicBool,
    weeks_down: AtomicBool,
    roster_hits: AtomicUsize,
    week_hits: AtomicUsize,
    weeks_in_flight: AtomicUsize,
    peak_weeks_in_flight: AtomicUsize,
}

/// Counts one week request as in flight until dropped, tracking the peak.
struct InFlight<'a>(&'a FakeState);

impl<'a> InFlight<'a> {
    fn enter(state: &'a FakeState) -> Self {
        state.week_hits.fetch_add(1, Ordering::SeqCst);
        let now = state.weeks_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak_weeks_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.weeks_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct RunningUpstream {
    pub base_url: String,
    state: Arc<FakeState>,
}

impl FakeUpstream {
    pub fn with_week(mut self, season: u16, week: u8, body: Value) -> Self {
        self.weeks.insert((season, week), body);
        self
    }

    pub async fn start(self) -> RunningUpstream {
        let state = Arc::new(FakeState {
            upstream: self,
            roster_down: AtomicBool::new(false),
            weeks_down: AtomicBool::new(false),
            roster_hits: AtomicUsize::new(0),
            week_hits: AtomicUsize::new(0),
            weeks_in_flight: AtomicUsize::new(0),
            peak_weeks_in_flight: AtomicUsize::new(0),
        });
        let app = Router::new()
            .route("/players", get(roster))
            .route("/primary/:season/:week", get(primary))
            .route("/secondary/:season/:week", get(secondary))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake upstream");
        let addr = listener.local_addr().expect("fake upstream addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        RunningUpstream {
            base_url: format!("http://{addr}"),
            state,
        }
    }
}

impl RunningUpstream {
    /// Engine config pointed at this fake: one roster endpoint, primary then secondary week endpoints.
    pub fn config(&self) -> Config {
        Config {
            log_level: "debug".to_string(),
            db_path: ":memory:".to_string(),
            api_port: 0,
            seasons: vec![2024],
            player_endpoints: vec![format!("{}/players", self.base_url)],
            week_endpoints: vec![
                format!("{}/primary/{{season}}/{{week}}", self.base_url),
                format!("{}/secondary/{{season}}/{{week}}", self.base_url),
            ],
            fetch_concurrency: 4,
            fetch_timeout_secs: 5,
            cache_ttl_secs: 3600,
            warm_cache: false,
        }
    }

    pub fn roster_hits(&self) -> usize {
        self.state.roster_hits.load(Ordering::SeqCst)
    }

    pub fn week_hits(&self) -> usize {
        self.state.week_hits.load(Ordering::SeqCst)
    }

    /// Most week requests the fake ever served at the same time.
    pub fn peak_week_concurrency(&self) -> usize {
        self.state.peak_weeks_in_flight.load(Ordering::SeqCst)
    }

    pub fn set_roster_down(&self, down: bool) {
        self.state.roster_down.store(down, Ordering::SeqCst);
    }

    pub fn set_weeks_down(&self, down: bool) {
        self.state.weeks_down.store(down, Ordering::SeqCst);
    }
}

async fn roster(State(state): State<Arc<FakeState>>) -> Response {
    state.roster_hits.fetch_add(1, Ordering::SeqCst);
    if state.roster_down.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(state.upstream.roster.clone()).into_response()
}

fn week_failing(state: &FakeState, season: u16, week: u8) -> bool {
    state.weeks_down.load(Ordering::SeqCst) || state.upstream.failing_weeks.contains(&(season, week))
}

fn week_body(state: &FakeState, season: u16, week: u8) -> Value {
    state
        .upstream
        .weeks
        .get(&(season, week))
        .cloned()
        .unwrap_or_else(|| json!([]))
}

async fn primary(
    State(state): State<Arc<FakeState>>,
    Path((season, week)): Path<(u16, u8)>,
) -> Response {
    let _in_flight = InFlight::enter(&state);
    if let Some(delay) = state.upstream.primary_delay {
        tokio::time::sleep(delay).await;
    }
    if state.upstream.primary_down || week_failing(&state, season, week) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(week_body(&state, season, week)).into_response()
}

async fn secondary(
    State(state): State<Arc<FakeState>>,
    Path((season, week)): Path<(u16, u8)>,
) -> Response {
    let _in_flight = InFlight::enter(&state);
    if week_failing(&state, season, week) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({ "stats": week_body(&state, season, week) })).into_response()
}

/// Roster record in the upstream's shape.
pub fn roster_entry(name: &str, position: &str, birth_date: Option<&str>) -> Value {
    json!({
        "full_name": name,
        "position": position,
        "team": "FA",
        "birth_date": birth_date,
    })
}
