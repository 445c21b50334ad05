use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// API response types (mirror draftd's routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RankedPlayer {
    pub player_id: String,
    pub full_name: String,
    pub position: String,
    pub team: Option<String>,
    pub ppg: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct ProjectionsResponse {
    pub preset: String,
    #[serde(rename = "passTd")]
    pub pass_td: u8,
    pub players: Vec<RankedPlayer>,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct DraftPick {
    pub id: i64,
    pub player_id: String,
    pub full_name: Option<String>,
    pub position: Option<String>,
    pub team: Option<String>,
    pub picked_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPick<'a> {
    pub player_id: &'a str,
    pub full_name: &'a str,
    pub position: &'a str,
    pub team: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub builds_failed: u64,
    pub upstream_failures: u64,
    pub last_build_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    error: String,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub const POSITION_FILTERS: [&str; 5] = ["ALL", "QB", "RB", "WR", "TE"];
pub const PRESETS: [&str; 3] = ["PPR", "HALF_PPR", "STANDARD"];
const RANKING_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub base_url: String,
    pub filter_idx: usize,
    pub preset_idx: usize,
    pub pass_td: u8,
    pub rankings: Vec<RankedPlayer>,
    pub picks: Vec<DraftPick>,
    pub health: HealthResponse,
    /// Last draft/undo outcome, shown in the footer.
    pub message: Option<String>,
    pub last_refresh: std::time::Instant,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            base_url,
            filter_idx: 0,
            preset_idx: 0,
            pass_td: 4,
            rankings: Vec::new(),
            picks: Vec::new(),
            health: HealthResponse::default(),
            message: None,
            last_refresh: std::time::Instant::now(),
        }
    }

    pub fn position(&self) -> &'static str {
        POSITION_FILTERS[self.filter_idx % POSITION_FILTERS.len()]
    }

    pub fn preset(&self) -> &'static str {
        PRESETS[self.preset_idx % PRESETS.len()]
    }

    pub fn cycle_position(&mut self) {
        self.filter_idx = (self.filter_idx + 1) % POSITION_FILTERS.len();
    }

    pub fn cycle_preset(&mut self) {
        self.preset_idx = (self.preset_idx + 1) % PRESETS.len();
    }

    pub fn toggle_pass_td(&mut self) {
        self.pass_td = if self.pass_td == 4 { 6 } else { 4 };
    }

    /// Best available under the current filters. Drafted players are removed server-side.
    pub fn projections_url(&self) -> String {
        format!(
            "{}/projections?position={}&preset={}&passTd={}&exclude_drafted=true&limit={}&fast=true",
            self.base_url,
            self.position(),
            self.preset(),
            self.pass_td,
            RANKING_LIMIT,
        )
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let projections_url = self.projections_url();
        let picks_url = format!("{}/draft/picks", self.base_url);
        let health_url = format!("{}/health", self.base_url);

        let (projections_res, picks_res, health_res) = tokio::join!(
            client.get(&projections_url).send(),
            client.get(&picks_url).send(),
            client.get(&health_url).send(),
        );

        let (projections_resp, picks_resp) = match (projections_res, picks_res) {
            (Ok(p), Ok(d)) => (p, d),
            (Err(e), _) | (_, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };
        if !projections_resp.status().is_success() {
            let msg = error_message(projections_resp).await;
            self.status = ConnectionStatus::Error(msg);
            return;
        }

        let (projections, picks) = tokio::join!(
            projections_resp.json::<ProjectionsResponse>(),
            picks_resp.json::<Vec<DraftPick>>(),
        );

        match (projections, picks) {
            (Ok(p), Ok(d)) => {
                self.rankings = p.players;
                self.picks = d;
                self.status = ConnectionStatus::Connected;
                self.last_refresh = std::time::Instant::now();

                if let Ok(h) = health_res {
                    if let Ok(health) = h.json::<HealthResponse>().await {
                        self.health = health;
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
            }
        }
    }

    /// Drafts the player at `idx` in the current rankings.
    pub async fn draft(&mut self, client: &reqwest::Client, idx: usize) {
        let Some(player) = self.rankings.get(idx) else {
            return;
        };
        let body = NewPick {
            player_id: &player.player_id,
            full_name: &player.full_name,
            position: &player.position,
            team: player.team.as_deref(),
        };
        let url = format!("{}/draft/picks", self.base_url);
        self.message = Some(match client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => format!("drafted {}", player.full_name),
            Ok(resp) => error_message(resp).await,
            Err(e) => format!("{e}"),
        });
        self.refresh(client).await;
    }

    pub async fn undo(&mut self, client: &reqwest::Client) {
        let url = format!("{}/draft/undo", self.base_url);
        self.message = Some(match client.post(&url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<DraftPick>().await {
                Ok(pick) => format!(
                    "undid {}",
                    pick.full_name.as_deref().unwrap_or(&pick.player_id)
                ),
                Err(_) => "undid last pick".to_string(),
            },
            Ok(resp) => error_message(resp).await,
            Err(e) => format!("{e}"),
        });
        self.refresh(client).await;
    }
}

async fn error_message(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => format!("HTTP {status}"),
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_ppg(ppg: f64) -> String {
    format!("{ppg:.1}")
}

/// Convert a millisecond epoch timestamp to HH:MM:SS (UTC).
pub fn format_time_ms(ms: i64) -> String {
    let secs = (ms / 1000) as u64;
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
