use chrono::{Datelike, NaiveDate, Utc};

use crate::error::{AppError, Result};

/// Roster endpoint. Returns an object keyed by player id.
pub const PLAYER_ENDPOINT: &str = "https://api.sleeper.app/v1/players/nfl";

/// Weekly stat page candidates, tried in order. `{season}` and `{week}` are substituted.
pub const WEEK_ENDPOINTS: &[&str] = &[
    "https://api.sleeper.com/stats/nfl/{season}/{week}?season_type=regular",
    "https://api.sleeper.app/v1/stats/nfl/regular/{season}/{week}",
];

/// Projection cache entries older than this are rebuilt, never served.
pub const CACHE_TTL_SECS: u64 = 12 * 3600;

/// Raw weekly-page cache lifetime inside the fetcher.
pub const PAGE_CACHE_TTL_SECS: u64 = 30 * 60;

/// Per-request upstream timeout (seconds). A timeout counts as a failed candidate.
pub const FETCH_TIMEOUT_SECS: u64 = 12;

/// Maximum simultaneous upstream page requests.
pub const FETCH_CONCURRENCY: usize = 6;

/// Regular-season weeks fetched per season.
pub const WEEKS_PER_SEASON: u8 = 18;

/// Number of most recent played games averaged into a projection.
pub const RECENT_GAMES_WINDOW: usize = 50;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

/// Games multiplier for season-total ranking.
pub const DEFAULT_SEASON_GAMES: u32 = 17;

/// How often the background warmer refreshes the default scoring config.
pub const WARM_INTERVAL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Seasons averaged when a request doesn't name any (SEASONS, comma-separated).
    pub seasons: Vec<u16>,
    /// Roster URL candidates (PLAYER_ENDPOINTS, comma-separated).
    pub player_endpoints: Vec<String>,
    /// Weekly page URL templates (WEEK_ENDPOINTS, comma-separated).
    pub week_endpoints: Vec<String>,
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    /// Pre-build the default scoring config in the background (WARM_CACHE).
    pub warm_cache: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let today = Utc::now().date_naive();
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "draft.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            seasons: std::env::var("SEASONS")
                .ok()
                .map(|s| parse_seasons(&s))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| default_seasons(today)),
            player_endpoints: env_list("PLAYER_ENDPOINTS")
                .unwrap_or_else(|| vec![PLAYER_ENDPOINT.to_string()]),
            week_endpoints: env_list("WEEK_ENDPOINTS")
                .unwrap_or_else(|| WEEK_ENDPOINTS.iter().map(|s| s.to_string()).collect()),
            fetch_concurrency: std::env::var("FETCH_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(FETCH_CONCURRENCY),
            fetch_timeout_secs: timeout_secs(std::env::var("FETCH_TIMEOUT_SECS").ok().as_deref()),
            cache_ttl_secs: ttl_secs_from_hours(std::env::var("CACHE_TTL_HOURS").ok().as_deref()),
            warm_cache: std::env::var("WARM_CACHE")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        })
    }
}

/// Whole seconds, at least one. Zero or garbage falls back to the default.
fn timeout_secs(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(FETCH_TIMEOUT_SECS)
}

/// Hours to seconds. Zero, garbage or an overflowing value falls back to the default.
fn ttl_secs_from_hours(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|h| *h > 0)
        .and_then(|h| h.checked_mul(3600))
        .unwrap_or(CACHE_TTL_SECS)
}

fn env_list(name: &str) -> Option<Vec<String>> {
    let raw = std::env::var(name).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Parse a comma-separated season list, dropping anything that isn't a plausible year.
/// The result is sorted and deduplicated.
pub fn parse_seasons(raw: &str) -> Vec<u16> {
    let mut seasons: Vec<u16> = raw
        .split(',')
        .filter_map(|s| s.trim().parse::<u16>().ok())
        .filter(|y| (1990..=2100).contains(y))
        .collect();
    seasons.sort_unstable();
    seasons.dedup();
    seasons
}

/// The two most recent seasons that have started. A season starts in September.
pub fn default_seasons(today: NaiveDate) -> Vec<u16> {
    let year = today.year() as u16;
    let latest = if today.month() >= 9 { year } else { year - 1 };
    vec![latest - 1, latest]
}
