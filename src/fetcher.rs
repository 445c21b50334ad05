use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures_util::{stream, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::UpstreamLatency;
use crate::config::{Config, PAGE_CACHE_TTL_SECS, WEEKS_PER_SEASON};
use crate::error::{AppError, Result};
use crate::projection::normalizer::{normalize_player, normalize_weekly};
use crate::types::{Player, WeeklyStat};

/// A normalized weekly page kept for a short while so back-to-back builds
/// (one per position) don't refetch the same matrix.
struct CachedPage {
    fetched_at: Instant,
    stats: Arc<Vec<WeeklyStat>>,
}

/// Result of fetching a season x week matrix.
#[derive(Debug, Default)]
pub struct SeasonMatrix {
    pub stats: Vec<WeeklyStat>,
    pub pages: usize,
    pub failed_pages: usize,
}

impl SeasonMatrix {
    pub fn is_complete(&self) -> bool {
        self.failed_pages == 0
    }

    /// Nothing usable came back: there were pages to fetch and all of them failed.
    pub fn all_failed(&self) -> bool {
        self.pages > 0 && self.failed_pages == self.pages
    }
}

/// Talks to the upstream stats API. Every request goes through an ordered list
/// of candidate URLs; a failed candidate (network error, non-OK status,
/// timeout, bad JSON) is logged and the next one is tried.
pub struct Fetcher {
    client: reqwest::Client,
    player_endpoints: Vec<String>,
    week_endpoints: Vec<String>,
    concurrency: usize,
    page_ttl: Duration,
    pages: DashMap<(u16, u8), CachedPage>,
    latency: Arc<UpstreamLatency>,
    health: Arc<HealthState>,
}

impl Fetcher {
    pub fn new(cfg: &Config, latency: Arc<UpstreamLatency>, health: Arc<HealthState>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.fetch_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            player_endpoints: cfg.player_endpoints.clone(),
            week_endpoints: cfg.week_endpoints.clone(),
            concurrency: cfg.fetch_concurrency.max(1),
            page_ttl: Duration::from_secs(PAGE_CACHE_TTL_SECS),
            pages: DashMap::new(),
            latency,
            health,
        })
    }

    /// One GET. `None` on any failure; the failure is counted, never raised.
    async fn get_json(&self, url: &str) -> Option<Value> {
        let started = Instant::now();
        let result: std::result::Result<Value, reqwest::Error> = async {
            let resp = self.client.get(url).send().await?.error_for_status()?;
            resp.json::<Value>().await
        }
        .await;
        self.latency.record(started.elapsed(), result.is_ok());

        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.health.record_upstream_failure();
                if e.is_timeout() {
                    debug!(url = %url, "upstream candidate timed out");
                } else {
                    debug!(url = %url, "upstream candidate failed: {e}");
                }
                None
            }
        }
    }

    /// Full roster filtered to the position pool. Fails only when no candidate
    /// endpoint produced any usable player.
    pub async fn fetch_players(&self) -> Result<Vec<Player>> {
        for url in &self.player_endpoints {
            let Some(body) = self.get_json(url).await else {
                continue;
            };
            let players = parse_roster(&body);
            if players.is_empty() {
                warn!(url = %url, "roster endpoint returned no pool players");
                continue;
            }
            info!(url = %url, count = players.len(), "Roster fetched: {} players", players.len());
            return Ok(players);
        }
        Err(AppError::Upstream(
            "no roster endpoint returned any players".to_string(),
        ))
    }

    /// Raw records for one (season, week). `None` when every candidate failed.
    pub async fn fetch_week_raw(&self, season: u16, week: u8) -> Option<Vec<Value>> {
        for template in &self.week_endpoints {
            let url = week_url(template, season, week);
            if let Some(body) = self.get_json(&url).await {
                return Some(normalize_body(body));
            }
        }
        warn!(season, week, "all weekly stat candidates failed");
        None
    }

    /// Normalized lines for one (season, week). `None` when every candidate
    /// failed; `Some(empty)` when the week really has no data.
    pub async fn fetch_week(&self, season: u16, week: u8) -> Option<Arc<Vec<WeeklyStat>>> {
        if let Some(page) = self.pages.get(&(season, week)) {
            if page.fetched_at.elapsed() < self.page_ttl {
                return Some(Arc::clone(&page.stats));
            }
        }

        let raw = self.fetch_week_raw(season, week).await?;
        let stats: Arc<Vec<WeeklyStat>> = Arc::new(
            raw.iter()
                .filter_map(|r| normalize_weekly(r, season, week))
                .collect(),
        );
        self.pages.insert(
            (season, week),
            CachedPage {
                fetched_at: Instant::now(),
                stats: Arc::clone(&stats),
            },
        );
        Some(stats)
    }

    /// Every regular-season week of every season, fetched through a bounded
    /// pool. Lines are in job order (season, then week) regardless of which
    /// request finished first. Weeks that failed outright contribute no lines
    /// and are counted in `failed_pages`.
    pub async fn fetch_seasons(&self, seasons: &[u16]) -> SeasonMatrix {
        let jobs: Vec<(u16, u8)> = seasons
            .iter()
            .flat_map(|&s| (1..=WEEKS_PER_SEASON).map(move |w| (s, w)))
            .collect();
        let pages = jobs.len();

        let started = Instant::now();
        let fetched: Vec<Option<Arc<Vec<WeeklyStat>>>> = stream::iter(jobs)
            .map(|(season, week)| self.fetch_week(season, week))
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed_pages = fetched.iter().filter(|p| p.is_none()).count();
        let stats: Vec<WeeklyStat> = fetched
            .iter()
            .flatten()
            .flat_map(|p| p.iter().cloned())
            .collect();
        debug!(
            pages,
            failed_pages,
            lines = stats.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "weekly matrix fetched"
        );
        SeasonMatrix {
            stats,
            pages,
            failed_pages,
        }
    }

    pub fn cached_pages(&self) -> usize {
        self.pages.len()
    }
}

pub fn week_url(template: &str, season: u16, week: u8) -> String {
    template
        .replace("{season}", &season.to_string())
        .replace("{week}", &week.to_string())
}

/// Flattens the known weekly page shapes into a list of per-player records:
/// a bare array, `{"stats": [...]}`, or an object keyed by player id.
pub fn normalize_body(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Array(items)) = map.remove("stats") {
                return items;
            }
            map.into_iter()
                .filter_map(|(player_id, mut record)| {
                    let obj = record.as_object_mut()?;
                    obj.entry("player_id").or_insert(Value::String(player_id));
                    Some(record)
                })
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Roster bodies are either keyed by player id or a plain array.
pub fn parse_roster(body: &Value) -> Vec<Player> {
    match body {
        Value::Object(map) => map
            .iter()
            .filter_map(|(id, raw)| normalize_player(Some(id), raw))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|raw| normalize_player(None, raw))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeUpstream;
    use crate::types::Position;
    use serde_json::json;

    fn fetcher_for(cfg: &Config) -> Fetcher {
        Fetcher::new(cfg, Arc::new(UpstreamLatency::new()), Arc::new(HealthState::new())).unwrap()
    }

    fn week_one() -> Value {
        json!([
            { "player_id": "10", "stats": { "rush_yd": 80, "rush_att": 15 } },
            { "player_id": "11", "stats": { "rec": 5, "rec_yd": "61" } }
        ])
    }

    #[test]
    fn body_shapes_flatten_to_records() {
        assert_eq!(normalize_body(json!([{ "a": 1 }])).len(), 1);
        assert_eq!(normalize_body(json!({ "stats": [{ "a": 1 }, { "a": 2 }] })).len(), 2);

        let keyed = normalize_body(json!({ "4046": { "pass_yd": 300 }, "bad": 5 }));
        assert_eq!(keyed.len(), 1);
        assert_eq!(keyed[0]["player_id"], "4046");

        assert!(normalize_body(json!("nope")).is_empty());
        assert!(normalize_body(Value::Null).is_empty());
    }

    #[test]
    fn roster_keeps_pool_positions_only() {
        let body = json!({
            "1": { "full_name": "A Runner", "position": "RB", "team": "KC" },
            "2": { "full_name": "A Kicker", "position": "K" },
            "3": { "first_name": "Tight", "last_name": "End", "fantasy_positions": ["TE"] },
            "4": { "position": "QB" }
        });
        let players = parse_roster(&body);
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].position, Position::RB);
        assert_eq!(players[1].full_name, "Tight End");
    }

    #[test]
    fn week_templates_substitute_both_placeholders() {
        assert_eq!(
            week_url("http://x/stats/{season}/{week}?season={season}", 2024, 7),
            "http://x/stats/2024/7?season=2024"
        );
    }

    #[tokio::test]
    async fn wrapped_fallback_matches_direct_primary() {
        let direct = FakeUpstream::default().with_week(2024, 1, week_one()).start().await;
        let fallback = FakeUpstream {
            primary_down: true,
            ..FakeUpstream::default()
        }
        .with_week(2024, 1, week_one())
        .start()
        .await;

        let from_primary = fetcher_for(&direct.config()).fetch_week(2024, 1).await.unwrap();
        let from_secondary = fetcher_for(&fallback.config()).fetch_week(2024, 1).await.unwrap();

        assert_eq!(from_primary.len(), 2);
        assert_eq!(*from_primary, *from_secondary);
        assert_eq!(from_secondary[1].rec_yd, Some(61.0));
    }

    #[tokio::test]
    async fn slow_primary_times_out_and_falls_back() {
        let upstream = FakeUpstream {
            primary_delay: Some(Duration::from_secs(3)),
            ..FakeUpstream::default()
        }
        .with_week(2024, 2, week_one())
        .start()
        .await;
        let mut cfg = upstream.config();
        cfg.fetch_timeout_secs = 1;

        let fetcher = fetcher_for(&cfg);
        let stats = fetcher.fetch_week(2024, 2).await.unwrap();
        assert_eq!(stats.len(), 2);
        assert!(fetcher.health.upstream_failures() >= 1);
    }

    #[tokio::test]
    async fn total_failure_is_distinct_from_empty_and_not_cached() {
        let upstream = FakeUpstream::default().start().await;
        let mut cfg = upstream.config();
        cfg.week_endpoints = vec![format!("{}/missing/{{season}}/{{week}}", upstream.base_url)];

        let fetcher = fetcher_for(&cfg);
        assert!(fetcher.fetch_week(2024, 3).await.is_none());
        assert_eq!(fetcher.cached_pages(), 0);

        // a week the upstream answers with no lines is a real, cacheable empty week
        let healthy = fetcher_for(&upstream.config());
        assert_eq!(healthy.fetch_week(2024, 3).await.map(|p| p.len()), Some(0));
        assert_eq!(healthy.cached_pages(), 1);
    }

    #[tokio::test]
    async fn matrix_counts_failed_pages() {
        let mut failing = FakeUpstream::default()
            .with_week(2024, 1, json!([{ "player_id": "kept", "rec": 1 }]));
        failing.failing_weeks.insert((2024, 2));
        failing.failing_weeks.insert((2024, 3));
        let upstream = failing.start().await;
        let fetcher = fetcher_for(&upstream.config());

        let matrix = fetcher.fetch_seasons(&[2024]).await;
        assert_eq!(matrix.pages, 18);
        assert_eq!(matrix.failed_pages, 2);
        assert!(!matrix.is_complete());
        assert!(!matrix.all_failed());
        assert_eq!(matrix.stats.len(), 1);

        upstream.set_weeks_down(true);
        let fresh = fetcher_for(&upstream.config());
        let matrix = fresh.fetch_seasons(&[2024]).await;
        assert!(matrix.all_failed());
        assert!(matrix.stats.is_empty());
    }

    #[tokio::test]
    async fn fan_out_never_exceeds_configured_concurrency() {
        let upstream = FakeUpstream {
            primary_delay: Some(Duration::from_millis(30)),
            ..FakeUpstream::default()
        }
        .start()
        .await;
        let mut cfg = upstream.config();
        cfg.fetch_concurrency = 4;
        let fetcher = fetcher_for(&cfg);

        let matrix = fetcher.fetch_seasons(&[2023, 2024]).await;
        assert!(matrix.is_complete());
        assert_eq!(upstream.week_hits(), 36);
        let peak = upstream.peak_week_concurrency();
        assert!(peak <= 4, "peak in-flight week requests = {peak}");
        assert!(peak > 1, "fan-out ran sequentially");
    }

    #[tokio::test]
    async fn successful_pages_are_reused() {
        let upstream = FakeUpstream::default().with_week(2024, 1, week_one()).start().await;
        let fetcher = fetcher_for(&upstream.config());

        fetcher.fetch_week(2024, 1).await;
        let hits = upstream.week_hits();
        fetcher.fetch_week(2024, 1).await;
        assert_eq!(upstream.week_hits(), hits);
    }

    #[tokio::test]
    async fn season_matrix_is_in_job_order() {
        let upstream = FakeUpstream::default()
            .with_week(2024, 18, json!([{ "player_id": "late", "rec": 1 }]))
            .with_week(2023, 2, json!([{ "player_id": "early", "rec": 1 }]))
            .with_week(2024, 1, json!([{ "player_id": "mid", "rec": 1 }]))
            .start()
            .await;
        let fetcher = fetcher_for(&upstream.config());

        let matrix = fetcher.fetch_seasons(&[2023, 2024]).await;
        let ids: Vec<&str> = matrix.stats.iter().map(|s| s.player_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "mid", "late"]);
        assert_eq!(upstream.week_hits(), 36);
    }

    #[tokio::test]
    async fn roster_falls_back_then_errors_when_exhausted() {
        let upstream = FakeUpstream {
            roster: json!({ "9": { "full_name": "Q Back", "position": "QB" } }),
            ..FakeUpstream::default()
        }
        .start()
        .await;
        let mut cfg = upstream.config();
        cfg.player_endpoints.insert(0, format!("{}/missing", upstream.base_url));

        let fetcher = fetcher_for(&cfg);
        let players = fetcher.fetch_players().await.unwrap();
        assert_eq!(players.len(), 1);

        upstream.set_roster_down(true);
        let err = fetcher.fetch_players().await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
