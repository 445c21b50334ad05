use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;

use crate::config::RECENT_GAMES_WINDOW;
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::projection::age::{age_multiplier, age_years};
use crate::projection::played::{average, last_n_played_points};
use crate::types::{Player, ProjectionRow, ScoringConfig, WeeklyStat};

/// Groups weekly lines by player. Only the first line seen for a given
/// (player, season, week) is kept, so earlier sources win over later duplicates.
pub fn bucket_by_player(
    stats: impl IntoIterator<Item = WeeklyStat>,
) -> HashMap<String, Vec<WeeklyStat>> {
    let mut seen: HashSet<(String, u16, u8)> = HashSet::new();
    let mut buckets: HashMap<String, Vec<WeeklyStat>> = HashMap::new();
    for stat in stats {
        if !seen.insert((stat.player_id.clone(), stat.season, stat.week)) {
            continue;
        }
        buckets.entry(stat.player_id.clone()).or_default().push(stat);
    }
    buckets
}

/// Projection for one player from their weekly history.
pub fn project_player(
    player: &Player,
    history: &[WeeklyStat],
    cfg: &ScoringConfig,
    today: NaiveDate,
) -> ProjectionRow {
    let recent = last_n_played_points(history, RECENT_GAMES_WINDOW, cfg);
    let age = player.birth_date.and_then(|b| age_years(b, today));
    let ppg = average(&recent) * age_multiplier(player.position.as_str(), age);

    ProjectionRow {
        player_id: player.player_id.clone(),
        full_name: player.full_name.clone(),
        position: player.position,
        team: player.team.clone(),
        ppg: if ppg.is_finite() { ppg.max(0.0) } else { 0.0 },
    }
}

/// Projects every player in input order. Pure: same inputs, same rows.
pub fn build_rows(
    players: &[Player],
    weekly: Vec<WeeklyStat>,
    cfg: &ScoringConfig,
    today: NaiveDate,
) -> Vec<ProjectionRow> {
    let buckets = bucket_by_player(weekly);
    players
        .iter()
        .map(|p| {
            let history = buckets.get(&p.player_id).map(Vec::as_slice).unwrap_or(&[]);
            project_player(p, history, cfg, today)
        })
        .collect()
}

/// Rows from one build, plus how many weekly pages could not be fetched.
/// A build with failed pages is usable but incomplete.
#[derive(Debug)]
pub struct Build {
    pub rows: Vec<ProjectionRow>,
    pub failed_pages: usize,
}

impl Build {
    pub fn is_complete(&self) -> bool {
        self.failed_pages == 0
    }
}

/// Fetches the full season x week matrix and projects `players` against it.
/// Errors when every weekly page failed.
pub async fn build(
    fetcher: &Fetcher,
    players: &[Player],
    cfg: &ScoringConfig,
    seasons: &[u16],
    today: NaiveDate,
) -> Result<Build> {
    let matrix = fetcher.fetch_seasons(seasons).await;
    if matrix.all_failed() {
        return Err(AppError::Upstream(format!(
            "all {} weekly stat pages failed",
            matrix.pages
        )));
    }
    Ok(Build {
        rows: build_rows(players, matrix.stats, cfg, today),
        failed_pages: matrix.failed_pages,
    })
}
