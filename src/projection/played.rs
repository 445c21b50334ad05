use crate::projection::scoring::points;
use crate::types::{ScoringConfig, WeeklyStat};

/// True when the line shows any real usage or production. Bye weeks and
/// inactive weeks usually arrive as all-zero or all-absent lines and must not
/// count toward a per-game average.
pub fn did_play(stat: &WeeklyStat) -> bool {
    if stat.pts_ppr.is_some_and(|p| p != 0.0) {
        return true;
    }
    [
        stat.pass_td,
        stat.pass_yd,
        stat.rush_td,
        stat.rush_yd,
        stat.rec,
        stat.rec_td,
        stat.rec_yd,
        stat.targets,
        stat.carries,
    ]
    .iter()
    .any(|f| f.is_some_and(|v| v > 0.0))
}

/// Orders lines oldest first by (season, week). Stable, so duplicates keep input order.
pub fn sort_chronological(weeks: &mut [WeeklyStat]) {
    weeks.sort_by_key(|w| (w.season, w.week));
}

/// Points for the `n` most recent played games, oldest first. Shorter than `n`
/// when history is short; empty when nothing was played.
pub fn last_n_played_points(weeks: &[WeeklyStat], n: usize, cfg: &ScoringConfig) -> Vec<f64> {
    let mut ordered: Vec<&WeeklyStat> = weeks.iter().filter(|w| did_play(w)).collect();
    ordered.sort_by_key(|w| (w.season, w.week));
    let skip = ordered.len().saturating_sub(n);
    ordered[skip..].iter().map(|w| points(w, cfg)).collect()
}

pub fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
