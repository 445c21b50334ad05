use crate::types::{ScoringConfig, ScoringPreset, WeeklyStat};

pub const PASS_YD_POINTS: f64 = 0.04;
pub const PASS_INT_POINTS: f64 = -1.0;
pub const RUSH_YD_POINTS: f64 = 0.1;
pub const REC_YD_POINTS: f64 = 0.1;
pub const SKILL_TD_POINTS: f64 = 6.0;

/// Fantasy points for one weekly line. This is the only place points are computed.
///
/// An upstream precomputed total for the requested preset is trusted as-is;
/// otherwise the line is scored from its components with absent fields as zero.
pub fn points(stat: &WeeklyStat, cfg: &ScoringConfig) -> f64 {
    let precomputed = match cfg.preset {
        ScoringPreset::Ppr => stat.pts_ppr,
        ScoringPreset::HalfPpr => stat.pts_half_ppr,
        ScoringPreset::Standard => stat.pts_std,
    };
    if let Some(pts) = precomputed {
        return pts;
    }

    let v = |f: Option<f64>| f.unwrap_or(0.0);

    let pass_pts = v(stat.pass_yd) * PASS_YD_POINTS
        + v(stat.pass_td) * f64::from(cfg.pass_td())
        + v(stat.pass_int) * PASS_INT_POINTS;
    let rush_pts = v(stat.rush_yd) * RUSH_YD_POINTS + v(stat.rush_td) * SKILL_TD_POINTS;
    let rec_pts = v(stat.rec_yd) * REC_YD_POINTS
        + v(stat.rec_td) * SKILL_TD_POINTS
        + v(stat.rec) * cfg.preset.catch_bonus();

    pass_pts + rush_pts + rec_pts
}
