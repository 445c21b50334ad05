use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// The fantasy-relevant position pool. Players at any other position are never loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
}

impl Position {
    pub const ALL: [Position; 4] = [Position::QB, Position::RB, Position::WR, Position::TE];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::QB => "QB",
            Position::RB => "RB",
            Position::WR => "WR",
            Position::TE => "TE",
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Position {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QB" => Ok(Position::QB),
            "RB" => Ok(Position::RB),
            "WR" => Ok(Position::WR),
            "TE" => Ok(Position::TE),
            other => Err(AppError::BadRequest(format!(
                "unsupported position '{other}'; expected one of QB, RB, WR, TE, ALL"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub player_id: String,
    pub full_name: String,
    pub position: Position,
    pub team: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// WeeklyStat
// ---------------------------------------------------------------------------

/// One player's line for one (season, week). `None` means the upstream record
/// didn't carry the field, which is different from a recorded zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeeklyStat {
    pub player_id: String,
    pub season: u16,
    pub week: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_yd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_td: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_int: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rush_yd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rush_td: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carries: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rec_yd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rec_td: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pts_ppr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pts_half_ppr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pts_std: Option<f64>,
}

impl WeeklyStat {
    pub fn new(player_id: impl Into<String>, season: u16, week: u8) -> Self {
        Self {
            player_id: player_id.into(),
            season,
            week,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoringPreset {
    Ppr,
    HalfPpr,
    Standard,
}

impl ScoringPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringPreset::Ppr => "PPR",
            ScoringPreset::HalfPpr => "HALF_PPR",
            ScoringPreset::Standard => "STANDARD",
        }
    }

    /// Points per reception.
    pub fn catch_bonus(&self) -> f64 {
        match self {
            ScoringPreset::Ppr => 1.0,
            ScoringPreset::HalfPpr => 0.5,
            ScoringPreset::Standard => 0.0,
        }
    }
}

impl std::fmt::Display for ScoringPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScoringPreset {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PPR" | "FULL_PPR" => Ok(ScoringPreset::Ppr),
            "HALF_PPR" | "HALF" => Ok(ScoringPreset::HalfPpr),
            "STANDARD" | "STD" | "NON_PPR" => Ok(ScoringPreset::Standard),
            other => Err(AppError::BadRequest(format!(
                "unsupported preset '{other}'; expected PPR, HALF_PPR or STANDARD"
            ))),
        }
    }
}

/// Scoring rules for one request. Only 4 or 6 points per passing touchdown are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScoringConfig {
    pub preset: ScoringPreset,
    pass_td: u8,
}

impl ScoringConfig {
    pub fn new(preset: ScoringPreset, pass_td: u8) -> Result<Self, AppError> {
        if pass_td != 4 && pass_td != 6 {
            return Err(AppError::BadRequest(format!(
                "passTd must be 4 or 6, got {pass_td}"
            )));
        }
        Ok(Self { preset, pass_td })
    }

    pub fn pass_td(&self) -> u8 {
        self.pass_td
    }

    /// Stable string form used inside cache keys.
    pub fn key(&self) -> String {
        format!("{}:{}", self.preset, self.pass_td)
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            preset: ScoringPreset::Ppr,
            pass_td: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// Projection output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionRow {
    pub player_id: String,
    pub full_name: String,
    pub position: Position,
    pub team: Option<String>,
    /// Projected points per game. Always finite and non-negative.
    pub ppg: f64,
}

/// How the final list is ordered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankBy {
    PerGame,
    /// `ppg * games`. Same order as `PerGame` for any positive game count, kept
    /// separate so callers can state intent and future per-player game counts slot in.
    SeasonTotal { games: u32 },
}

impl RankBy {
    pub fn score(&self, row: &ProjectionRow) -> f64 {
        match self {
            RankBy::PerGame => row.ppg,
            RankBy::SeasonTotal { games } => row.ppg * f64::from(*games),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionsResponse {
    pub preset: ScoringPreset,
    pub pass_td: u8,
    pub players: Vec<ProjectionRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_parse_is_case_insensitive() {
        assert_eq!("rb".parse::<Position>().unwrap(), Position::RB);
        assert_eq!(" Te ".parse::<Position>().unwrap(), Position::TE);
    }

    #[test]
    fn kicker_is_not_a_pool_position() {
        let err = "KICKER".parse::<Position>().unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn preset_aliases() {
        assert_eq!("half".parse::<ScoringPreset>().unwrap(), ScoringPreset::HalfPpr);
        assert_eq!("half-ppr".parse::<ScoringPreset>().unwrap(), ScoringPreset::HalfPpr);
        assert_eq!("std".parse::<ScoringPreset>().unwrap(), ScoringPreset::Standard);
        assert!("superflex".parse::<ScoringPreset>().is_err());
    }

    #[test]
    fn pass_td_must_be_four_or_six() {
        assert!(ScoringConfig::new(ScoringPreset::Ppr, 4).is_ok());
        assert!(ScoringConfig::new(ScoringPreset::Ppr, 6).is_ok());
        assert!(ScoringConfig::new(ScoringPreset::Ppr, 5).is_err());
    }

    #[test]
    fn response_uses_camel_case_pass_td() {
        let resp = ProjectionsResponse {
            preset: ScoringPreset::HalfPpr,
            pass_td: 6,
            players: Vec::new(),
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["preset"], "HALF_PPR");
        assert_eq!(v["passTd"], 6);
    }
}
