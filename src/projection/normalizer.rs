//! Maps the many upstream spellings of a stat line onto one `WeeklyStat`.
//!
//! Each canonical field has an ordered synonym list. Lookups check the record's
//! nested `stats` object first and then the record itself; the first value that
//! coerces to a finite number wins. Adding an upstream shape means adding keys
//! to the tables below.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::config::WEEKS_PER_SEASON;
use crate::types::{Player, Position, WeeklyStat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    PassYd,
    PassTd,
    PassInt,
    RushYd,
    RushTd,
    Carries,
    Rec,
    RecYd,
    RecTd,
    Targets,
    PtsPpr,
    PtsHalfPpr,
    PtsStd,
}

pub const STAT_SYNONYMS: &[(StatField, &[&str])] = &[
    (StatField::PassYd, &["pass_yd", "passing_yards", "pass_yds", "passYds", "passing_yds"]),
    (StatField::PassTd, &["pass_td", "passing_tds", "passing_touchdowns", "passTd"]),
    (StatField::PassInt, &["pass_int", "interceptions", "passing_interceptions", "int"]),
    (StatField::RushYd, &["rush_yd", "rushing_yards", "rush_yds", "rushYds"]),
    (StatField::RushTd, &["rush_td", "rushing_tds", "rushing_touchdowns", "rushTd"]),
    (StatField::Carries, &["rush_att", "carries", "rushing_attempts", "rushAtt"]),
    (StatField::Rec, &["rec", "receptions", "catches"]),
    (StatField::RecYd, &["rec_yd", "receiving_yards", "rec_yds", "recYds"]),
    (StatField::RecTd, &["rec_td", "receiving_tds", "receiving_touchdowns", "recTd"]),
    (StatField::Targets, &["rec_tgt", "targets", "tgt"]),
    (StatField::PtsPpr, &["pts_ppr", "fantasy_points_ppr", "ppr_points"]),
    (StatField::PtsHalfPpr, &["pts_half_ppr", "fantasy_points_half_ppr", "half_ppr_points"]),
    (StatField::PtsStd, &["pts_std", "fantasy_points_std", "fantasy_points", "std_points"]),
];

const PLAYER_ID_KEYS: &[&str] = &["player_id", "playerId", "id"];
const SEASON_KEYS: &[&str] = &["season", "season_id", "seasonId"];
const WEEK_KEYS: &[&str] = &["week", "scoring_period", "scoringPeriodId"];

const NAME_KEYS: &[&str] = &["full_name", "name", "display_name", "fullName"];
const POSITION_KEYS: &[&str] = &["position", "pos"];
const TEAM_KEYS: &[&str] = &["team", "team_abbr", "teamAbbr"];
const BIRTH_DATE_KEYS: &[&str] = &["birth_date", "birthdate", "dob", "birthDate"];

impl WeeklyStat {
    fn slot_mut(&mut self, field: StatField) -> &mut Option<f64> {
        match field {
            StatField::PassYd => &mut self.pass_yd,
            StatField::PassTd => &mut self.pass_td,
            StatField::PassInt => &mut self.pass_int,
            StatField::RushYd => &mut self.rush_yd,
            StatField::RushTd => &mut self.rush_td,
            StatField::Carries => &mut self.carries,
            StatField::Rec => &mut self.rec,
            StatField::RecYd => &mut self.rec_yd,
            StatField::RecTd => &mut self.rec_td,
            StatField::Targets => &mut self.targets,
            StatField::PtsPpr => &mut self.pts_ppr,
            StatField::PtsHalfPpr => &mut self.pts_half_ppr,
            StatField::PtsStd => &mut self.pts_std,
        }
    }
}

/// Numbers pass through, numeric strings are parsed, everything else is absent.
pub fn numeric(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|n| n.is_finite())
}

/// Places to look for a key, most specific first.
fn scopes(raw: &Value) -> Vec<&Map<String, Value>> {
    let mut out = Vec::with_capacity(2);
    if let Some(nested) = raw.get("stats").and_then(|s| s.as_object()) {
        out.push(nested);
    }
    if let Some(top) = raw.as_object() {
        out.push(top);
    }
    out
}

fn first_numeric(scopes: &[&Map<String, Value>], keys: &[&str]) -> Option<f64> {
    keys.iter()
        .find_map(|k| scopes.iter().find_map(|scope| scope.get(*k).and_then(numeric)))
}

fn first_string(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        let v = obj.get(*k)?;
        let s = match v {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!s.is_empty()).then_some(s)
    })
}

/// Reads every canonical stat field out of `raw`. Never fails: unknown shapes
/// simply leave every field `None`.
pub fn read_stat_fields(raw: &Value, into: &mut WeeklyStat) {
    let scopes = scopes(raw);
    for (field, keys) in STAT_SYNONYMS {
        *into.slot_mut(*field) = first_numeric(&scopes, keys);
    }
}

fn whole_number(v: f64) -> Option<i64> {
    (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
}

/// Normalizes one raw weekly record. `page_season`/`page_week` fill in identity
/// that the record itself doesn't carry. Returns `None` when the record has no
/// player id or its season/week aren't whole numbers in range; the caller drops it.
pub fn normalize_weekly(raw: &Value, page_season: u16, page_week: u8) -> Option<WeeklyStat> {
    let player_id = first_string(raw, PLAYER_ID_KEYS)
        .or_else(|| raw.get("player").and_then(|p| first_string(p, PLAYER_ID_KEYS)))?;

    let scopes = scopes(raw);
    let season = match first_numeric(&scopes, SEASON_KEYS) {
        Some(s) => whole_number(s).and_then(|s| u16::try_from(s).ok())?,
        None => page_season,
    };
    let week = match first_numeric(&scopes, WEEK_KEYS) {
        Some(w) => whole_number(w).and_then(|w| u8::try_from(w).ok())?,
        None => page_week,
    };
    if week == 0 || week > WEEKS_PER_SEASON {
        return None;
    }

    let mut stat = WeeklyStat::new(player_id, season, week);
    read_stat_fields(raw, &mut stat);
    Some(stat)
}

/// Normalizes one roster record. `key` is the map key the record was stored
/// under, used when the record lacks its own id. Only pool positions with a
/// non-empty id and name survive.
pub fn normalize_player(key: Option<&str>, raw: &Value) -> Option<Player> {
    let player_id = first_string(raw, PLAYER_ID_KEYS)
        .or_else(|| key.map(str::trim).filter(|k| !k.is_empty()).map(str::to_string))?;

    let full_name = first_string(raw, NAME_KEYS).or_else(|| {
        let first = first_string(raw, &["first_name", "firstName"]).unwrap_or_default();
        let last = first_string(raw, &["last_name", "lastName"]).unwrap_or_default();
        let joined = format!("{first} {last}").trim().to_string();
        (!joined.is_empty()).then_some(joined)
    })?;

    let position = first_string(raw, POSITION_KEYS)
        .or_else(|| {
            raw.get("fantasy_positions")
                .and_then(|p| p.as_array())
                .and_then(|a| a.first())
                .and_then(|p| p.as_str())
                .map(str::to_string)
        })
        .and_then(|p| p.parse::<Position>().ok())?;

    let team = first_string(raw, TEAM_KEYS);
    let birth_date = first_string(raw, BIRTH_DATE_KEYS).and_then(|s| parse_birth_date(&s));

    Some(Player {
        player_id,
        full_name,
        position,
        team,
        birth_date,
    })
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
pub fn parse_birth_date(s: &str) -> Option<NaiveDate> {
    let date_part = s.trim().get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_stats_and_synonyms_are_resolved() {
        let raw = json!({
            "player_id": "4046",
            "stats": { "pass_yd": 280.0, "passing_tds": "2", "rush_att": 4 },
            "receptions": 1
        });
        let stat = normalize_weekly(&raw, 2023, 5).unwrap();
        assert_eq!(stat.player_id, "4046");
        assert_eq!((stat.season, stat.week), (2023, 5));
        assert_eq!(stat.pass_yd, Some(280.0));
        assert_eq!(stat.pass_td, Some(2.0));
        assert_eq!(stat.carries, Some(4.0));
        assert_eq!(stat.rec, Some(1.0));
        assert_eq!(stat.rec_yd, None);
    }

    #[test]
    fn first_synonym_wins() {
        let raw = json!({ "player_id": "1", "pass_yd": 100, "passing_yards": 999 });
        let stat = normalize_weekly(&raw, 2023, 1).unwrap();
        assert_eq!(stat.pass_yd, Some(100.0));
    }

    #[test]
    fn non_numeric_values_stay_absent() {
        let raw = json!({ "player_id": "1", "rush_yd": "n/a", "rec": null, "rec_yd": [1] });
        let stat = normalize_weekly(&raw, 2023, 1).unwrap();
        assert_eq!(stat.rush_yd, None);
        assert_eq!(stat.rec, None);
        assert_eq!(stat.rec_yd, None);
    }

    #[test]
    fn unrecognized_record_keeps_identity_only() {
        let raw = json!({ "player_id": 77, "foo": 1, "bar": "baz" });
        let stat = normalize_weekly(&raw, 2022, 3).unwrap();
        assert_eq!(stat, WeeklyStat::new("77", 2022, 3));
    }

    #[test]
    fn bad_identity_is_dropped() {
        assert!(normalize_weekly(&json!({ "rush_yd": 50 }), 2023, 1).is_none());
        assert!(normalize_weekly(&json!({ "player_id": "1", "week": 2.5 }), 2023, 1).is_none());
        assert!(normalize_weekly(&json!({ "player_id": "1", "week": 19 }), 2023, 1).is_none());
        assert!(normalize_weekly(&json!({ "player_id": "1" }), 2023, 0).is_none());
    }

    #[test]
    fn record_week_overrides_page_week() {
        let raw = json!({ "player_id": "1", "week": "7", "season": 2021 });
        let stat = normalize_weekly(&raw, 2023, 1).unwrap();
        assert_eq!((stat.season, stat.week), (2021, 7));
    }

    #[test]
    fn player_from_sleeper_shape() {
        let raw = json!({
            "first_name": "Justin",
            "last_name": "Jefferson",
            "fantasy_positions": ["WR"],
            "team": "MIN",
            "birth_date": "1999-06-16"
        });
        let p = normalize_player(Some("6794"), &raw).unwrap();
        assert_eq!(p.player_id, "6794");
        assert_eq!(p.full_name, "Justin Jefferson");
        assert_eq!(p.position, Position::WR);
        assert_eq!(p.team.as_deref(), Some("MIN"));
        assert_eq!(p.birth_date, NaiveDate::from_ymd_opt(1999, 6, 16));
    }

    #[test]
    fn non_pool_positions_and_nameless_players_are_excluded() {
        assert!(normalize_player(Some("1"), &json!({ "full_name": "K Guy", "position": "K" })).is_none());
        assert!(normalize_player(Some("2"), &json!({ "position": "RB" })).is_none());
        assert!(normalize_player(None, &json!({ "full_name": "No Id", "position": "RB" })).is_none());
    }

    #[test]
    fn birth_date_tolerates_timestamps_and_garbage() {
        assert_eq!(
            parse_birth_date("1997-02-28T00:00:00Z"),
            NaiveDate::from_ymd_opt(1997, 2, 28)
        );
        assert_eq!(parse_birth_date("unknown"), None);
        assert_eq!(parse_birth_date(""), None);
    }
}
