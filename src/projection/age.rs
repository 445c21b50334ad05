use chrono::NaiveDate;

/// Position aging curve. Growth before the peak and decline after it are both
/// linear in years and capped; decline is the steeper side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeCurve {
    pub peak: u32,
    pub decline_rate: f64,
    pub decline_cap: f64,
    pub growth_rate: f64,
    pub growth_cap: f64,
}

pub const AGE_CURVES: &[(&str, AgeCurve)] = &[
    ("RB", AgeCurve { peak: 26, decline_rate: 0.06, decline_cap: 0.25, growth_rate: 0.02, growth_cap: 0.08 }),
    ("WR", AgeCurve { peak: 27, decline_rate: 0.03, decline_cap: 0.18, growth_rate: 0.015, growth_cap: 0.06 }),
    ("TE", AgeCurve { peak: 28, decline_rate: 0.02, decline_cap: 0.12, growth_rate: 0.01, growth_cap: 0.05 }),
    ("QB", AgeCurve { peak: 32, decline_rate: 0.015, decline_cap: 0.12, growth_rate: 0.01, growth_cap: 0.05 }),
];

impl AgeCurve {
    pub fn for_position(position: &str) -> Option<&'static AgeCurve> {
        AGE_CURVES
            .iter()
            .find(|(pos, _)| pos.eq_ignore_ascii_case(position))
            .map(|(_, curve)| curve)
    }

    pub fn multiplier(&self, age: u32) -> f64 {
        let delta = i64::from(age) - i64::from(self.peak);
        if delta > 0 {
            1.0 - (self.decline_rate * delta as f64).min(self.decline_cap)
        } else if delta < 0 {
            1.0 + (self.growth_rate * (-delta) as f64).min(self.growth_cap)
        } else {
            1.0
        }
    }
}

/// Multiplier applied to a player's base average. Unknown (or zero) age and
/// positions without a curve leave the average untouched.
pub fn age_multiplier(position: &str, age: Option<u32>) -> f64 {
    match (AgeCurve::for_position(position), age) {
        (Some(curve), Some(age)) if age > 0 => curve.multiplier(age),
        _ => 1.0,
    }
}

/// Whole years between `birth` and `today`, using 365.25-day years.
pub fn age_years(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    let days = (today - birth).num_days();
    if days < 0 {
        return None;
    }
    Some((days as f64 / 365.25).floor() as u32)
}
