//! Retirement projection curves.
//!
//! A curve is a list of `(age, btc)` samples. The helpers here prepare the
//! series plotted on the retirement screen: the expected and simulated curves
//! are continued from the last point of the investment history, and a curve
//! can be pulled forward in time when the saver retires earlier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Years a positive or negative simulated adjustment moves retirement.
pub const SIMULATION_HORIZON_YEARS: u32 = 4;

const SHIFT_BOOST_PER_YEAR: f32 = 0.04;
const SHIFT_DECAY_YEARS: f32 = 8.0;
const CHART_HEADROOM: f32 = 1.1;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeriesPoint {
    pub age: u32,
    pub btc: f32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

pub fn to_points(series: &[SeriesPoint]) -> Vec<Point> {
    let mut sorted = series.to_vec();
    sorted.sort_by_key(|p| p.age);
    sorted
        .into_iter()
        .map(|p| Point {
            x: p.age as f32,
            y: p.btc,
        })
        .collect()
}

/// `anchor` followed by every point at or after it.
pub fn continue_from(points: &[Point], anchor: Point) -> Vec<Point> {
    let mut out = Vec::with_capacity(points.len() + 1);
    out.push(anchor);
    out.extend(points.iter().copied().filter(|p| p.x >= anchor.x));
    out
}

/// Pull a curve `years` earlier.
///
/// Ages move left but never before the first age of the curve. Each point also
/// gains `0.04 * years`, decaying exponentially with its distance (in years)
/// before the peak. Points that land on the same age keep the highest value.
pub fn shift_left_years(series: &[SeriesPoint], years: u32) -> Vec<SeriesPoint> {
    let Some(first) = series.first() else {
        return Vec::new();
    };
    if years == 0 {
        return series.to_vec();
    }
    let min_age = series.iter().map(|p| p.age).min().unwrap_or(first.age);
    // first maximum wins on ties
    let peak_age = series
        .iter()
        .fold(first, |best, p| if p.btc > best.btc { p } else { best })
        .age;

    let mut by_age: BTreeMap<u32, f32> = BTreeMap::new();
    for p in series {
        let shifted_age = p.age.saturating_sub(years).max(min_age);
        let peak_dist = peak_age.saturating_sub(p.age) as f32;
        let boost = SHIFT_BOOST_PER_YEAR * years as f32 * (-peak_dist / SHIFT_DECAY_YEARS).exp();
        let btc = p.btc + boost;
        by_age
            .entry(shifted_age)
            .and_modify(|v| *v = v.max(btc))
            .or_insert(btc);
    }
    by_age
        .into_iter()
        .map(|(age, btc)| SeriesPoint { age, btc })
        .collect()
}

/// Keep only what a signed sats field accepts: digits, plus `-` in front.
pub fn sanitize_simulation_input(raw: &str) -> String {
    raw.chars()
        .enumerate()
        .filter(|(idx, ch)| ch.is_ascii_digit() || (*ch == '-' && *idx == 0))
        .map(|(_, ch)| ch)
        .collect()
}

/// Simulated adjustment in sats; unparsable input counts as no adjustment.
pub fn parse_simulation(input: &str) -> i64 {
    input.trim().parse().unwrap_or(0)
}

pub fn horizon_label(adjustment: i64) -> String {
    match adjustment.signum() {
        1 => format!("-{SIMULATION_HORIZON_YEARS} years"),
        -1 => format!("+{SIMULATION_HORIZON_YEARS} years"),
        _ => "0 years".to_string(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChartBounds {
    pub min_age: f32,
    pub max_age: f32,
    pub max_btc: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetirementProjection {
    pub current_age: u32,
    pub life_expectancy: u32,
    pub base_projection: Vec<SeriesPoint>,
    pub expected_projection: Vec<SeriesPoint>,
    pub add_amount_seed: Vec<SeriesPoint>,
    pub remove_amount_seed: Vec<SeriesPoint>,
    pub investment_dashboard: Vec<SeriesPoint>,
}

/// The series drawn on the retirement chart.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionCurves {
    pub base: Vec<Point>,
    pub actual: Vec<Point>,
    pub investment: Vec<Point>,
    pub simulation: Option<Vec<Point>>,
}

impl RetirementProjection {
    /// Build the chart series for a simulated balance adjustment (`0` for
    /// none). Returns `None` when there is no investment history to anchor
    /// the forward-looking curves on.
    pub fn curves(&self, adjustment: i64) -> Option<ProjectionCurves> {
        let investment = to_points(&self.investment_dashboard);
        let anchor = *investment.last()?;
        let actual = continue_from(&to_points(&self.expected_projection), anchor);
        let simulation = match adjustment.signum() {
            1 => Some(continue_from(&to_points(&self.add_amount_seed), anchor)),
            -1 => Some(continue_from(&to_points(&self.remove_amount_seed), anchor)),
            _ => None,
        };
        Some(ProjectionCurves {
            base: to_points(&self.base_projection),
            actual,
            investment,
            simulation,
        })
    }
}

impl ProjectionCurves {
    fn all(&self) -> impl Iterator<Item = &Vec<Point>> {
        [&self.base, &self.actual, &self.investment]
            .into_iter()
            .chain(self.simulation.as_ref())
    }

    /// Axis range covering every non-empty series, with headroom above the
    /// highest value.
    pub fn bounds(&self) -> Option<ChartBounds> {
        let series: Vec<&Vec<Point>> = self.all().filter(|s| !s.is_empty()).collect();
        let min_age = series
            .iter()
            .filter_map(|s| s.first())
            .map(|p| p.x)
            .reduce(f32::min)?;
        let max_age = series
            .iter()
            .filter_map(|s| s.last())
            .map(|p| p.x)
            .reduce(f32::max)?;
        let max_btc = series
            .iter()
            .flat_map(|s| s.iter())
            .map(|p| p.y)
            .reduce(f32::max)?;
        Some(ChartBounds {
            min_age,
            max_age,
            max_btc: max_btc * CHART_HEADROOM,
        })
    }
}
