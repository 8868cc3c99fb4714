use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use super::model::{FilterSpec, HourOfDay, Reading, Series};
use super::stats::{summarize, Summary};

// ---------------------------------------------------------------------------
// Window filter
// ---------------------------------------------------------------------------

/// Subset of a series plus the summary over its values.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredResult {
    pub series: Series,
    pub summary: Summary,
}

impl FilteredResult {
    pub fn from_series(series: Series) -> Self {
        let summary = summarize(&series.readings);
        Self { series, summary }
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Keep readings with `start <= t <= end` whose hour matches `spec.hour`.
///
/// Input order is preserved. An inverted window yields an empty result.
pub fn filter_by_window(series: &Series, spec: &FilterSpec) -> FilteredResult {
    let readings: Vec<Reading> = series
        .readings
        .iter()
        .filter(|r| spec.matches(&r.timestamp))
        .copied()
        .collect();
    FilteredResult::from_series(series.with_readings(readings))
}

// ---------------------------------------------------------------------------
// Nearest-to-hour selection
// ---------------------------------------------------------------------------

/// Scope of the minimum distance in [`nearest_to_hour`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NearestMatch {
    /// One minimum over the whole series. With irregular sampling this can
    /// keep a single timestamp for the entire series.
    Global,
    /// One minimum per calendar day.
    #[default]
    PerDay,
}

/// Distance in milliseconds from `t` to `hour:00:00` on `t`'s own date.
fn distance_to_hour(t: &NaiveDateTime, hour: HourOfDay) -> i64 {
    let reference = NaiveDateTime::new(
        t.date(),
        NaiveTime::from_hms_opt(u32::from(hour.get()), 0, 0).unwrap_or_default(),
    );
    (*t - reference).num_milliseconds().abs()
}

/// Readings closest to `target` o'clock. Ties are all kept, order is preserved.
pub fn nearest_to_hour(series: &Series, target: HourOfDay, mode: NearestMatch) -> Series {
    let distances: Vec<i64> = series
        .readings
        .iter()
        .map(|r| distance_to_hour(&r.timestamp, target))
        .collect();

    let readings = match mode {
        NearestMatch::Global => {
            let Some(&best) = distances.iter().min() else {
                return series.with_readings(Vec::new());
            };
            series
                .readings
                .iter()
                .zip(&distances)
                .filter(|&(_, &d)| d == best)
                .map(|(r, _)| *r)
                .collect()
        }
        NearestMatch::PerDay => {
            let mut best_per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
            for (r, &d) in series.readings.iter().zip(&distances) {
                best_per_day
                    .entry(r.timestamp.date())
                    .and_modify(|best| *best = (*best).min(d))
                    .or_insert(d);
            }
            series
                .readings
                .iter()
                .zip(&distances)
                .filter(|&(r, &d)| best_per_day.get(&r.timestamp.date()) == Some(&d))
                .map(|(r, _)| *r)
                .collect()
        }
    };

    series.with_readings(readings)
}
