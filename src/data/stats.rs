use std::fmt;

use super::model::Reading;

// ---------------------------------------------------------------------------
// Summary statistics over a filtered subset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Number of non-missing values the statistics were computed from.
    pub count: usize,
}

/// Result of [`summarize`]. `NoData` replaces the NaN an empty mean would give.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Summary {
    NoData,
    Values(Stats),
}

impl Summary {
    pub fn stats(&self) -> Option<&Stats> {
        match self {
            Summary::NoData => None,
            Summary::Values(s) => Some(s),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Summary::NoData)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Summary::NoData => write!(f, "no data"),
            Summary::Values(s) => write!(
                f,
                "min {:.3} m, max {:.3} m, mean {:.3} m",
                s.min, s.max, s.mean
            ),
        }
    }
}

/// Min / max / mean of the readings' values. Missing (NaN) values are skipped.
pub fn summarize(readings: &[Reading]) -> Summary {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for v in readings.iter().map(|r| r.value).filter(|v| !v.is_nan()) {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }

    if count == 0 {
        return Summary::NoData;
    }
    Summary::Values(Stats {
        min,
        max,
        mean: sum / count as f64,
        count,
    })
}

// ---------------------------------------------------------------------------
// Plot window around the mean
// ---------------------------------------------------------------------------

/// Centre a window of `(max - min) * range_multiplier` on `avg`.
///
/// Returns `(lower, upper)`.
pub fn compute_display_bounds(avg: f64, range_multiplier: f64, min: f64, max: f64) -> (f64, f64) {
    let half_span = (max - min) * range_multiplier / 2.0;
    (avg - half_span, avg + half_span)
}

/// [`compute_display_bounds`] fed from a summary; `None` for `NoData`.
pub fn display_bounds(summary: &Summary, range_multiplier: f64) -> Option<(f64, f64)> {
    summary
        .stats()
        .map(|s| compute_display_bounds(s.mean, range_multiplier, s.min, s.max))
}
