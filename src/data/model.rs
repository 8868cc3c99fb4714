use std::fmt;

use chrono::{NaiveDateTime, Timelike};

// ---------------------------------------------------------------------------
// HourOfDay – a validated clock hour
// ---------------------------------------------------------------------------

/// A clock hour in `0..=23`. Defaults to midnight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourOfDay(u8);

impl HourOfDay {
    pub fn new(hour: u8) -> Option<Self> {
        (hour <= 23).then_some(HourOfDay(hour))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether `t` falls inside this clock hour.
    pub fn contains(self, t: &NaiveDateTime) -> bool {
        t.hour() == u32::from(self.0)
    }
}

impl fmt::Display for HourOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:00", self.0)
    }
}

/// Hour-of-day restriction of a [`FilterSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HourFilter {
    #[default]
    All,
    Hour(HourOfDay),
}

impl HourFilter {
    pub fn matches(&self, t: &NaiveDateTime) -> bool {
        match self {
            HourFilter::All => true,
            HourFilter::Hour(h) => h.contains(t),
        }
    }
}

impl fmt::Display for HourFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HourFilter::All => write!(f, "all"),
            HourFilter::Hour(h) => write!(f, "{h}"),
        }
    }
}

// ---------------------------------------------------------------------------
// FilterSpec – inclusive time window plus optional hour
// ---------------------------------------------------------------------------

/// Time window (both bounds inclusive) and hour-of-day restriction.
///
/// `start > end` is not rejected; it simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterSpec {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub hour: HourFilter,
}

impl FilterSpec {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            hour: HourFilter::All,
        }
    }

    pub fn with_hour(mut self, hour: HourFilter) -> Self {
        self.hour = hour;
        self
    }

    pub fn matches(&self, t: &NaiveDateTime) -> bool {
        self.start <= *t && *t <= self.end && self.hour.matches(t)
    }
}

// ---------------------------------------------------------------------------
// Reading / Series
// ---------------------------------------------------------------------------

/// One level reading. A missing source cell is stored as NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    /// Groundwater level in metres.
    pub value: f64,
}

/// Readings of a single observation location, in ingestion order.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub location: String,
    pub readings: Vec<Reading>,
}

impl Series {
    pub fn new(location: impl Into<String>, readings: Vec<Reading>) -> Self {
        Self {
            location: location.into(),
            readings,
        }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// A new series with the same location, holding only `readings`.
    pub fn with_readings(&self, readings: Vec<Reading>) -> Self {
        Self {
            location: self.location.clone(),
            readings,
        }
    }

    /// Copy sorted newest first, for tabular display.
    pub fn sorted_descending(&self) -> Self {
        let mut readings = self.readings.clone();
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.with_readings(readings)
    }

    /// First and last timestamp by value (not by position).
    pub fn time_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.readings.iter().map(|r| r.timestamp).min()?;
        let last = self.readings.iter().map(|r| r.timestamp).max()?;
        Some((first, last))
    }
}

// ---------------------------------------------------------------------------
// GroundwaterTable – the loaded snapshot
// ---------------------------------------------------------------------------

/// The wide source table: one time axis, one value column per location.
///
/// Built once by the loader and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundwaterTable {
    times: Vec<NaiveDateTime>,
    /// Location columns in source order.
    columns: Vec<(String, Vec<f64>)>,
}

impl GroundwaterTable {
    /// Every column must have exactly one value per timestamp.
    pub fn new(
        times: Vec<NaiveDateTime>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> anyhow::Result<Self> {
        for (name, values) in &columns {
            if values.len() != times.len() {
                anyhow::bail!(
                    "column '{name}' has {} values but the time axis has {}",
                    values.len(),
                    times.len()
                );
            }
        }
        Ok(Self { times, columns })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Location identifiers in source column order.
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn has_location(&self, location: &str) -> bool {
        self.columns.iter().any(|(name, _)| name == location)
    }

    /// Extract the series of one location, or `None` if there is no such column.
    pub fn series(&self, location: &str) -> Option<Series> {
        let (name, values) = self.columns.iter().find(|(name, _)| name == location)?;
        let readings = self
            .times
            .iter()
            .zip(values)
            .map(|(&timestamp, &value)| Reading { timestamp, value })
            .collect();
        Some(Series::new(name.clone(), readings))
    }
}
