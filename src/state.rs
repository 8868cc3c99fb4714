use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use eframe::egui::TextureHandle;

use crate::color::ColorMap;
use crate::config::AppConfig;
use crate::data::export::export_csv;
use crate::data::filter::{FilteredResult, NearestMatch, filter_by_window, nearest_to_hour};
use crate::data::loader::{DataSource, load_source};
use crate::data::model::{FilterSpec, GroundwaterTable, HourFilter, HourOfDay, Series};
use crate::data::stats::display_bounds;

// ---------------------------------------------------------------------------
// Y-axis range of the nearest-hour chart
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum YAxisMode {
    /// Fixed range in metres.
    Manual { lower: f64, upper: f64 },
    /// Mean ± (max - min) * multiplier / 2 of the displayed readings.
    Auto { multiplier: f64 },
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: AppConfig,

    /// Where the current table was (or will be) loaded from.
    pub source: DataSource,

    /// Loaded snapshot (None until a load succeeds).
    pub table: Option<GroundwaterTable>,

    /// Selected observation location and its full series.
    pub location: Option<String>,
    pub series: Option<Series>,

    // -- filter controls --
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_date: NaiveDate,
    pub end_time: NaiveTime,
    pub hour_filter: HourFilter,
    pub custom_hour: HourOfDay,
    pub nearest_match: NearestMatch,
    pub y_axis: YAxisMode,

    /// Readings inside the date/time window (cached).
    pub window: Option<FilteredResult>,

    /// Window readings nearest to `custom_hour` (cached).
    pub hourly: Option<FilteredResult>,

    pub color_map: Option<ColorMap>,

    /// Image picked through "Upload image".
    pub image: Option<TextureHandle>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let d = &config.dashboard;
        let custom_hour = HourOfDay::new(d.custom_hour).unwrap_or_default();
        Self {
            source: config.source.data_source(),
            table: None,
            location: None,
            series: None,
            start_date: d.start.date(),
            start_time: d.start.time(),
            end_date: d.end.date(),
            end_time: d.end.time(),
            hour_filter: HourFilter::All,
            custom_hour,
            nearest_match: d.nearest_match,
            y_axis: YAxisMode::Manual {
                lower: d.y_range[0],
                upper: d.y_range[1],
            },
            window: None,
            hourly: None,
            color_map: None,
            image: None,
            status_message: None,
            config,
        }
    }

    /// Load (or reload) the table from `self.source`. Errors end up in
    /// `status_message`; the previous table is kept.
    pub fn reload(&mut self) {
        match load_source(&self.source, &self.config.source.time_column) {
            Ok(table) => self.set_table(table),
            Err(e) => {
                log::error!("Failed to load data: {e:#}");
                self.status_message = Some(format!("Load error: {e:#}"));
            }
        }
    }

    /// Load a local file and make it the source. On failure the previous
    /// source and table stay in place.
    pub fn open_file(&mut self, path: std::path::PathBuf) {
        let source = DataSource::Path(path);
        match load_source(&source, &self.config.source.time_column) {
            Ok(table) => {
                self.source = source;
                self.set_table(table);
            }
            Err(e) => {
                log::error!("Failed to open {source}: {e:#}");
                self.status_message = Some(format!("Load error: {e:#}"));
            }
        }
    }

    /// Ingest a newly loaded table and select a location.
    pub fn set_table(&mut self, table: GroundwaterTable) {
        self.color_map = Some(ColorMap::new(table.locations()));

        let preferred = &self.config.dashboard.default_location;
        let location = match &self.location {
            Some(current) if table.has_location(current) => Some(current.clone()),
            _ if table.has_location(preferred) => Some(preferred.clone()),
            _ => table.locations().next().map(str::to_string),
        };

        self.table = Some(table);
        self.status_message = None;
        match location {
            Some(loc) => self.select_location(&loc),
            None => self.refilter(),
        }
    }

    /// Change the selected location and recompute everything downstream.
    pub fn select_location(&mut self, location: &str) {
        self.series = self.table.as_ref().and_then(|t| t.series(location));
        self.location = self.series.as_ref().map(|s| s.location.clone());
        self.refilter();
    }

    pub fn window_start(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.start_date, self.start_time)
    }

    pub fn window_end(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.end_date, self.end_time)
    }

    pub fn filter_spec(&self) -> FilterSpec {
        FilterSpec::new(self.window_start(), self.window_end()).with_hour(self.hour_filter)
    }

    /// Recompute the cached window and nearest-hour results.
    pub fn refilter(&mut self) {
        let Some(series) = &self.series else {
            self.window = None;
            self.hourly = None;
            return;
        };

        let window = filter_by_window(series, &self.filter_spec());
        let hourly = FilteredResult::from_series(nearest_to_hour(
            &window.series,
            self.custom_hour,
            self.nearest_match,
        ));
        log::debug!(
            "{}: {} readings in window, {} nearest to {}",
            series.location,
            window.len(),
            hourly.len(),
            self.custom_hour
        );

        self.window = Some(window);
        self.hourly = Some(hourly);
    }

    /// Y range of the nearest-hour chart; `None` in auto mode without data.
    pub fn y_bounds(&self) -> Option<(f64, f64)> {
        match self.y_axis {
            YAxisMode::Manual { lower, upper } => Some((lower, upper)),
            YAxisMode::Auto { multiplier } => self
                .hourly
                .as_ref()
                .and_then(|h| display_bounds(&h.summary, multiplier)),
        }
    }

    /// CSV bytes of the nearest-hour view.
    pub fn export_hourly(&self) -> Result<Vec<u8>> {
        let hourly = self.hourly.as_ref().context("no data loaded")?;
        export_csv(&hourly.series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::stats::Summary;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 9, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    /// Two days of 20-minute readings for two wells.
    fn table() -> GroundwaterTable {
        let mut times = Vec::new();
        let mut a = Vec::new();
        let mut b = Vec::new();
        for d in 26..28 {
            for h in 0..24 {
                for m in [0, 20, 40] {
                    times.push(at(d, h, m));
                    a.push(-10.0 - f64::from(h) / 10.0);
                    b.push(-5.0);
                }
            }
        }
        GroundwaterTable::new(times, vec![("Test01".into(), a), ("Test02".into(), b)]).unwrap()
    }

    fn state() -> AppState {
        let mut cfg = AppConfig::default();
        cfg.dashboard.start = at(26, 0, 0);
        cfg.dashboard.end = at(27, 23, 59);
        AppState::new(cfg)
    }

    #[test]
    fn set_table_prefers_configured_location() {
        let mut s = state();
        s.set_table(table());
        assert_eq!(s.location.as_deref(), Some("Test02"));
        assert_eq!(s.window.as_ref().unwrap().len(), 144);
    }

    #[test]
    fn set_table_falls_back_to_first_location() {
        let mut s = state();
        s.config.dashboard.default_location = "Missing".into();
        s.set_table(table());
        assert_eq!(s.location.as_deref(), Some("Test01"));
    }

    #[test]
    fn refilter_applies_window_hour_and_nearest() {
        let mut s = state();
        s.set_table(table());
        s.select_location("Test01");

        s.hour_filter = HourFilter::Hour(HourOfDay::new(15).unwrap());
        s.refilter();
        let window = s.window.as_ref().unwrap();
        assert_eq!(window.len(), 6);

        // 15:00 on each day
        let hourly = s.hourly.as_ref().unwrap();
        assert_eq!(hourly.len(), 2);
        assert!(hourly.series.readings.iter().all(|r| r.value == -11.5));
    }

    #[test]
    fn inverted_window_yields_no_data() {
        let mut s = state();
        s.set_table(table());
        s.start_date = NaiveDate::from_ymd_opt(2023, 9, 28).unwrap();
        s.refilter();
        assert!(s.window.as_ref().unwrap().is_empty());
        assert_eq!(s.hourly.as_ref().unwrap().summary, Summary::NoData);

        s.y_axis = YAxisMode::Auto { multiplier: 2.0 };
        assert_eq!(s.y_bounds(), None);
    }

    #[test]
    fn auto_bounds_follow_hourly_summary() {
        let mut s = state();
        s.set_table(table());
        s.select_location("Test02");
        s.y_axis = YAxisMode::Auto { multiplier: 2.0 };
        assert_eq!(s.y_bounds(), Some((-5.0, -5.0)));

        s.y_axis = YAxisMode::Manual { lower: -20.0, upper: 0.0 };
        assert_eq!(s.y_bounds(), Some((-20.0, 0.0)));
    }

    #[test]
    fn export_contains_hourly_rows() {
        let mut s = state();
        assert!(s.export_hourly().is_err());

        s.set_table(table());
        let text = String::from_utf8(s.export_hourly().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Time,Test02");
        assert_eq!(lines[1], "2023-09-26 15:00:00,-5");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn failed_reload_keeps_previous_table() {
        let mut s = state();
        s.set_table(table());
        let before = s.source.clone();
        s.open_file("/nonexistent/levels.csv".into());
        assert!(s.status_message.as_deref().unwrap().starts_with("Load error"));
        assert!(s.table.is_some());
        assert_eq!(s.source, before);
    }

    #[test]
    fn opened_file_becomes_the_source() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"Time,Test02\n2023-09-27 15:00:00,-6.0\n").unwrap();

        let mut s = state();
        s.open_file(file.path().to_path_buf());
        assert_eq!(s.source, DataSource::Path(file.path().to_path_buf()));
        assert_eq!(s.table.as_ref().map(|t| t.len()), Some(1));
        assert!(s.status_message.is_none());
    }
}
