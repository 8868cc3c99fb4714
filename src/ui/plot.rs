use std::ops::RangeInclusive;

use chrono::{DateTime, NaiveDateTime};
use eframe::egui::{Color32, Ui};
use egui_plot::{GridMark, Legend, Line, Plot, PlotBounds, PlotPoint, PlotPoints, Points};

use crate::data::model::Series;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Time axis helpers
// ---------------------------------------------------------------------------

/// Plot x coordinate: seconds since the epoch of the naive wall time.
fn to_x(t: &NaiveDateTime) -> f64 {
    t.and_utc().timestamp() as f64
}

fn format_x(x: f64, fmt: &str) -> String {
    DateTime::from_timestamp(x.round() as i64, 0)
        .map(|dt| dt.naive_utc().format(fmt).to_string())
        .unwrap_or_default()
}

fn points(series: &Series) -> Vec<[f64; 2]> {
    series
        .readings
        .iter()
        .filter(|r| !r.value.is_nan())
        .map(|r| [to_x(&r.timestamp), r.value])
        .collect()
}

// ---------------------------------------------------------------------------
// Charts (central panel)
// ---------------------------------------------------------------------------

/// Render the overview, window and nearest-hour charts stacked vertically.
pub fn level_charts(ui: &mut Ui, state: &AppState) {
    let Some(series) = &state.series else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No data loaded  (File → Reload data / Open local file…)");
        });
        return;
    };

    let color = state
        .color_map
        .as_ref()
        .map(|cm| cm.color_for(&series.location))
        .unwrap_or(Color32::LIGHT_BLUE);
    let height = (ui.available_height() / 3.0 - 28.0).max(120.0);

    ui.strong(format!("Groundwater level – {}", series.location));
    level_plot(ui, "overview_plot", series, color, height, None, false);

    ui.strong(format!(
        "Window {} – {}",
        state.window_start().format("%Y-%m-%d %H:%M"),
        state.window_end().format("%Y-%m-%d %H:%M")
    ));
    match &state.window {
        Some(w) => level_plot(ui, "window_plot", &w.series, color, height, None, false),
        None => no_data(ui, height),
    }

    ui.strong(format!("Nearest to {}", state.custom_hour));
    match &state.hourly {
        Some(h) => level_plot(ui, "hourly_plot", &h.series, color, height, state.y_bounds(), true),
        None => no_data(ui, height),
    }
}

fn no_data(ui: &mut Ui, height: f32) {
    ui.allocate_ui(eframe::egui::vec2(ui.available_width(), height), |ui: &mut Ui| {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label("No data for the selected filters.");
        });
    });
}

/// One level-over-time chart. `y_bounds` pins the y axis and disables
/// panning/zooming.
fn level_plot(
    ui: &mut Ui,
    id: &str,
    series: &Series,
    color: Color32,
    height: f32,
    y_bounds: Option<(f64, f64)>,
    markers: bool,
) {
    let pts = points(series);
    if pts.is_empty() {
        no_data(ui, height);
        return;
    }

    let x_span = series.time_span().map(|(a, b)| (to_x(&a), to_x(&b)));
    let pinned = y_bounds.zip(x_span);

    Plot::new(id)
        .height(height)
        .legend(Legend::default())
        .x_axis_label("Time")
        .y_axis_label("Level (m)")
        .x_axis_formatter(|mark: GridMark, _range: &RangeInclusive<f64>| {
            format_x(mark.value, "%b %d")
        })
        .label_formatter(|name: &str, value: &PlotPoint| {
            let time = format_x(value.x, "%Y-%m-%d %H:%M");
            if name.is_empty() {
                format!("{time}\n{:.3} m", value.y)
            } else {
                format!("{name}\n{time}\n{:.3} m", value.y)
            }
        })
        .allow_drag(pinned.is_none())
        .allow_zoom(pinned.is_none())
        .allow_scroll(pinned.is_none())
        .allow_boxed_zoom(pinned.is_none())
        .show(ui, |plot_ui| {
            if let Some(((lower, upper), (x0, x1))) = pinned {
                // A flat series gives a zero-height window.
                let (lower, upper) = if upper > lower {
                    (lower, upper)
                } else {
                    (lower - 0.5, upper + 0.5)
                };
                let pad = ((x1 - x0) * 0.02).max(1800.0);
                plot_ui.set_plot_bounds(PlotBounds::from_min_max(
                    [x0 - pad, lower],
                    [x1 + pad, upper],
                ));
            }

            plot_ui.line(
                Line::new(PlotPoints::from(pts.clone()))
                    .name(&series.location)
                    .color(color)
                    .width(1.5),
            );
            if markers {
                plot_ui.points(Points::new(PlotPoints::from(pts)).color(color).radius(3.0));
            }
        });
}
