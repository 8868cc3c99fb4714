use eframe::egui::Ui;
use egui_extras::{Column, TableBuilder};

use crate::state::AppState;

/// Level cell text; missing values show as a dash.
fn format_level(v: f64) -> String {
    if v.is_nan() {
        "–".to_string()
    } else {
        format!("{v:.3}")
    }
}

// ---------------------------------------------------------------------------
// Detailed data view (bottom panel)
// ---------------------------------------------------------------------------

/// Table of the nearest-hour readings, newest first.
pub fn data_table(ui: &mut Ui, state: &AppState) {
    ui.strong("Detailed data view");

    let Some(hourly) = &state.hourly else {
        ui.label("No dataset loaded.");
        return;
    };
    if hourly.is_empty() {
        ui.label("No data for the selected filters.");
        return;
    }

    let rows = hourly.series.sorted_descending();

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .column(Column::auto().at_least(160.0))
        .column(Column::remainder())
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Time");
            });
            header.col(|ui| {
                ui.strong(format!("{} (m)", rows.location));
            });
        })
        .body(|body| {
            body.rows(18.0, rows.len(), |mut row| {
                let r = rows.readings[row.index()];
                row.col(|ui| {
                    ui.label(r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
                });
                row.col(|ui| {
                    ui.label(format_level(r.value));
                });
            });
        });
}
