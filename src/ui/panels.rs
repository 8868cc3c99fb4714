use anyhow::Context as _;
use chrono::{NaiveTime, Timelike};
use eframe::egui::{self, Color32, RichText, ScrollArea, Slider, Ui};
use egui_extras::DatePickerButton;

use crate::data::export::DEFAULT_EXPORT_NAME;
use crate::data::filter::NearestMatch;
use crate::data::model::{HourFilter, HourOfDay};
use crate::state::{AppState, YAxisMode};
use crate::ui::upload;

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading(&state.config.dashboard.title);
    ui.separator();

    let locations: Vec<String> = match &state.table {
        Some(table) => table.locations().map(str::to_string).collect(),
        None => {
            ui.label("No dataset loaded.");
            return;
        }
    };

    let mut changed = false;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Location selector ----
            ui.strong("Observation well");
            let current = state.location.clone().unwrap_or_default();
            let mut picked = None;
            egui::ComboBox::from_id_salt("location")
                .selected_text(&current)
                .show_ui(ui, |ui: &mut Ui| {
                    for loc in &locations {
                        if ui.selectable_label(current == *loc, loc).clicked() {
                            picked = Some(loc.clone());
                        }
                    }
                });
            if let Some(loc) = picked {
                state.select_location(&loc);
            }
            ui.separator();

            // ---- Date / time window ----
            ui.strong("Window");
            egui::Grid::new("window_grid")
                .num_columns(3)
                .spacing([6.0, 4.0])
                .show(ui, |ui: &mut Ui| {
                    ui.label("Start");
                    changed |= ui
                        .add(DatePickerButton::new(&mut state.start_date).id_salt("start_date"))
                        .changed();
                    changed |= time_input(ui, "start_time", &mut state.start_time);
                    ui.end_row();

                    ui.label("End");
                    changed |= ui
                        .add(DatePickerButton::new(&mut state.end_date).id_salt("end_date"))
                        .changed();
                    changed |= time_input(ui, "end_time", &mut state.end_time);
                    ui.end_row();
                });
            if state.window_start() > state.window_end() {
                ui.label(RichText::new("Start is after end: nothing matches.").color(Color32::YELLOW));
            }

            ui.horizontal(|ui: &mut Ui| {
                ui.label("Hour of day");
                egui::ComboBox::from_id_salt("hour_filter")
                    .selected_text(state.hour_filter.to_string())
                    .show_ui(ui, |ui: &mut Ui| {
                        changed |= ui
                            .selectable_value(&mut state.hour_filter, HourFilter::All, "all")
                            .changed();
                        for h in (0..24).filter_map(HourOfDay::new) {
                            changed |= ui
                                .selectable_value(&mut state.hour_filter, HourFilter::Hour(h), h.to_string())
                                .changed();
                        }
                    });
            });
            ui.separator();

            // ---- Nearest-to-hour view ----
            ui.strong("Nearest to hour");
            let mut hour = state.custom_hour.get();
            if ui.add(Slider::new(&mut hour, 0..=23).text("hour")).changed() {
                if let Some(h) = HourOfDay::new(hour) {
                    state.custom_hour = h;
                    changed = true;
                }
            }
            ui.horizontal(|ui: &mut Ui| {
                changed |= ui
                    .radio_value(&mut state.nearest_match, NearestMatch::PerDay, "per day")
                    .changed();
                changed |= ui
                    .radio_value(&mut state.nearest_match, NearestMatch::Global, "whole range")
                    .changed();
            });
            ui.separator();

            // ---- Y axis of the nearest-hour chart ----
            ui.strong("Y axis");
            y_axis_controls(ui, state);
            ui.separator();

            // ---- Summary ----
            ui.strong("Summary");
            if let Some(w) = &state.window {
                ui.label(format!("Window: {} readings, {}", w.len(), w.summary));
            }
            if let Some(h) = &state.hourly {
                ui.label(format!("Nearest: {} readings, {}", h.len(), h.summary));
            }

            // ---- Uploaded image ----
            if let Some(texture) = &state.image {
                ui.separator();
                let width = ui.available_width();
                ui.add(egui::Image::new(texture).max_width(width));
            }
        });

    if changed {
        state.refilter();
    }
}

/// Hour and minute inputs for a time of day. Returns whether it changed.
fn time_input(ui: &mut Ui, id: &str, time: &mut NaiveTime) -> bool {
    let mut hour = time.hour();
    let mut minute = time.minute();
    let mut changed = false;

    ui.push_id(id, |ui: &mut Ui| {
        ui.horizontal(|ui: &mut Ui| {
            changed |= ui.add(egui::DragValue::new(&mut hour).range(0..=23)).changed();
            ui.label(":");
            changed |= ui.add(egui::DragValue::new(&mut minute).range(0..=59)).changed();
        });
    });

    if changed {
        if let Some(t) = NaiveTime::from_hms_opt(hour, minute, 0) {
            *time = t;
        }
    }
    changed
}

fn y_axis_controls(ui: &mut Ui, state: &mut AppState) {
    let dashboard = &state.config.dashboard;
    let [min, max] = dashboard.y_limits;
    let default_range = dashboard.y_range;
    let default_multiplier = dashboard.range_multiplier;

    let mut auto = matches!(state.y_axis, YAxisMode::Auto { .. });
    ui.horizontal(|ui: &mut Ui| {
        ui.radio_value(&mut auto, false, "manual");
        ui.radio_value(&mut auto, true, "around mean");
    });

    state.y_axis = match (auto, state.y_axis) {
        (true, YAxisMode::Manual { .. }) => YAxisMode::Auto {
            multiplier: default_multiplier,
        },
        (false, YAxisMode::Auto { .. }) => YAxisMode::Manual {
            lower: default_range[0],
            upper: default_range[1],
        },
        (_, mode) => mode,
    };

    match &mut state.y_axis {
        YAxisMode::Manual { lower, upper } => {
            ui.add(Slider::new(&mut *lower, min..=max).step_by(0.1).text("lower (m)"));
            ui.add(Slider::new(&mut *upper, min..=max).step_by(0.1).text("upper (m)"));
            if *lower >= *upper {
                *lower = (*upper - 0.1).max(min);
            }
        }
        YAxisMode::Auto { multiplier } => {
            ui.add(Slider::new(multiplier, 0.1..=10.0).step_by(0.1).text("range ×"));
        }
    }

    match state.y_bounds() {
        Some((lo, hi)) => ui.label(format!("{lo:.2} m … {hi:.2} m")),
        None => ui.label("no data"),
    };
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Reload data").clicked() {
                state.reload();
                ui.close_menu();
            }
            if ui.button("Open local file…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            ui.separator();
            if ui
                .add_enabled(state.hourly.is_some(), egui::Button::new("Export CSV…"))
                .clicked()
            {
                save_csv_dialog(state);
                ui.close_menu();
            }
            if ui.button("Upload image…").clicked() {
                upload_image(ui.ctx(), state);
                ui.close_menu();
            }
        });

        ui.separator();
        ui.label(format!("Source: {}", state.source));

        if let (Some(table), Some(window), Some(hourly)) = (&state.table, &state.window, &state.hourly) {
            ui.separator();
            ui.label(format!(
                "{} rows loaded, {} in window, {} nearest to {}",
                table.len(),
                window.len(),
                hourly.len(),
                state.custom_hour
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open groundwater levels")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.open_file(path);
    }
}

pub fn save_csv_dialog(state: &mut AppState) {
    let Some(path) = rfd::FileDialog::new()
        .set_title("Export CSV")
        .set_file_name(DEFAULT_EXPORT_NAME)
        .add_filter("CSV", &["csv"])
        .save_file()
    else {
        return;
    };

    let written = state.export_hourly().and_then(|bytes| {
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))
    });
    match written {
        Ok(()) => {
            log::info!("Exported CSV to {}", path.display());
            state.status_message = None;
        }
        Err(e) => {
            log::error!("Export failed: {e:#}");
            state.status_message = Some(format!("Export error: {e:#}"));
        }
    }
}

fn upload_image(ctx: &egui::Context, state: &mut AppState) {
    match upload::pick_image(ctx) {
        Some(Ok(texture)) => state.image = Some(texture),
        Some(Err(e)) => {
            log::warn!("Image upload failed: {e:#}");
            state.status_message = Some(format!("Image error: {e:#}"));
        }
        None => {}
    }
}
