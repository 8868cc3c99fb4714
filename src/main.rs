mod app;
mod color;
mod config;
mod data;
mod state;
mod ui;

use app::GroundwaterApp;
use config::AppConfig;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let (config, config_error) = match AppConfig::load() {
        Ok(cfg) => (cfg, None),
        Err(e) => {
            log::error!("Invalid configuration, using defaults: {e}");
            (AppConfig::default(), Some(format!("Config error: {e}")))
        }
    };
    let title = config.dashboard.title.clone();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |cc| {
            // Install image loaders so egui can render png/jpg/etc.
            egui_extras::install_image_loaders(&cc.egui_ctx);
            let mut app = GroundwaterApp::new(config);
            if config_error.is_some() && app.state.status_message.is_none() {
                app.state.status_message = config_error;
            }
            Ok(Box::new(app))
        }),
    )
}
