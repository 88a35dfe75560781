mod app;
mod color;
mod state;
mod ui;

use std::path::PathBuf;

use app::HazardLensApp;
use eframe::egui;
use hazard_lens::Settings;
use state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    // Optional explicit settings file as the only argument.
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Hazard Lens – Multi-Hazard Community Vulnerability",
        options,
        Box::new(move |_cc| Ok(Box::new(HazardLensApp::new(AppState::new(settings))))),
    )
}
