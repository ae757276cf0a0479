mod app;
mod color;
mod data;
mod plugins;
mod settings;
mod state;
mod ui;

use app::RustyPeaksApp;
use eframe::egui;
use settings::AppSettings;

fn main() -> eframe::Result {
    env_logger::init();

    let settings = AppSettings::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Peaks – Spectral Tables",
        options,
        Box::new(|_cc| Ok(Box::new(RustyPeaksApp::new(settings)))),
    )
}
