//! DFU screening desktop form (eframe/egui).

mod app;
mod ui;

use app::DfuApp;
use tracing_subscriber::EnvFilter;

fn main() -> eframe::Result {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("DFU Prediction")
            .with_inner_size([860.0, 600.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "DFU Prediction",
        options,
        Box::new(|cc| {
            ui::theme::apply_theme(&cc.egui_ctx);
            Ok(Box::new(DfuApp::new()))
        }),
    )
}
