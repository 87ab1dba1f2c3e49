//! Left panel: model/bundle/image pickers, threshold, analyze button.

use std::path::PathBuf;

use eframe::egui;

use crate::app::{AnalysisState, DfuApp};

fn file_label(ui: &mut egui::Ui, path: Option<&PathBuf>) {
    if let Some(p) = path {
        ui.small(
            p.file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "?".into()),
        );
    }
}

pub fn draw_sidebar(ctx: &egui::Context, app: &mut DfuApp) {
    egui::SidePanel::left("sidebar")
        .resizable(true)
        .default_width(220.0)
        .min_width(180.0)
        .show(ctx, |ui| {
            ui.vertical(|ui| {
                ui.heading("DFU PREDICTION");
                ui.label(concat!("v", env!("CARGO_PKG_VERSION")));
                ui.separator();

                ui.label("MODEL");
                if ui.button("Select Model...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("ONNX Model", &["onnx"])
                        .pick_file()
                    {
                        app.model_path = Some(path);
                    }
                }
                file_label(ui, app.model_path.as_ref());
                ui.add_space(4.0);

                ui.label("PREPROCESSING");
                if ui.button("Select Bundle...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("JSON", &["json"])
                        .pick_file()
                    {
                        app.bundle_path = Some(path);
                    }
                }
                file_label(ui, app.bundle_path.as_ref());
                ui.add_space(4.0);
                ui.separator();

                ui.label("IMAGE");
                if ui.button("Choose a PNG image...").clicked() {
                    if let Some(path) = rfd::FileDialog::new()
                        .add_filter("PNG", &["png"])
                        .pick_file()
                    {
                        app.select_image(ctx, path);
                    }
                }
                file_label(ui, app.image_path.as_ref());

                ui.add_space(4.0);
                ui.separator();

                ui.label("SETTINGS");
                ui.horizontal(|ui| {
                    ui.label("High risk above:");
                    ui.add(
                        egui::Slider::new(&mut app.threshold, 0.0..=100.0)
                            .step_by(5.0)
                            .suffix("%"),
                    );
                });

                ui.add_space(8.0);

                let busy = app.state == AnalysisState::Analyzing;
                ui.add_enabled_ui(!busy, |ui| {
                    if ui
                        .add_sized([ui.available_width(), 32.0], egui::Button::new("ANALYZE"))
                        .clicked()
                    {
                        app.start_analysis();
                    }
                });

                if let Some(err) = &app.error_message {
                    ui.add_space(4.0);
                    ui.colored_label(super::theme::COLOR_ERROR, err);
                }
            });
        });
}
