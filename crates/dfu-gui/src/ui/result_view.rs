//! Main panel: image preview next to the probability readout.

use eframe::egui;

use crate::app::{AnalysisState, DfuApp};
use crate::ui::theme;

pub fn draw_result_view(ctx: &egui::Context, app: &DfuApp) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.heading("Diabetic Foot Ulcer Prediction");
        ui.label("Upload an image to analyze the probability of having DFU.");
        ui.separator();

        ui.columns(2, |columns| {
            draw_preview(&mut columns[0], app);
            draw_readout(&mut columns[1], app);
        });
    });
}

fn draw_preview(ui: &mut egui::Ui, app: &DfuApp) {
    match &app.preview {
        Some(texture) => {
            ui.image(texture);
            ui.small("Uploaded Image");
        }
        None => {
            ui.label("Select a model, bundle and image, then click ANALYZE.");
        }
    }
}

fn draw_readout(ui: &mut egui::Ui, app: &DfuApp) {
    match app.state {
        AnalysisState::Idle => {}
        AnalysisState::Analyzing => {
            ui.horizontal(|ui| {
                ui.add(egui::Spinner::new().color(theme::COLOR_ANALYZING));
                ui.colored_label(theme::COLOR_ANALYZING, "Analyzing...");
            });
        }
        AnalysisState::Complete => {
            let Some(prediction) = app.prediction else {
                return;
            };
            ui.heading("Prediction Result");
            ui.add_space(4.0);
            ui.label(
                egui::RichText::new(format!(
                    "Probability of having DFU: {:.2}%",
                    prediction.probability
                ))
                .strong(),
            );
            ui.add_space(8.0);

            let risk = prediction.risk(app.threshold);
            ui.colored_label(theme::risk_color(risk), risk.advice());

            if let Some(dur) = app.duration {
                ui.add_space(8.0);
                ui.small(format!("Duration: {dur:.2}s"));
            }
        }
    }
}
