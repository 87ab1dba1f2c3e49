//! Muted clinical palette: slate panels, risk colours for the readout.

use eframe::egui::{self, Color32, CornerRadius, Stroke, Visuals};

use dfu_core::pipeline::RiskLevel;

pub const COLOR_HIGH_RISK: Color32 = Color32::from_rgb(214, 64, 69);
pub const COLOR_LOW_RISK: Color32 = Color32::from_rgb(46, 160, 110);
pub const COLOR_ERROR: Color32 = Color32::from_rgb(224, 150, 40);
pub const COLOR_ANALYZING: Color32 = Color32::from_rgb(90, 150, 220);

const PANEL_FILL: Color32 = Color32::from_rgb(28, 33, 40);
const SURFACE_FILL: Color32 = Color32::from_rgb(36, 42, 51);
const TEXT: Color32 = Color32::from_rgb(225, 230, 236);

/// Advice text colour for a risk level.
pub fn risk_color(risk: RiskLevel) -> Color32 {
    match risk {
        RiskLevel::High => COLOR_HIGH_RISK,
        RiskLevel::Low => COLOR_LOW_RISK,
    }
}

pub fn apply_theme(ctx: &egui::Context) {
    let mut visuals = Visuals::dark();
    visuals.override_text_color = Some(TEXT);
    visuals.panel_fill = PANEL_FILL;
    visuals.window_fill = SURFACE_FILL;
    visuals.extreme_bg_color = SURFACE_FILL;
    visuals.selection.bg_fill = COLOR_ANALYZING.gamma_multiply(0.6);
    visuals.selection.stroke = Stroke::new(1.0, TEXT);
    visuals.widgets.inactive.corner_radius = CornerRadius::same(4);
    visuals.widgets.hovered.corner_radius = CornerRadius::same(4);
    visuals.widgets.active.corner_radius = CornerRadius::same(4);
    ctx.set_visuals(visuals);

    ctx.style_mut(|style| {
        style.spacing.item_spacing = egui::vec2(10.0, 8.0);
        style.spacing.button_padding = egui::vec2(10.0, 5.0);
        style.spacing.slider_width = 140.0;
    });
}
