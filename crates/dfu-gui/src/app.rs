//! Application state and analysis management.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use eframe::egui;

use dfu_core::inference::{Classifier, DfuModel};
use dfu_core::pipeline::{InferenceContext, PipelineConfig, Prediction};

/// Preview images are shown at this width, aspect ratio kept.
pub const PREVIEW_WIDTH: u32 = 300;

/// Application state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    Analyzing,
    Complete,
}

pub struct DfuApp {
    // Configuration
    pub model_path: Option<PathBuf>,
    pub bundle_path: Option<PathBuf>,
    pub image_path: Option<PathBuf>,
    pub threshold: f64,

    // State
    pub state: AnalysisState,
    pub preview: Option<egui::TextureHandle>,
    pub prediction: Option<Prediction>,
    pub error_message: Option<String>,
    pub duration: Option<f32>,

    // Loaded once per (model, bundle) pair and reused across analyses.
    context: Option<LoadedContext>,

    // Communication
    result_rx: Option<mpsc::Receiver<AnalysisOutcome>>,
}

struct LoadedContext<M = DfuModel> {
    config: (PathBuf, PathBuf),
    context: Arc<InferenceContext<M>>,
}

/// Worker result. The context travels back whenever it was loaded, so a bad
/// image does not force a model reload.
struct AnalysisOutcome<M = DfuModel> {
    result: Result<(Prediction, f32), String>,
    loaded: Option<LoadedContext<M>>,
}

impl DfuApp {
    pub fn new() -> Self {
        Self {
            model_path: None,
            bundle_path: None,
            image_path: None,
            threshold: dfu_core::pipeline::DEFAULT_RISK_THRESHOLD,
            state: AnalysisState::Idle,
            preview: None,
            prediction: None,
            error_message: None,
            duration: None,
            context: None,
            result_rx: None,
        }
    }

    /// Set the image to analyze and build its preview texture.
    pub fn select_image(&mut self, ctx: &egui::Context, path: PathBuf) {
        self.prediction = None;
        self.duration = None;
        self.state = AnalysisState::Idle;

        match load_preview(&path) {
            Ok(color_image) => {
                self.preview =
                    Some(ctx.load_texture("preview", color_image, egui::TextureOptions::LINEAR));
                self.error_message = None;
            }
            Err(e) => {
                self.preview = None;
                self.error_message = Some(format!("{e:#}"));
            }
        }
        self.image_path = Some(path);
    }

    pub fn start_analysis(&mut self) {
        let Some(model_path) = self.model_path.clone() else {
            self.error_message = Some("No model file selected".into());
            return;
        };
        let Some(bundle_path) = self.bundle_path.clone() else {
            self.error_message = Some("No preprocessing bundle selected".into());
            return;
        };
        let Some(image_path) = self.image_path.clone() else {
            self.error_message = Some("No image selected".into());
            return;
        };

        self.error_message = None;
        self.prediction = None;
        self.duration = None;
        self.state = AnalysisState::Analyzing;

        let key = (model_path, bundle_path);
        let cached = self
            .context
            .take()
            .filter(|loaded| loaded.config == key);

        let (tx, rx) = mpsc::channel();
        self.result_rx = Some(rx);

        std::thread::spawn(move || {
            let start = Instant::now();
            let _ = tx.send(analyze(key, cached, &image_path, start));
        });
    }

    /// Poll for completion, called each frame.
    pub fn poll(&mut self) {
        if let Some(rx) = &self.result_rx {
            if let Ok(outcome) = rx.try_recv() {
                if outcome.loaded.is_some() {
                    self.context = outcome.loaded;
                }
                match outcome.result {
                    Ok((prediction, duration)) => {
                        self.prediction = Some(prediction);
                        self.duration = Some(duration);
                        self.state = AnalysisState::Complete;
                    }
                    Err(msg) => {
                        self.error_message = Some(msg);
                        self.state = AnalysisState::Idle;
                    }
                }
                self.result_rx = None;
            }
        }
    }
}

fn analyze(
    key: (PathBuf, PathBuf),
    cached: Option<LoadedContext>,
    image_path: &Path,
    start: Instant,
) -> AnalysisOutcome {
    let loaded = match cached {
        Some(loaded) => loaded,
        None => {
            let config = PipelineConfig {
                model_path: key.0.clone(),
                bundle_path: key.1.clone(),
            };
            match InferenceContext::load(&config) {
                Ok(context) => LoadedContext {
                    config: key,
                    context: Arc::new(context),
                },
                Err(e) => {
                    return AnalysisOutcome {
                        result: Err(e.to_string()),
                        loaded: None,
                    }
                }
            }
        }
    };
    score_with(loaded, image_path, start)
}

fn score_with<M: Classifier>(
    loaded: LoadedContext<M>,
    image_path: &Path,
    start: Instant,
) -> AnalysisOutcome<M> {
    let result = score(&loaded.context, image_path).map(|prediction| {
        tracing::info!(
            image = %image_path.display(),
            probability = prediction.probability,
            "analysis complete"
        );
        (prediction, start.elapsed().as_secs_f32())
    });
    AnalysisOutcome {
        result,
        loaded: Some(loaded),
    }
}

fn score<M: Classifier>(
    context: &InferenceContext<M>,
    image_path: &Path,
) -> Result<Prediction, String> {
    // Uploaded bytes go through the in-memory decode path.
    let bytes = std::fs::read(image_path)
        .map_err(|_| dfu_core::error::INVALID_IMAGE_MESSAGE.to_string())?;
    context.predict_bytes(&bytes).map_err(|e| e.to_string())
}

/// Height for a preview of `fixed_width`, keeping the aspect ratio.
pub fn preview_size(width: u32, height: u32, fixed_width: u32) -> (u32, u32) {
    if width == 0 {
        return (fixed_width, 0);
    }
    let scaled = (f64::from(fixed_width) / f64::from(width) * f64::from(height)) as u32;
    (fixed_width, scaled.max(1))
}

fn load_preview(path: &Path) -> anyhow::Result<egui::ColorImage> {
    use anyhow::Context;

    let img = image::open(path)
        .with_context(|| format!("could not open {}", path.display()))?
        .to_rgba8();
    let (w, h) = preview_size(img.width(), img.height(), PREVIEW_WIDTH);
    let resized = image::imageops::resize(&img, w, h, image::imageops::FilterType::Triangle);

    Ok(egui::ColorImage::from_rgba_unmultiplied(
        [w as usize, h as usize],
        resized.as_raw(),
    ))
}

impl eframe::App for DfuApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll();

        if self.state == AnalysisState::Analyzing {
            ctx.request_repaint();
        }

        crate::ui::sidebar::draw_sidebar(ctx, self);
        crate::ui::result_view::draw_result_view(ctx, self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfu_core::bundle::{PreprocessingBundle, StandardScaler};
    use dfu_core::error::PipelineError;

    struct Half;

    impl Classifier for Half {
        fn input_len(&self) -> Option<usize> {
            None
        }

        fn classify(&self, _image: &[f32], _auxiliary: &[f32]) -> Result<f32, PipelineError> {
            Ok(0.5)
        }
    }

    fn loaded() -> LoadedContext<Half> {
        LoadedContext {
            config: (PathBuf::from("model.onnx"), PathBuf::from("bundle.json")),
            context: Arc::new(InferenceContext::new(
                Half,
                PreprocessingBundle::new(26.0, StandardScaler::IDENTITY),
            )),
        }
    }

    #[test]
    fn unreadable_image_keeps_loaded_context() {
        let ctx = loaded();
        let shared = Arc::clone(&ctx.context);

        let outcome = score_with(ctx, Path::new("no/such/foot.png"), Instant::now());
        assert_eq!(
            outcome.result.unwrap_err(),
            dfu_core::error::INVALID_IMAGE_MESSAGE
        );
        let kept = outcome.loaded.expect("context handed back");
        assert!(Arc::ptr_eq(&kept.context, &shared));
    }

    #[test]
    fn preview_keeps_aspect_ratio() {
        assert_eq!(preview_size(600, 400, 300), (300, 200));
        assert_eq!(preview_size(150, 450, 300), (300, 900));
        assert_eq!(preview_size(3000, 1, 300), (300, 1));
    }
}
