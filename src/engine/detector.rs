//! Single-model NSFW detectors
//!
//! A detector owns one inference session and composes the full pipeline:
//! preprocess -> invoke -> decode -> aggregate. Construction is expensive
//! (chunk reassembly, session build); instances are meant to be reused
//! across many `probability` calls and release their session on drop.

use std::path::Path;

use image::DynamicImage;
use tracing::{debug, info};

use crate::engine::decode::{self, Detection};
use crate::engine::preprocess::{
    self, ChannelOrder, PadAnchor, PixelTransform, PreprocessOptions, ResizeMode, TensorLayout,
};
use crate::engine::score::{self, LabelTable};
use crate::engine::session::InferenceEngine;
use crate::error::ScanError;
use crate::utils::chunks;

/// Full configuration for one box-detection model.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub name: &'static str,
    pub input_name: &'static str,
    pub output_name: &'static str,
    pub preprocess: PreprocessOptions,
    pub labels: LabelTable,
}

/// A detector that maps an image to an NSFW probability in `[0, 1]`.
pub trait NsfwDetector {
    fn name(&self) -> &str;

    /// Probability that the image contains explicit content, rounded to
    /// 2 decimal places. Takes `&mut self`: the underlying session is not
    /// reentrant and the first call performs the one-time warm-up pass.
    fn probability(&mut self, image: &DynamicImage) -> Result<f32, ScanError>;
}

/// One-shot warm-up state: `Uninitialized -> Ready`.
///
/// The first inference on a fresh session occasionally returns garbage
/// (cold-start defect in the backend), so a full throwaway pass must run
/// before any result is trusted. The transition is taken at most once per
/// instance, lazily on first real use rather than at construction.
pub(crate) struct ColdStart {
    ready: bool,
}

impl ColdStart {
    pub fn new() -> Self {
        Self { ready: false }
    }

    /// Returns true exactly once, marking the transition as taken.
    pub fn take_transition(&mut self) -> bool {
        if self.ready {
            return false;
        }
        self.ready = true;
        true
    }
}

/// NudeNet 640m detector (<https://github.com/notAI-tech/NudeNet>).
pub struct NudeNetDetector {
    config: DetectorConfig,
    engine: InferenceEngine,
    cold_start: ColdStart,
}

impl NudeNetDetector {
    /// Load from a chunked model artifact (`<base>.0`, `<base>.1`, ...).
    pub fn load(model_base: &Path) -> Result<Self, ScanError> {
        let bytes = chunks::read_chunked(model_base)?;
        let engine = InferenceEngine::from_bytes(&bytes)?;
        info!("NudeNet detector loaded from {}", model_base.display());
        Ok(Self {
            config: nudenet_config(),
            engine,
            cold_start: ColdStart::new(),
        })
    }

    fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Detection>, ScanError> {
        let preprocessed = preprocess::preprocess(image, &self.config.preprocess)?;
        let output = self.engine.run(
            preprocessed.tensor,
            self.config.input_name,
            self.config.output_name,
        )?;
        decode::decode(&output, &preprocessed.meta, &self.config.labels)
    }
}

impl NsfwDetector for NudeNetDetector {
    fn name(&self) -> &str {
        self.config.name
    }

    fn probability(&mut self, image: &DynamicImage) -> Result<f32, ScanError> {
        if self.cold_start.take_transition() {
            debug!(detector = self.config.name, "running warm-up pass");
            self.detect(image)?;
        }
        let detections = self.detect(image)?;
        Ok(score::to_probability(&detections, &self.config.labels))
    }
}

fn nudenet_config() -> DetectorConfig {
    DetectorConfig {
        name: "nudenet-640m",
        input_name: "images",
        output_name: "output0",
        preprocess: PreprocessOptions {
            target_width: 640,
            target_height: 640,
            resize_mode: ResizeMode::Letterbox {
                anchor: PadAnchor::TopLeft,
            },
            transform: PixelTransform::Div255,
            channel_transforms: [None, None, None],
            channel_order: ChannelOrder::Rgb,
            layout: TensorLayout::Nchw,
            pad_fill: [0, 0, 0],
        },
        labels: LabelTable::new(NUDENET_LABELS),
    }
}

/// NudeNet class list in model output order, with NSFW weights.
const NUDENET_LABELS: &[(&str, f32)] = &[
    ("FEMALE_GENITALIA_COVERED", 0.4),
    ("FACE_FEMALE", 0.0),
    ("BUTTOCKS_EXPOSED", 0.75),
    ("FEMALE_BREAST_EXPOSED", 0.75),
    ("FEMALE_GENITALIA_EXPOSED", 1.0),
    ("MALE_BREAST_EXPOSED", 0.05),
    ("ANUS_EXPOSED", 1.0),
    ("FEET_EXPOSED", 0.0),
    ("BELLY_COVERED", 0.0),
    ("FEET_COVERED", 0.0),
    ("ARMPITS_COVERED", 0.0),
    ("ARMPITS_EXPOSED", 0.05),
    ("FACE_MALE", 0.0),
    ("BELLY_EXPOSED", 0.15),
    ("MALE_GENITALIA_EXPOSED", 1.0),
    ("ANUS_COVERED", 0.5),
    ("FEMALE_BREAST_COVERED", 0.3),
    ("BUTTOCKS_COVERED", 0.15),
];
