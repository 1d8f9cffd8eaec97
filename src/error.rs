//! Error types for the scanning pipeline

use std::path::PathBuf;

/// Errors produced by the detection pipeline and its collaborators.
///
/// Single-image mode treats every variant as fatal; video mode isolates
/// failures to the offending frame (see [`crate::video::FrameErrorPolicy`]).
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("unsupported input format: .{0}")]
    UnsupportedFormat(String),

    #[error("no model chunks found at {}.0", .0.display())]
    MissingChunks(PathBuf),

    #[error("failed to load model into the inference backend")]
    ModelLoad(#[source] ort::Error),

    #[error("inference failed")]
    Inference(#[from] ort::Error),

    #[error("output tensor {0:?} not present in inference results")]
    MissingOutput(String),

    #[error("output tensor has shape {got:?}, expected {expected}")]
    ShapeMismatch { expected: String, got: Vec<i64> },

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("image decode failed")]
    Decode(#[from] image::ImageError),

    #[error("ensemble needs at least one detector with a positive weight")]
    InvalidWeights,

    #[error("destination directory {} is not empty", .0.display())]
    DestinationNotEmpty(PathBuf),

    #[error("frame stream error: {0}")]
    FrameStream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
