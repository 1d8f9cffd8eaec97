//! NSFW probability scoring for still images and video frames.
//!
//! Runs one or more ONNX object-detection models over an image and collapses
//! their detections into a single calibrated probability in `[0, 1]`.

pub mod config;
pub mod engine;
pub mod error;
pub mod scan;
pub mod utils;
pub mod video;

pub use config::Config;
pub use engine::ensemble::Ensemble;
pub use error::ScanError;
