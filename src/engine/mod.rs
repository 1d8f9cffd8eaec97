//! Detection engine
//!
//! The full pipeline for one model: preprocess -> invoke -> decode -> score.
//! `ensemble` combines several detectors into one calibrated probability.

pub mod decode;
pub mod detector;
pub mod ensemble;
pub mod preprocess;
pub mod score;
pub mod session;

pub use detector::{NsfwDetector, NudeNetDetector};
pub use ensemble::Ensemble;
