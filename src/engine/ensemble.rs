//! Weighted detector ensemble

use image::DynamicImage;
use tracing::debug;

use crate::config::Config;
use crate::engine::detector::{NsfwDetector, NudeNetDetector};
use crate::engine::score::round2;
use crate::error::ScanError;
use crate::utils::image::decode_image;

struct Member {
    detector: Box<dyn NsfwDetector>,
    weight: f32,
}

/// Combines several detectors' probabilities through a symmetric-scale
/// weighted average.
///
/// Each probability is mapped onto `[-100, 100]` (0.5 maps to 0, the
/// uncertain point) before averaging, then mapped back, so a confident
/// detector near the extremes is not diluted linearly by neutral ones.
/// With a single detector this reduces to that detector's own probability.
pub struct Ensemble {
    members: Vec<Member>,
}

impl Ensemble {
    /// Build from `(detector, raw weight)` pairs.
    ///
    /// Weights are normalized to sum to 1 here, once; they are immutable
    /// afterwards. The ensemble takes ownership of the detectors and their
    /// sessions, which are released when it drops.
    pub fn new(detectors: Vec<(Box<dyn NsfwDetector>, f32)>) -> Result<Self, ScanError> {
        let total: f32 = detectors.iter().map(|(_, weight)| weight).sum();
        if detectors.is_empty() || total <= 0.0 {
            return Err(ScanError::InvalidWeights);
        }
        let members = detectors
            .into_iter()
            .map(|(detector, weight)| Member {
                detector,
                weight: weight / total,
            })
            .collect();
        Ok(Self { members })
    }

    /// Build the standard detector set from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ScanError> {
        let nudenet = NudeNetDetector::load(&config.models.nudenet)?;
        Self::new(vec![(Box::new(nudenet), config.ensemble.nudenet_weight)])
    }

    /// Ensemble NSFW probability for a decoded image, in `[0, 1]`, rounded
    /// to 2 decimal places. Members run sequentially; any member failure is
    /// fatal for the call.
    pub fn probability(&mut self, image: &DynamicImage) -> Result<f32, ScanError> {
        let mut weighted_average = 0.0f32;
        for member in &mut self.members {
            let p = member.detector.probability(image)?;
            let symmetric = (p * 200.0 - 100.0).clamp(-100.0, 100.0);
            debug!(
                detector = member.detector.name(),
                probability = p,
                "member score"
            );
            weighted_average += member.weight * symmetric;
        }
        Ok(round2(((weighted_average + 100.0) / 200.0).clamp(0.0, 1.0)))
    }

    /// Convenience entry point for encoded image bytes.
    pub fn probability_from_bytes(&mut self, data: &[u8]) -> Result<f32, ScanError> {
        let image = decode_image(data)?;
        self.probability(&image)
    }
}
