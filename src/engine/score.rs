//! Label weighting and probability aggregation

use std::collections::HashMap;

use crate::engine::decode::Detection;

/// Ordered label table for one model: class id -> name, name -> NSFW weight.
///
/// The weight in `[0, 1]` expresses how strongly a label's presence indicates
/// explicit content (1.0 for exposed genitalia, 0.0 for faces or feet).
#[derive(Debug, Clone)]
pub struct LabelTable {
    names: Vec<&'static str>,
    weights: HashMap<&'static str, f32>,
}

impl LabelTable {
    pub fn new(entries: &[(&'static str, f32)]) -> Self {
        Self {
            names: entries.iter().map(|(name, _)| *name).collect(),
            weights: entries.iter().copied().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Label name for a class id emitted by the decoder.
    pub fn name(&self, class_id: usize) -> &'static str {
        self.names[class_id]
    }

    /// Weight for a label; unknown labels contribute nothing.
    pub fn weight(&self, label: &str) -> f32 {
        self.weights.get(label).copied().unwrap_or(0.0)
    }
}

/// Collapse a set of labeled detections into one probability.
///
/// Additive model: every detection contributes its confidence scaled by its
/// label weight. Co-occurring detections can push the sum past 1, hence the
/// clamp. No detections means probability 0.
pub fn to_probability(detections: &[Detection], labels: &LabelTable) -> f32 {
    let sum: f32 = detections
        .iter()
        .map(|d| labels.weight(&d.label) * d.score)
        .sum();
    round2(sum).clamp(0.0, 1.0)
}

/// Round to 2 decimal places; applied at every probability boundary.
pub fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}
