//! Box-detector output decoding
//!
//! Turns the raw `[1, 4 + num_classes, num_candidates]` tensor a YOLO-style
//! detection head produces into labeled boxes in original-image coordinates,
//! then prunes them with class-aware non-maximum suppression.

use tracing::debug;

use crate::engine::preprocess::PreprocessMeta;
use crate::engine::score::LabelTable;
use crate::engine::session::RawOutput;
use crate::error::ScanError;

/// Candidates scoring below this are discarded outright.
pub const SCORE_THRESHOLD: f32 = 0.15;
/// A box overlapping a higher-scoring same-class box above this is suppressed.
pub const IOU_THRESHOLD: f32 = 0.30;

/// Axis-aligned box in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Intersection-over-union of two boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.width * self.height + other.width * other.height - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// One labeled, scored detection.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    class_id: usize,
    score: f32,
    bbox: BoundingBox,
}

/// Decode a raw detection tensor into final labeled detections.
///
/// Each candidate row holds a center-form box and one score per class; the
/// predicted class is the argmax of the score vector. Boxes are converted to
/// corner form, mapped back through the recorded resize/letterbox, clamped
/// to the image, then filtered by score and NMS.
pub fn decode(
    output: &RawOutput,
    meta: &PreprocessMeta,
    labels: &LabelTable,
) -> Result<Vec<Detection>, ScanError> {
    let expected_attrs = 4 + labels.len() as i64;
    let (num_attrs, num_candidates) = match output.shape.as_slice() {
        [1, attrs, candidates] if *attrs == expected_attrs => {
            (*attrs as usize, *candidates as usize)
        }
        _ => {
            return Err(ScanError::ShapeMismatch {
                expected: format!("[1, {expected_attrs}, candidates]"),
                got: output.shape.clone(),
            })
        }
    };
    if output.data.len() != num_attrs * num_candidates {
        return Err(ScanError::ShapeMismatch {
            expected: format!("{} elements", num_attrs * num_candidates),
            got: output.shape.clone(),
        });
    }

    // Attribute-major layout: attribute `a` of candidate `c` sits at
    // `a * num_candidates + c`.
    let at = |a: usize, c: usize| output.data[a * num_candidates + c];

    let unscale_x = (meta.original_width as f32 + meta.pad_x) / meta.resized_width as f32;
    let unscale_y = (meta.original_height as f32 + meta.pad_y) / meta.resized_height as f32;

    let mut candidates = Vec::new();
    for c in 0..num_candidates {
        let mut class_id = 0usize;
        let mut score = f32::MIN;
        for class in 0..num_attrs - 4 {
            let s = at(4 + class, c);
            if s > score {
                score = s;
                class_id = class;
            }
        }
        if score < SCORE_THRESHOLD {
            continue;
        }

        // Center form to corner form, then back to original-image space.
        let mut x = (at(0, c) - at(2, c) / 2.0) * unscale_x;
        let mut y = (at(1, c) - at(3, c) / 2.0) * unscale_y;
        let mut w = at(2, c) * unscale_x;
        let mut h = at(3, c) * unscale_y;

        x = x.clamp(0.0, meta.original_width as f32);
        y = y.clamp(0.0, meta.original_height as f32);
        w = w.min(meta.original_width as f32 - x);
        h = h.min(meta.original_height as f32 - y);

        candidates.push(Candidate {
            class_id,
            score,
            bbox: BoundingBox {
                x,
                y,
                width: w,
                height: h,
            },
        });
    }

    let before = candidates.len();
    let kept = nms(candidates, IOU_THRESHOLD);
    debug!("{} candidate(s) above threshold, {} kept after NMS", before, kept.len());

    Ok(kept
        .into_iter()
        .map(|c| Detection {
            label: labels.name(c.class_id).to_string(),
            score: c.score,
            bbox: c.bbox,
        })
        .collect())
}

/// Greedy class-aware non-maximum suppression.
///
/// Candidates must already be score-filtered. A box is dropped when its IoU
/// with a higher-scoring kept box of the same class exceeds `iou_threshold`.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> LabelTable {
        LabelTable::new(&[("ALPHA", 1.0), ("BETA", 0.5)])
    }

    fn meta_1280x720_letterboxed() -> PreprocessMeta {
        // 1280x720 letterboxed into 640x640 with top-left anchoring:
        // uniform scale 0.5, 560 original-pixel rows of padding.
        PreprocessMeta {
            scale_x: 0.5,
            scale_y: 0.5,
            pad_x: 0.0,
            pad_y: 560.0,
            original_width: 1280,
            original_height: 720,
            resized_width: 640,
            resized_height: 640,
        }
    }

    /// Attribute-major tensor from candidate rows `[cx, cy, w, h, s0, s1]`.
    fn raw_output(rows: &[[f32; 6]]) -> RawOutput {
        let mut data = vec![0.0; 6 * rows.len()];
        for (c, row) in rows.iter().enumerate() {
            for (a, value) in row.iter().enumerate() {
                data[a * rows.len() + c] = *value;
            }
        }
        RawOutput {
            shape: vec![1, 6, rows.len() as i64],
            data,
        }
    }

    fn bbox(x: f32, y: f32, width: f32, height: f32) -> BoundingBox {
        BoundingBox {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn iou_of_known_boxes() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 5.0, 10.0, 10.0);
        // intersection 25, union 175
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn decoded_box_round_trips_to_original_pixels() {
        // Model-space center box (320, 180) 100x50 under 0.5 scale:
        // corner (270, 155) maps to (540, 310), size to 200x100.
        let output = raw_output(&[[320.0, 180.0, 100.0, 50.0, 0.9, 0.1]]);
        let detections = decode(&output, &meta_1280x720_letterboxed(), &labels()).unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "ALPHA");
        assert_eq!(detections[0].score, 0.9);
        assert_eq!(detections[0].bbox, bbox(540.0, 310.0, 200.0, 100.0));
    }

    #[test]
    fn boxes_are_clamped_to_image_bounds() {
        // Center near the right edge: x + w would overshoot 1280.
        let output = raw_output(&[[630.0, 100.0, 60.0, 40.0, 0.9, 0.1]]);
        let detections = decode(&output, &meta_1280x720_letterboxed(), &labels()).unwrap();

        let b = detections[0].bbox;
        assert!(b.x + b.width <= 1280.0);
        assert!(b.y + b.height <= 720.0);
    }

    #[test]
    fn low_scores_are_discarded_outright() {
        let output = raw_output(&[[320.0, 180.0, 100.0, 50.0, 0.10, 0.05]]);
        let detections = decode(&output, &meta_1280x720_letterboxed(), &labels()).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn rejects_wrong_batch_dimension() {
        let mut output = raw_output(&[[320.0, 180.0, 100.0, 50.0, 0.9, 0.1]]);
        output.shape[0] = 2;
        let result = decode(&output, &meta_1280x720_letterboxed(), &labels());
        assert!(matches!(result, Err(ScanError::ShapeMismatch { .. })));
    }

    #[test]
    fn rejects_wrong_attribute_count() {
        let output = RawOutput {
            shape: vec![1, 5, 1],
            data: vec![0.0; 5],
        };
        let result = decode(&output, &meta_1280x720_letterboxed(), &labels());
        assert!(matches!(result, Err(ScanError::ShapeMismatch { .. })));
    }

    #[test]
    fn nms_suppresses_overlapping_same_class() {
        let candidates = vec![
            Candidate {
                class_id: 0,
                score: 0.9,
                bbox: bbox(0.0, 0.0, 10.0, 10.0),
            },
            Candidate {
                class_id: 0,
                score: 0.8,
                bbox: bbox(1.0, 1.0, 10.0, 10.0),
            },
        ];
        let kept = nms(candidates, IOU_THRESHOLD);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn nms_keeps_overlapping_different_classes() {
        let candidates = vec![
            Candidate {
                class_id: 0,
                score: 0.9,
                bbox: bbox(0.0, 0.0, 10.0, 10.0),
            },
            Candidate {
                class_id: 1,
                score: 0.8,
                bbox: bbox(1.0, 1.0, 10.0, 10.0),
            },
        ];
        let kept = nms(candidates, IOU_THRESHOLD);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn nms_is_idempotent() {
        let candidates = vec![
            Candidate {
                class_id: 0,
                score: 0.9,
                bbox: bbox(0.0, 0.0, 10.0, 10.0),
            },
            Candidate {
                class_id: 0,
                score: 0.8,
                bbox: bbox(50.0, 50.0, 10.0, 10.0),
            },
            Candidate {
                class_id: 1,
                score: 0.7,
                bbox: bbox(0.0, 0.0, 10.0, 10.0),
            },
        ];
        let once = nms(candidates, IOU_THRESHOLD);
        let twice = nms(once.clone(), IOU_THRESHOLD);
        assert_eq!(once, twice);
    }
}
