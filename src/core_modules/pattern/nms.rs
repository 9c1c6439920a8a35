//! Greedy non-max suppression over the combined sub-detector output.

use crate::core_modules::candidate::DetectedPattern;

/// Highest IoU a kept pattern may have with any higher-ranked kept pattern.
pub const NMS_IOU_THRESHOLD: f64 = 0.3;

/// Keeps the strongest pattern of every overlapping cluster. The sort is stable, so
/// equal confidences keep their submission order.
pub fn suppress(mut patterns: Vec<DetectedPattern>) -> Vec<DetectedPattern> {
    patterns.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<DetectedPattern> = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        let overlaps = kept
            .iter()
            .any(|k| k.bounding_box.iou(&pattern.bounding_box) > NMS_IOU_THRESHOLD);
        if !overlaps {
            kept.push(pattern);
        }
    }
    kept
}
