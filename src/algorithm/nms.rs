//! Overlap suppression for decoded detection boxes.

use crate::algorithm::result::DetectionBox;

fn area(b: &DetectionBox) -> f32 {
    b.w as f32 * b.h as f32
}

fn intersection(a: &DetectionBox, b: &DetectionBox) -> f32 {
    let a_half_w = a.w as f32 / 2.0;
    let a_half_h = a.h as f32 / 2.0;
    let b_half_w = b.w as f32 / 2.0;
    let b_half_h = b.h as f32 / 2.0;

    let left = (a.x as f32 - a_half_w).max(b.x as f32 - b_half_w);
    let top = (a.y as f32 - a_half_h).max(b.y as f32 - b_half_h);
    let right = (a.x as f32 + a_half_w).min(b.x as f32 + b_half_w);
    let bottom = (a.y as f32 + a_half_h).min(b.y as f32 + b_half_h);

    (right - left).max(0.0) * (bottom - top).max(0.0)
}

/// Intersection over union of two center+extent boxes. A degenerate union
/// (both boxes zero-area) yields 0 rather than NaN.
pub fn iou(a: &DetectionBox, b: &DetectionBox) -> f32 {
    let inter = intersection(a, b);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Per-class overlap suppression, in place.
///
/// Boxes are ordered by descending score first (the sort is stable, so
/// equal scores keep their decode order); a box then survives only when its
/// IoU with every already-kept box of the same class stays at or below
/// `nms_threshold / 100`. A threshold of 100 keeps everything. Survivors
/// stay in descending score order.
pub fn non_max_suppression(boxes: &mut Vec<DetectionBox>, nms_threshold: u8) {
    boxes.sort_by(|a, b| b.score.cmp(&a.score));
    let limit = nms_threshold.min(100) as f32 / 100.0;

    let mut kept = 0;
    for index in 0..boxes.len() {
        let candidate = boxes[index];
        let survives = boxes[..kept]
            .iter()
            .filter(|winner| winner.target == candidate.target)
            .all(|winner| iou(winner, &candidate) <= limit);
        if survives {
            boxes.swap(kept, index);
            kept += 1;
        }
    }
    boxes.truncate(kept);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
