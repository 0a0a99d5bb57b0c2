//! Detection results and their publication point.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Result records
// ----------------------------------------------------------------------------

/// One detected object.
///
/// Box geometry is center plus extent in the coordinate space of the frame
/// the caller supplied, score is on the 0..=100 scale, `target` is the
/// model's class index. Records are immutable once produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub score: u8,
    pub target: u16,
}

/// Boxes surviving one full detection pass, ordered by descending score.
/// Rebuilt wholesale every pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub boxes: Vec<DetectionBox>,
}

/// One class surviving the classifier's score filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassScore {
    pub score: u8,
    pub target: u16,
}

/// Classes surviving one classification pass, ordered by descending score.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classes: Vec<ClassScore>,
}

// ----------------------------------------------------------------------------
// Publication slot
// ----------------------------------------------------------------------------

/// Single-slot publication point between the inference context and readers.
///
/// The slot holds an `Arc` to the current collection and publication swaps
/// the whole `Arc`: a reader sees either the complete previous collection
/// or the complete new one, never a partial rebuild. Snapshots stay valid
/// for as long as the reader holds them, regardless of later publishes.
#[derive(Debug)]
pub struct ResultSlot<T> {
    current: Mutex<Arc<T>>,
}

impl<T: Default> ResultSlot<T> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Arc::new(T::default())),
        }
    }
}

impl<T> ResultSlot<T> {
    /// Replace the published collection.
    pub fn publish(&self, value: T) {
        // The lock only guards a pointer swap; a poisoned lock still holds
        // a complete collection, so recover instead of failing.
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(value);
    }

    /// Handle on the currently published collection.
    pub fn snapshot(&self) -> Arc<T> {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&current)
    }
}

impl<T: Default> Default for ResultSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_box(score: u8) -> DetectionBox {
        DetectionBox {
            x: 10,
            y: 20,
            w: 30,
            h: 40,
            score,
            target: 1,
        }
    }

    #[test]
    fn slot_starts_empty() {
        let slot: ResultSlot<DetectionResult> = ResultSlot::new();
        assert!(slot.snapshot().boxes.is_empty());
    }

    #[test]
    fn publish_replaces_wholesale() {
        let slot = ResultSlot::new();
        slot.publish(DetectionResult {
            boxes: vec![sample_box(80), sample_box(60)],
        });
        slot.publish(DetectionResult {
            boxes: vec![sample_box(90)],
        });
        let current = slot.snapshot();
        assert_eq!(current.boxes.len(), 1);
        assert_eq!(current.boxes[0].score, 90);
    }

    #[test]
    fn old_snapshot_survives_later_publish() {
        let slot = ResultSlot::new();
        slot.publish(DetectionResult {
            boxes: vec![sample_box(70)],
        });
        let held = slot.snapshot();
        slot.publish(DetectionResult { boxes: Vec::new() });
        assert_eq!(held.boxes.len(), 1);
        assert_eq!(held.boxes[0].score, 70);
        assert!(slot.snapshot().boxes.is_empty());
    }

    #[test]
    fn detection_result_serializes_to_json() {
        let result = DetectionResult {
            boxes: vec![sample_box(75)],
        };
        let json = serde_json::to_string(&result).expect("serialize");
        assert!(json.contains("\"score\":75"));
        let back: DetectionResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, result);
    }
}
