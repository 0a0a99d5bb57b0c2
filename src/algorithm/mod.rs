//! Inference pipeline and algorithm variants.
//!
//! Every variant follows one three-phase contract (`Algorithm`): validate
//! and stage the frame, invoke the engine, decode and publish. Variants own
//! their engine borrow and per-variant state; everything the control plane
//! may touch concurrently (thresholds, published results, the run trigger)
//! lives behind `Arc` and atomics so neither side ever waits on the other.

pub mod classifier;
pub mod config;
pub mod nms;
pub mod pipeline;
pub mod result;
pub mod yolo;

pub use classifier::ImageClassifier;
pub use config::{
    parse_percent, AlgorithmConfig, RuntimeConfig, NMS_THRESHOLD_DEFAULT, SCORE_THRESHOLD_DEFAULT,
};
pub use nms::{iou, non_max_suppression};
pub use pipeline::{Algorithm, InputScale, RunTrigger};
pub use result::{ClassScore, ClassificationResult, DetectionBox, DetectionResult, ResultSlot};
pub use yolo::YoloDetector;
