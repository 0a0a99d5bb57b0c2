//! End-to-end detector runs against the stub engine: decode, filter,
//! suppression, rescale and publication, plus the failure paths.

use std::sync::Arc;

use vision_kernel::engine::DetectionRecord;
use vision_kernel::{
    Algorithm, AlgorithmConfig, ImageView, PixelFormat, PipelineError, StubEngine, YoloDetector,
};

const MODEL_SIZE: usize = 96;
const FRAME_W: u32 = 640;
const FRAME_H: u32 = 480;

fn frame() -> Vec<u8> {
    vec![128u8; PixelFormat::Grayscale.frame_bytes(FRAME_W, FRAME_H)]
}

fn record(x: f32, y: f32, w: f32, h: f32, score: f32, class: usize) -> DetectionRecord {
    DetectionRecord {
        x,
        y,
        w,
        h,
        score,
        class,
    }
}

fn run_once<E: vision_kernel::Engine>(detector: &mut YoloDetector<'_, E>, data: &[u8]) {
    let image = ImageView::new(data, FRAME_W, FRAME_H, PixelFormat::Grayscale).expect("image");
    detector.run(&image).expect("run");
}

#[test]
fn full_pass_filters_suppresses_and_rescales() {
    let mut engine = StubEngine::detection(MODEL_SIZE, 2);
    let tensor = engine.encode_detections(&[
        // Two near-identical class-0 boxes; only the stronger survives NMS.
        record(0.5, 0.5, 0.5, 0.5, 0.9, 0),
        record(0.5, 0.5, 0.5, 0.45, 0.8, 0),
        // Below the default score threshold of 50, dropped before NMS.
        record(0.2, 0.2, 0.1, 0.1, 0.3, 1),
    ]);
    engine.queue_output(tensor);

    let mut detector =
        YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");
    let data = frame();
    run_once(&mut detector, &data);

    let result = detector.last_result();
    assert_eq!(result.boxes.len(), 1);
    let survivor = result.boxes[0];
    assert!(survivor.score >= 50);
    assert_eq!(survivor.target, 0);
    // Model-space center 0.5 lands on the frame center after rescale.
    let (cx, cy) = (survivor.x as f32, survivor.y as f32);
    assert!((cx - FRAME_W as f32 / 2.0).abs() <= 4.0, "center x {cx}");
    assert!((cy - FRAME_H as f32 / 2.0).abs() <= 4.0, "center y {cy}");
}

#[test]
fn full_extent_box_maps_to_full_frame() {
    for (frame_w, frame_h) in [(640u32, 480u32), (320, 240), (1280, 720)] {
        let mut engine = StubEngine::detection(MODEL_SIZE, 2);
        let tensor = engine.encode_detections(&[record(0.5, 0.5, 1.0, 1.0, 0.95, 0)]);
        engine.queue_output(tensor);

        let mut detector =
            YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");
        let data = vec![128u8; PixelFormat::Grayscale.frame_bytes(frame_w, frame_h)];
        let image = ImageView::new(&data, frame_w, frame_h, PixelFormat::Grayscale).expect("image");
        detector.run(&image).expect("run");

        let b = detector.last_result().boxes[0];
        assert_eq!(b.w, frame_w, "width at {frame_w}x{frame_h}");
        assert_eq!(b.h, frame_h, "height at {frame_w}x{frame_h}");
    }
}

#[test]
fn threshold_update_applies_to_the_next_pass() {
    let mut engine = StubEngine::detection(MODEL_SIZE, 2);
    let tensor = engine.encode_detections(&[record(0.5, 0.5, 0.3, 0.3, 0.6, 0)]);
    engine.queue_output(tensor.clone());
    engine.queue_output(tensor);

    let mut detector =
        YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");
    let config = detector.runtime_config();
    let data = frame();

    // First pass at threshold 50: the ~59-score box survives.
    run_once(&mut detector, &data);
    assert_eq!(detector.last_result().boxes.len(), 1);

    // Control plane raises the threshold; the second pass observes it fully.
    config.set_score_threshold(90);
    run_once(&mut detector, &data);
    assert!(detector.last_result().boxes.is_empty());
}

#[test]
fn threshold_zero_accepts_everything_threshold_100_disables_suppression() {
    let mut engine = StubEngine::detection(MODEL_SIZE, 2);
    let tensor = engine.encode_detections(&[
        record(0.5, 0.5, 0.5, 0.5, 0.9, 0),
        record(0.5, 0.5, 0.5, 0.45, 0.1, 0),
    ]);
    engine.queue_output(tensor);

    // score 0 keeps the weak box, nms 100 keeps the overlap.
    let mut detector =
        YoloDetector::new(&mut engine, AlgorithmConfig::new(0, 100)).expect("detector");
    let data = frame();
    run_once(&mut detector, &data);

    let result = detector.last_result();
    assert_eq!(result.boxes.len(), 2);
    assert!(result.boxes[0].score >= result.boxes[1].score);
}

#[test]
fn empty_output_is_a_successful_empty_result() {
    let mut engine = StubEngine::detection(MODEL_SIZE, 2);
    let tensor = engine.encode_detections(&[]);
    engine.queue_output(tensor);

    let mut detector =
        YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");
    let data = frame();
    let image = ImageView::new(&data, FRAME_W, FRAME_H, PixelFormat::Grayscale).expect("image");
    detector.run(&image).expect("empty output must not be an error");
    assert!(detector.last_result().boxes.is_empty());
}

#[test]
fn failed_invocation_leaves_previous_result_published() {
    let mut engine = StubEngine::detection(MODEL_SIZE, 2);
    let tensor = engine.encode_detections(&[record(0.5, 0.5, 0.4, 0.4, 0.85, 1)]);
    engine.queue_output(tensor);

    let mut detector =
        YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");
    let data = frame();
    run_once(&mut detector, &data);
    let published = detector.last_result();
    assert_eq!(published.boxes.len(), 1);

    detector.engine_mut().fail_next_invoke("brownout");
    let image = ImageView::new(&data, FRAME_W, FRAME_H, PixelFormat::Grayscale).expect("image");
    let err = detector.run(&image).unwrap_err();
    assert!(matches!(err, PipelineError::Engine(_)));
    assert_eq!(detector.last_result(), published);
}

#[test]
fn snapshot_held_across_a_publish_stays_complete() {
    let mut engine = StubEngine::detection(MODEL_SIZE, 2);
    let first = engine.encode_detections(&[record(0.5, 0.5, 0.4, 0.4, 0.9, 0)]);
    let second = engine.encode_detections(&[]);
    engine.queue_output(first);
    engine.queue_output(second);

    let mut detector =
        YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");
    let data = frame();
    run_once(&mut detector, &data);

    let held: Arc<_> = detector.last_result();
    run_once(&mut detector, &data);

    // The old snapshot is untouched by the wholesale replacement.
    assert_eq!(held.boxes.len(), 1);
    assert!(detector.last_result().boxes.is_empty());
}

#[test]
fn mismatched_image_buffer_is_rejected_before_the_engine_runs() {
    let mut engine = StubEngine::detection(MODEL_SIZE, 2);
    let detector = YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");

    let short = vec![0u8; 100];
    let err = ImageView::new(&short, FRAME_W, FRAME_H, PixelFormat::Grayscale).unwrap_err();
    assert!(matches!(err, PipelineError::ImageSize { .. }));
    // Nothing ran, nothing published.
    assert!(detector.last_result().boxes.is_empty());
}
