//! YOLO-style object detector.
//!
//! Decodes fixed-layout records `(x, y, w, h, score, class scores...)` from
//! a quantized int8 output tensor, drops records below the score threshold,
//! runs per-class overlap suppression in model space and rescales the
//! survivors into the caller's frame coordinates. Results are published
//! wholesale through a shared slot; thresholds are snapshotted once per
//! pass, so a retune lands on the next pass, never mid-pass.

use std::sync::Arc;

use crate::algorithm::config::{parse_percent, AlgorithmConfig, RuntimeConfig};
use crate::algorithm::nms::non_max_suppression;
use crate::algorithm::pipeline::{fill_input, Algorithm, InputScale, RunTrigger};
use crate::algorithm::result::{DetectionBox, DetectionResult, ResultSlot};
use crate::engine::{Engine, QuantParams};
use crate::error::{CommandError, ConstructionError, EngineError, PipelineError};
use crate::image::ImageView;
use crate::repl::{Executor, Response};

// Cell order of one output record.
const INDEX_X: usize = 0;
const INDEX_Y: usize = 1;
const INDEX_W: usize = 2;
const INDEX_H: usize = 3;
const INDEX_S: usize = 4;
const INDEX_T: usize = 5;

/// Outputs quantized finer than this carry normalized values: coordinates
/// in 0..=1 of the model extent and scores in 0..=1, both mapped up during
/// decode. Coarser outputs already carry pixels and percent.
const NORMALIZED_SCALE_LIMIT: f32 = 0.1;

const MIN_INPUT_SIZE: usize = 32;
const INPUT_STRIDE: usize = 32;
/// 4 box cells + 1 score cell + at most 80 class cells.
const MAX_RECORD_ELEMENTS: usize = 85;

// ----------------------------------------------------------------------------
// Model layout
// ----------------------------------------------------------------------------

/// Tensor geometry extracted from a compatible engine at construction.
#[derive(Clone, Debug)]
struct ModelLayout {
    width: usize,
    height: usize,
    channels: usize,
    records: usize,
    elements: usize,
    quant: QuantParams,
}

impl ModelLayout {
    fn probe<E: Engine>(engine: &E) -> Result<Self, ConstructionError> {
        if !engine.is_ready() {
            return Err(ConstructionError::EngineNotReady);
        }

        let input = engine.input_shape(0).ok_or(ConstructionError::MissingInput)?;
        let dims = &input.dims;
        // [batch, height, width, channels]: single batch, square,
        // stride-aligned, gray or RGB.
        let input_ok = dims.len() == 4
            && dims[0] == 1
            && dims[1] == dims[2]
            && dims[1] >= MIN_INPUT_SIZE
            && dims[1] % INPUT_STRIDE == 0
            && (dims[3] == 1 || dims[3] == 3);
        if !input_ok {
            return Err(ConstructionError::UnsupportedInputShape { dims: dims.clone() });
        }
        let side = dims[1];
        let channels = dims[3];

        // One record per anchor cell at strides 32, 16 and 8.
        let anchors = {
            let s = side / 32;
            let m = side / 16;
            let l = side / 8;
            (s * s + m * m + l * l) * channels
        };

        let output = engine
            .output_shape(0)
            .ok_or(ConstructionError::MissingOutput)?;
        let odims = &output.dims;
        let output_ok = odims.len() == 3
            && odims[0] == 1
            && odims[1] == anchors
            && odims[2] > INDEX_T
            && odims[2] <= MAX_RECORD_ELEMENTS;
        if !output_ok {
            return Err(ConstructionError::UnsupportedOutputShape { dims: odims.clone() });
        }

        let quant = engine
            .output_quant(0)
            .ok_or(ConstructionError::MissingOutput)?;
        if quant.scale <= 0.0 || !quant.scale.is_finite() {
            return Err(ConstructionError::UnsupportedQuantization { scale: quant.scale });
        }

        Ok(Self {
            width: side,
            height: side,
            channels,
            records: odims[1],
            elements: odims[2],
            quant,
        })
    }

    fn normalized(&self) -> bool {
        self.quant.scale < NORMALIZED_SCALE_LIMIT
    }
}

// ----------------------------------------------------------------------------
// Detector
// ----------------------------------------------------------------------------

/// Detection pipeline over a borrowed engine.
///
/// The engine is borrowed for the detector's whole lifetime, so an engine
/// cannot be dropped or handed to another algorithm while a detector is
/// attached. Construction probes the loaded model and refuses anything that
/// does not look like a detection model.
pub struct YoloDetector<'e, E: Engine> {
    engine: &'e mut E,
    layout: ModelLayout,
    scale: InputScale,
    config: Arc<RuntimeConfig>,
    results: Arc<ResultSlot<DetectionResult>>,
}

impl<'e, E: Engine> YoloDetector<'e, E> {
    pub fn new(engine: &'e mut E, config: AlgorithmConfig) -> Result<Self, ConstructionError> {
        let layout = ModelLayout::probe(engine)?;
        log::info!(
            "yolo detector attached: input {}x{}x{}, {} records of {} cells{}",
            layout.width,
            layout.height,
            layout.channels,
            layout.records,
            layout.elements,
            if layout.normalized() {
                ", normalized output"
            } else {
                ""
            }
        );
        Ok(Self {
            engine,
            layout,
            scale: InputScale::identity(),
            config: Arc::new(RuntimeConfig::new(config)),
            results: Arc::new(ResultSlot::new()),
        })
    }

    /// True when the engine's loaded model has detection-shaped tensors.
    pub fn is_model_valid(engine: &E) -> bool {
        ModelLayout::probe(engine).is_ok()
    }

    /// Shared threshold storage, for control-plane wiring.
    pub fn runtime_config(&self) -> Arc<RuntimeConfig> {
        Arc::clone(&self.config)
    }

    /// Shared publication slot, for control-plane wiring.
    pub fn results(&self) -> Arc<ResultSlot<DetectionResult>> {
        Arc::clone(&self.results)
    }

    /// Latest published result.
    pub fn last_result(&self) -> Arc<DetectionResult> {
        self.results.snapshot()
    }

    /// Direct engine access for maintenance the detector does not mediate.
    pub fn engine_mut(&mut self) -> &mut E {
        self.engine
    }

    pub fn score_threshold(&self) -> u8 {
        self.config.score_threshold()
    }

    pub fn set_score_threshold(&self, threshold: u8) -> u8 {
        self.config.set_score_threshold(threshold)
    }

    pub fn nms_threshold(&self) -> u8 {
        self.config.nms_threshold()
    }

    pub fn set_nms_threshold(&self, threshold: u8) -> u8 {
        self.config.set_nms_threshold(threshold)
    }

    /// Register the detector's operator commands.
    ///
    /// Handlers capture only shared state (`RuntimeConfig`, the result
    /// slot, the trigger), so the control plane can run them while the
    /// inference context owns the detector itself.
    pub fn register_commands(
        &self,
        executor: &mut Executor,
        trigger: Arc<RunTrigger>,
    ) -> Result<(), CommandError> {
        let config = Arc::clone(&self.config);
        executor.register(
            "score",
            "get or set the score threshold: score [0-100]",
            move |cmd| match cmd.args.first() {
                None => Response::ok(format!("score {}", config.score_threshold())),
                Some(raw) => match parse_percent(raw) {
                    Some(value) => {
                        Response::ok(format!("score {}", config.set_score_threshold(value)))
                    }
                    None => Response::invalid_args(format!("'{raw}' is not a percent value")),
                },
            },
        )?;

        let config = Arc::clone(&self.config);
        executor.register(
            "nms",
            "get or set the overlap threshold: nms [0-100]",
            move |cmd| match cmd.args.first() {
                None => Response::ok(format!("nms {}", config.nms_threshold())),
                Some(raw) => match parse_percent(raw) {
                    Some(value) => {
                        Response::ok(format!("nms {}", config.set_nms_threshold(value)))
                    }
                    None => Response::invalid_args(format!("'{raw}' is not a percent value")),
                },
            },
        )?;

        let config = Arc::clone(&self.config);
        executor.register(
            "config",
            "get or set both thresholds: config [score nms]",
            move |cmd| match cmd.args.len() {
                0 => {
                    let current = config.algorithm_config();
                    Response::ok(format!(
                        "score {} nms {}",
                        current.score_threshold, current.nms_threshold
                    ))
                }
                2 => match (parse_percent(&cmd.args[0]), parse_percent(&cmd.args[1])) {
                    (Some(score), Some(nms)) => {
                        let applied = config.set_algorithm_config(AlgorithmConfig {
                            score_threshold: score,
                            nms_threshold: nms,
                        });
                        Response::ok(format!(
                            "score {} nms {}",
                            applied.score_threshold, applied.nms_threshold
                        ))
                    }
                    _ => Response::invalid_args("config takes two percent values"),
                },
                _ => Response::invalid_args("usage: config [score nms]"),
            },
        )?;

        executor.register("invoke", "request one detection pass", move |_cmd| {
            trigger.request();
            Response::ok("invoke requested")
        })?;

        let results = Arc::clone(&self.results);
        executor.register(
            "result",
            "latest detection result as JSON",
            move |_cmd| match serde_json::to_string(results.snapshot().as_ref()) {
                Ok(payload) => Response::ok(payload),
                Err(err) => Response::failed(format!("result serialization: {err}")),
            },
        )?;

        Ok(())
    }

    /// Decode the output tensor into model-space boxes, applying the score
    /// filter with a threshold snapshotted once for the whole pass.
    fn decode_output(&self) -> Result<Vec<DetectionBox>, PipelineError> {
        let output = self
            .engine
            .output(0)
            .ok_or(PipelineError::Engine(EngineError::MissingTensor(0)))?;
        let needed = self.layout.records * self.layout.elements;
        if output.len() < needed {
            return Err(PipelineError::TruncatedOutput {
                len: output.len(),
                records: self.layout.records,
                elements: self.layout.elements,
            });
        }

        let quant = self.layout.quant;
        let normalized = self.layout.normalized();
        let score_threshold = self.config.score_threshold();
        let model_w = self.layout.width as f32;
        let model_h = self.layout.height as f32;

        let mut boxes = Vec::new();
        for record in output[..needed].chunks_exact(self.layout.elements) {
            let mut score = quant.dequantize(record[INDEX_S]);
            if normalized {
                score *= 100.0;
            }
            if score < score_threshold as f32 {
                continue;
            }
            let score = score.clamp(0.0, 100.0) as u8;

            // First maximum among the raw class cells wins ties.
            let mut target = 0usize;
            let mut best = i8::MIN;
            for (class, &cell) in record[INDEX_T..].iter().enumerate() {
                if cell > best {
                    best = cell;
                    target = class;
                }
            }

            let x = decode_axis(quant.dequantize(record[INDEX_X]), normalized, model_w);
            let y = decode_axis(quant.dequantize(record[INDEX_Y]), normalized, model_h);
            let w = decode_axis(quant.dequantize(record[INDEX_W]), normalized, model_w);
            let h = decode_axis(quant.dequantize(record[INDEX_H]), normalized, model_h);

            boxes.push(DetectionBox {
                x: x as u32,
                y: y as u32,
                w: w as u32,
                h: h as u32,
                score,
                target: target as u16,
            });
        }
        Ok(boxes)
    }
}

fn decode_axis(value: f32, normalized: bool, extent: f32) -> f32 {
    let value = if normalized { value * extent } else { value };
    value.clamp(0.0, extent)
}

impl<E: Engine> Algorithm for YoloDetector<'_, E> {
    fn preprocess(&mut self, image: &ImageView<'_>) -> Result<(), PipelineError> {
        let input = self
            .engine
            .input_mut(0)
            .ok_or(PipelineError::Engine(EngineError::MissingTensor(0)))?;
        fill_input(
            input,
            image,
            self.layout.width,
            self.layout.height,
            self.layout.channels,
        );
        self.scale = InputScale::between(
            image.width(),
            image.height(),
            self.layout.width,
            self.layout.height,
        );
        Ok(())
    }

    fn invoke(&mut self) -> Result<(), PipelineError> {
        self.engine.invoke()?;
        Ok(())
    }

    fn postprocess(&mut self) -> Result<(), PipelineError> {
        let mut boxes = self.decode_output()?;
        non_max_suppression(&mut boxes, self.config.nms_threshold());
        for b in &mut boxes {
            b.x = (b.x as f32 * self.scale.w).round() as u32;
            b.y = (b.y as f32 * self.scale.h).round() as u32;
            b.w = (b.w as f32 * self.scale.w).round() as u32;
            b.h = (b.h as f32 * self.scale.h).round() as u32;
        }
        log::debug!("detection pass kept {} boxes", boxes.len());
        self.results.publish(DetectionResult { boxes });
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{StubEngine, TensorShape};
    use crate::image::PixelFormat;

    fn gray_image(side: u32) -> Vec<u8> {
        vec![128u8; (side * side) as usize]
    }

    fn probe_err(engine: &StubEngine) -> ConstructionError {
        match ModelLayout::probe(engine) {
            Err(err) => err,
            Ok(_) => panic!("probe accepted an incompatible engine"),
        }
    }

    #[test]
    fn probe_accepts_detection_stub() {
        let engine = StubEngine::detection(96, 2);
        assert!(YoloDetector::is_model_valid(&engine));
    }

    #[test]
    fn probe_rejects_not_ready_engine() {
        let mut engine = StubEngine::detection(96, 2);
        engine.set_ready(false);
        assert!(matches!(
            probe_err(&engine),
            ConstructionError::EngineNotReady
        ));
    }

    #[test]
    fn probe_rejects_non_square_input() {
        let engine = StubEngine::custom(
            TensorShape::new(&[1, 96, 64, 3]),
            TensorShape::new(&[1, 567, 7]),
            QuantParams {
                scale: 1.0 / 127.0,
                zero_point: 0,
            },
        );
        assert!(matches!(
            probe_err(&engine),
            ConstructionError::UnsupportedInputShape { .. }
        ));
    }

    #[test]
    fn probe_rejects_misaligned_input() {
        let engine = StubEngine::custom(
            TensorShape::new(&[1, 100, 100, 3]),
            TensorShape::new(&[1, 567, 7]),
            QuantParams {
                scale: 1.0 / 127.0,
                zero_point: 0,
            },
        );
        assert!(matches!(
            probe_err(&engine),
            ConstructionError::UnsupportedInputShape { .. }
        ));
    }

    #[test]
    fn probe_rejects_unexpected_channel_count() {
        let engine = StubEngine::custom(
            TensorShape::new(&[1, 96, 96, 2]),
            TensorShape::new(&[1, 378, 7]),
            QuantParams {
                scale: 1.0 / 127.0,
                zero_point: 0,
            },
        );
        assert!(matches!(
            probe_err(&engine),
            ConstructionError::UnsupportedInputShape { .. }
        ));
    }

    #[test]
    fn probe_rejects_record_count_mismatch() {
        let engine = StubEngine::custom(
            TensorShape::new(&[1, 96, 96, 3]),
            TensorShape::new(&[1, 500, 7]),
            QuantParams {
                scale: 1.0 / 127.0,
                zero_point: 0,
            },
        );
        assert!(matches!(
            probe_err(&engine),
            ConstructionError::UnsupportedOutputShape { .. }
        ));
    }

    #[test]
    fn probe_rejects_oversized_records() {
        let engine = StubEngine::custom(
            TensorShape::new(&[1, 96, 96, 3]),
            TensorShape::new(&[1, 567, 86]),
            QuantParams {
                scale: 1.0 / 127.0,
                zero_point: 0,
            },
        );
        assert!(matches!(
            probe_err(&engine),
            ConstructionError::UnsupportedOutputShape { .. }
        ));
    }

    #[test]
    fn probe_rejects_degenerate_quantization() {
        let engine = StubEngine::custom(
            TensorShape::new(&[1, 96, 96, 3]),
            TensorShape::new(&[1, 567, 7]),
            QuantParams {
                scale: 0.0,
                zero_point: 0,
            },
        );
        assert!(matches!(
            probe_err(&engine),
            ConstructionError::UnsupportedQuantization { .. }
        ));
    }

    #[test]
    fn probe_rejects_classification_shapes() {
        let engine = StubEngine::classification(96, 4);
        assert!(!YoloDetector::is_model_valid(&engine));
    }

    #[test]
    fn raw_outputs_decode_without_mapping() {
        // Scale 1.0 is above the normalized watermark, so cells already
        // carry model pixels and percent.
        let mut engine = StubEngine::custom(
            TensorShape::new(&[1, 96, 96, 3]),
            TensorShape::new(&[1, 567, 7]),
            QuantParams {
                scale: 1.0,
                zero_point: 0,
            },
        );
        let mut tensor = vec![0i8; 567 * 7];
        tensor[..7].copy_from_slice(&[48, 40, 20, 24, 75, 0, 1]);
        engine.queue_output(tensor);

        let mut detector =
            YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");
        let data = gray_image(96);
        let image = ImageView::new(&data, 96, 96, PixelFormat::Grayscale).expect("image");
        detector.run(&image).expect("run");

        let result = detector.last_result();
        assert_eq!(result.boxes.len(), 1);
        let b = result.boxes[0];
        assert_eq!((b.x, b.y, b.w, b.h), (48, 40, 20, 24));
        assert_eq!(b.score, 75);
        assert_eq!(b.target, 1);
    }

    #[test]
    fn raw_coordinates_clamp_to_model_extent() {
        let mut engine = StubEngine::custom(
            TensorShape::new(&[1, 96, 96, 3]),
            TensorShape::new(&[1, 567, 7]),
            QuantParams {
                scale: 1.0,
                zero_point: 0,
            },
        );
        // x beyond the model edge, negative y after dequantization.
        let mut tensor = vec![0i8; 567 * 7];
        tensor[..7].copy_from_slice(&[120, -10, 10, 10, 90, 1, 0]);
        engine.queue_output(tensor);

        let mut detector =
            YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");
        let data = gray_image(96);
        let image = ImageView::new(&data, 96, 96, PixelFormat::Grayscale).expect("image");
        detector.run(&image).expect("run");

        let b = detector.last_result().boxes[0];
        assert_eq!(b.x, 96);
        assert_eq!(b.y, 0);
        assert_eq!(b.target, 0);
    }

    #[test]
    fn truncated_output_is_reported() {
        let mut engine = StubEngine::custom(
            TensorShape::new(&[1, 96, 96, 3]),
            TensorShape::new(&[1, 567, 7]),
            QuantParams {
                scale: 1.0 / 127.0,
                zero_point: 0,
            },
        );
        let mut detector =
            YoloDetector::new(&mut engine, AlgorithmConfig::default()).expect("detector");
        // Shrink the layout's expectation past what the stub serves.
        detector.layout.records = 1000;
        let err = detector.postprocess().unwrap_err();
        assert!(matches!(err, PipelineError::TruncatedOutput { .. }));
    }
}
