//! In-memory engine for tests and the demo daemon.
//!
//! `StubEngine` serves fixed-geometry int8 tensors the way a real NPU
//! runtime would, without any model behind them. Outputs come from two
//! places:
//! - scripted tensors queued by tests via `queue_output`
//! - procedural drifting detections synthesized per invocation (`visiond`)
//!
//! The stub is NOT an engine implementation in the product sense; it exists
//! so the pipeline and control plane can be exercised end to end on a
//! development host.

use std::collections::VecDeque;

use crate::engine::{Engine, QuantParams, TensorShape};
use crate::error::EngineError;

/// Quantization used by stub models: int8 covering roughly [-1.0, 1.0].
/// The scale sits below the normalized-output watermark (0.1), so detectors
/// treat stub outputs as normalized coordinates and scores.
const STUB_QUANT: QuantParams = QuantParams {
    scale: 1.0 / 127.0,
    zero_point: 0,
};

/// One synthetic detection in normalized model space.
///
/// `x`/`y` are the box center, `w`/`h` its extent, all in 0..=1. `score` is
/// the 0..=1 objectness; `class` picks which class cell carries it.
#[derive(Clone, Copy, Debug)]
pub struct DetectionRecord {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub score: f32,
    pub class: usize,
}

enum StubOutput {
    /// Output tensor stays whatever it last was.
    Quiet,
    /// Pop one queued tensor per invocation, then go quiet.
    Scripted,
    /// Synthesize drifting detections from the invocation counter.
    Procedural,
}

pub struct StubEngine {
    input_shape: TensorShape,
    output_shape: TensorShape,
    quant: QuantParams,
    input: Vec<i8>,
    output: Vec<i8>,
    ready: bool,
    mode: StubOutput,
    scripted: VecDeque<Vec<i8>>,
    fail_next: Option<String>,
    invocations: u64,
    classes: usize,
}

impl StubEngine {
    /// Detection-model stub: square RGB input of `model_size` pixels and a
    /// YOLO-style output of `(x, y, w, h, score, class...)` records, one per
    /// anchor cell at strides 32/16/8.
    pub fn detection(model_size: usize, classes: usize) -> Self {
        let channels = 3;
        let records = detection_records(model_size, channels);
        let elements = 5 + classes.max(1);
        let input_shape = TensorShape::new(&[1, model_size, model_size, channels]);
        let output_shape = TensorShape::new(&[1, records, elements]);
        let input_len = input_shape.elements();
        let output_len = output_shape.elements();
        Self {
            input_shape,
            output_shape,
            quant: STUB_QUANT,
            input: vec![0; input_len],
            output: vec![0; output_len],
            ready: true,
            mode: StubOutput::Quiet,
            scripted: VecDeque::new(),
            fail_next: None,
            invocations: 0,
            classes: classes.max(1),
        }
    }

    /// Classification-model stub: square RGB input, rank-2 output of one
    /// score cell per class.
    pub fn classification(model_size: usize, classes: usize) -> Self {
        let classes = classes.max(1);
        let input_shape = TensorShape::new(&[1, model_size, model_size, 3]);
        let output_shape = TensorShape::new(&[1, classes]);
        let input_len = input_shape.elements();
        Self {
            input_shape,
            output_shape,
            quant: STUB_QUANT,
            input: vec![0; input_len],
            output: vec![0; classes],
            ready: true,
            mode: StubOutput::Quiet,
            scripted: VecDeque::new(),
            fail_next: None,
            invocations: 0,
            classes,
        }
    }

    /// Stub with explicit tensor geometry and quantization, for
    /// compatibility-rejection tests. No shape checks are applied here;
    /// that is the point.
    pub fn custom(input_shape: TensorShape, output_shape: TensorShape, quant: QuantParams) -> Self {
        let input_len = input_shape.elements();
        let output_len = output_shape.elements();
        let classes = output_shape
            .dims
            .last()
            .map_or(1, |&elements| elements.saturating_sub(5).max(1));
        Self {
            input_shape,
            output_shape,
            quant,
            input: vec![0; input_len],
            output: vec![0; output_len],
            ready: true,
            mode: StubOutput::Quiet,
            scripted: VecDeque::new(),
            fail_next: None,
            invocations: 0,
            classes,
        }
    }

    /// Switch to procedural output: every invocation synthesizes one or two
    /// detections that drift around the frame.
    pub fn procedural(mut self) -> Self {
        self.mode = StubOutput::Procedural;
        self
    }

    /// Queue one full output tensor; invocations consume the queue in order.
    /// Short tensors are zero-padded, long ones truncated.
    pub fn queue_output(&mut self, tensor: Vec<i8>) {
        self.mode = StubOutput::Scripted;
        self.scripted.push_back(tensor);
    }

    /// Make the next invocation fail without touching the output tensor.
    pub fn fail_next_invoke(&mut self, reason: &str) {
        self.fail_next = Some(reason.to_string());
    }

    /// Flip readiness, for construction-rejection tests.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Successful invocations so far.
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Render detection records into one full output tensor. Cells not
    /// covered by `records` stay at the zero point.
    pub fn encode_detections(&self, records: &[DetectionRecord]) -> Vec<i8> {
        let elements = *self.output_shape.dims.last().unwrap_or(&0);
        let mut tensor = vec![0i8; self.output_shape.elements()];
        for (row, record) in records.iter().enumerate() {
            let base = row * elements;
            if base + elements > tensor.len() {
                break;
            }
            tensor[base] = self.quant.quantize(record.x);
            tensor[base + 1] = self.quant.quantize(record.y);
            tensor[base + 2] = self.quant.quantize(record.w);
            tensor[base + 3] = self.quant.quantize(record.h);
            tensor[base + 4] = self.quant.quantize(record.score);
            let class_cell = base + 5 + record.class.min(self.classes - 1);
            tensor[class_cell] = self.quant.quantize(record.score);
        }
        tensor
    }

    /// Render per-class scores (0..=1) into one classification tensor.
    pub fn encode_classes(&self, scores: &[f32]) -> Vec<i8> {
        let mut tensor = vec![0i8; self.output_shape.elements()];
        for (cell, score) in tensor.iter_mut().zip(scores.iter()) {
            *cell = self.quant.quantize(*score);
        }
        tensor
    }

    fn load_output(&mut self, tensor: &[i8]) {
        let n = tensor.len().min(self.output.len());
        self.output[..n].copy_from_slice(&tensor[..n]);
        for cell in self.output[n..].iter_mut() {
            *cell = 0;
        }
    }

    fn procedural_records(&self) -> Vec<DetectionRecord> {
        let t = self.invocations as f32 * 0.13;
        let primary = DetectionRecord {
            x: 0.5 + 0.22 * t.sin(),
            y: 0.5 + 0.22 * t.cos(),
            w: 0.22,
            h: 0.28,
            score: 0.55 + 0.35 * (t * 0.7).sin().abs(),
            class: (self.invocations / 24) as usize % self.classes,
        };
        let mut records = vec![primary];
        // A second, weaker track appears on and off.
        if self.invocations % 3 != 0 {
            records.push(DetectionRecord {
                x: 0.5 - 0.3 * (t * 0.4).cos(),
                y: 0.35,
                w: 0.16,
                h: 0.16,
                score: 0.35 + 0.2 * (t * 1.3).cos().abs(),
                class: (self.invocations / 8) as usize % self.classes,
            });
        }
        records
    }
}

impl Engine for StubEngine {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn input_shape(&self, index: usize) -> Option<TensorShape> {
        (index == 0).then(|| self.input_shape.clone())
    }

    fn output_shape(&self, index: usize) -> Option<TensorShape> {
        (index == 0).then(|| self.output_shape.clone())
    }

    fn input_quant(&self, index: usize) -> Option<QuantParams> {
        (index == 0).then_some(self.quant)
    }

    fn output_quant(&self, index: usize) -> Option<QuantParams> {
        (index == 0).then_some(self.quant)
    }

    fn input_mut(&mut self, index: usize) -> Option<&mut [i8]> {
        (index == 0).then_some(self.input.as_mut_slice())
    }

    fn output(&self, index: usize) -> Option<&[i8]> {
        (index == 0).then_some(self.output.as_slice())
    }

    fn invoke(&mut self) -> Result<(), EngineError> {
        if !self.ready {
            return Err(EngineError::NotReady);
        }
        if let Some(reason) = self.fail_next.take() {
            return Err(EngineError::InvokeFailed(reason));
        }
        self.invocations += 1;
        match self.mode {
            StubOutput::Quiet => {}
            StubOutput::Scripted => {
                if let Some(tensor) = self.scripted.pop_front() {
                    self.load_output(&tensor);
                }
            }
            StubOutput::Procedural => {
                let tensor = self.encode_detections(&self.procedural_records());
                self.load_output(&tensor);
            }
        }
        Ok(())
    }
}

/// Anchor-cell count a detection model exports for a square input: one
/// record per cell at strides 32, 16 and 8, multiplied by the channel count.
fn detection_records(model_size: usize, channels: usize) -> usize {
    let s = model_size / 32;
    let m = model_size / 16;
    let l = model_size / 8;
    (s * s + m * m + l * l) * channels
}
