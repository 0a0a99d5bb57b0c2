//! Tensor-execution engine seam.
//!
//! The kernel never executes models itself. Hardware backends (NPU runtimes,
//! TFLite-micro ports, remote accelerators) sit behind the `Engine` trait and
//! expose exactly what the pipeline needs: readiness, tensor geometry,
//! quantization metadata and raw int8 tensor storage.
//!
//! Engine implementations MUST:
//! - keep shapes and quantization stable while any algorithm borrows them
//! - leave output tensors untouched when `invoke` fails
//! - tolerate repeated `invoke` calls with unchanged input

use crate::error::EngineError;

pub mod stub;

pub use stub::{DetectionRecord, StubEngine};

/// Dimensions of one tensor, outermost first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorShape {
    pub dims: Vec<usize>,
}

impl TensorShape {
    pub fn new(dims: &[usize]) -> Self {
        Self {
            dims: dims.to_vec(),
        }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Total cell count.
    pub fn elements(&self) -> usize {
        self.dims.iter().product()
    }
}

/// Affine quantization of an int8 tensor: `real = (cell - zero_point) * scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

impl QuantParams {
    /// Real value of one quantized cell.
    pub fn dequantize(&self, cell: i8) -> f32 {
        (cell as i32 - self.zero_point) as f32 * self.scale
    }

    /// Quantized cell for a real value, saturating at the i8 range.
    pub fn quantize(&self, value: f32) -> i8 {
        let cell = (value / self.scale).round() as i32 + self.zero_point;
        cell.clamp(i8::MIN as i32, i8::MAX as i32) as i8
    }
}

/// Tensor-execution capability the pipeline drives.
///
/// Tensor accessors return `None` for indices the loaded model does not
/// have; algorithms treat that as an incompatible model at construction and
/// as an engine fault afterwards.
pub trait Engine {
    /// True once a model is loaded and its tensors are allocated.
    fn is_ready(&self) -> bool;

    fn input_shape(&self, index: usize) -> Option<TensorShape>;

    fn output_shape(&self, index: usize) -> Option<TensorShape>;

    fn input_quant(&self, index: usize) -> Option<QuantParams>;

    fn output_quant(&self, index: usize) -> Option<QuantParams>;

    /// Writable storage of the input tensor at `index`.
    fn input_mut(&mut self, index: usize) -> Option<&mut [i8]>;

    /// Read-only storage of the output tensor at `index`.
    fn output(&self, index: usize) -> Option<&[i8]>;

    /// Execute the loaded model over the current input tensors. Blocking.
    fn invoke(&mut self) -> Result<(), EngineError>;
}
