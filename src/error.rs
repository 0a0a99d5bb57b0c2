//! Failure taxonomy for the kernel seams.
//!
//! Library code returns these typed errors; binaries and config loading use
//! `anyhow` on top. Nothing here is fatal: every failure is a value the
//! caller can inspect, and a failed inference run never clobbers previously
//! published results.

use thiserror::Error;

/// Failures reported by an engine while executing a model.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is not ready")]
    NotReady,

    #[error("engine has no tensor at index {0}")]
    MissingTensor(usize),

    #[error("model invocation failed: {0}")]
    InvokeFailed(String),
}

/// Rejections raised while attaching an algorithm to an engine.
///
/// These surface from constructors only. A successfully constructed
/// algorithm never fails for model-compatibility reasons at run time.
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("engine is not ready")]
    EngineNotReady,

    #[error("model input tensor is missing")]
    MissingInput,

    #[error("model output tensor is missing")]
    MissingOutput,

    #[error("model input shape {dims:?} is not supported")]
    UnsupportedInputShape { dims: Vec<usize> },

    #[error("model output shape {dims:?} is not supported")]
    UnsupportedOutputShape { dims: Vec<usize> },

    #[error("model output quantization scale {scale} is not usable")]
    UnsupportedQuantization { scale: f32 },
}

/// Failures of a single inference run.
///
/// `run()` returns one of these and leaves the previously published result
/// untouched, so readers always observe a complete collection.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image buffer holds {actual} bytes, expected {expected}")]
    ImageSize { expected: usize, actual: usize },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("model output holds {len} values, too few for {records} records of {elements}")]
    TruncatedOutput {
        len: usize,
        records: usize,
        elements: usize,
    },
}

/// Failures of the control-plane command layer.
///
/// Only structural problems are errors: an unknown command name or malformed
/// handler arguments travel back to the operator as `Response` values, never
/// as process faults.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command line is empty")]
    EmptyLine,

    #[error("command '{0}' is already registered")]
    Duplicate(String),
}
