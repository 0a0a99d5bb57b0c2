//! Edge Vision Kernel (EVK)
//!
//! This crate implements the core of an on-device computer-vision inference
//! SDK: a model-agnostic pipeline, a YOLO-style detection postprocessor and
//! a textual control plane, sized for microcontroller-class edge devices.
//!
//! # Architecture
//!
//! The kernel holds to four rules by construction:
//!
//! 1. **Engines are collaborators**: model execution sits behind the
//!    [`engine::Engine`] trait; an incompatible model is rejected when an
//!    algorithm is constructed, never discovered mid-run.
//! 2. **Results are published wholesale**: a reader observes the complete
//!    previous detection set or the complete new one, never a partial
//!    rebuild.
//! 3. **The control plane never blocks inference**: thresholds are lock-free
//!    atomics, run requests are a flag, and every command is a value-level
//!    response.
//! 4. **Nothing here is fatal**: every failure in this crate is a returned
//!    value, and an empty result is distinguishable from a failed run.
//!
//! # Module Structure
//!
//! - `engine`: tensor-execution seam (Engine trait, shapes, quantization)
//! - `image`: borrowed, validated frame views
//! - `algorithm`: pipeline contract, YOLO detector, classifier, NMS,
//!   runtime thresholds, result publication
//! - `repl`: command protocol, dispatch, history, server, access point
//! - `transport`: line-framed transport collaborators (TCP)
//! - `config`: daemon configuration (file + env layering)

pub mod algorithm;
pub mod config;
pub mod engine;
pub mod error;
pub mod image;
pub mod repl;
pub mod transport;

pub use algorithm::{
    Algorithm, AlgorithmConfig, DetectionBox, DetectionResult, ImageClassifier, InputScale,
    ResultSlot, RunTrigger, RuntimeConfig, YoloDetector,
};
pub use engine::{Engine, QuantParams, StubEngine, TensorShape};
pub use error::{CommandError, ConstructionError, EngineError, PipelineError};
pub use image::{ImageView, PixelFormat};
pub use repl::{Command, Executor, History, ReplContext, ReplServer, Response, Status, Transport};
pub use transport::TcpLineTransport;
