//! Pipeline contract shared by all algorithm variants.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::PipelineError;
use crate::image::ImageView;

/// Ratio between the caller's frame and the model input, captured during
/// preprocess and applied to decoded boxes during postprocess.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputScale {
    pub w: f32,
    pub h: f32,
}

impl InputScale {
    pub fn identity() -> Self {
        Self { w: 1.0, h: 1.0 }
    }

    /// Frame extent over model extent, per axis.
    pub fn between(frame_w: u32, frame_h: u32, model_w: usize, model_h: usize) -> Self {
        Self {
            w: frame_w as f32 / model_w as f32,
            h: frame_h as f32 / model_h as f32,
        }
    }
}

/// Three-phase inference contract.
///
/// `run` is the entry point callers use; it composes the phases in order
/// and stops at the first failure. A failed pass must leave the previously
/// published result untouched.
pub trait Algorithm {
    /// Validate the frame and fill the engine's input tensor.
    fn preprocess(&mut self, image: &ImageView<'_>) -> Result<(), PipelineError>;

    /// Execute the model.
    fn invoke(&mut self) -> Result<(), PipelineError>;

    /// Decode the output tensor and publish a fresh result.
    fn postprocess(&mut self) -> Result<(), PipelineError>;

    /// Full pass over one frame.
    fn run(&mut self, image: &ImageView<'_>) -> Result<(), PipelineError> {
        self.preprocess(image)?;
        self.invoke()?;
        self.postprocess()
    }
}

/// Control-plane request for one inference pass.
///
/// A command handler sets the flag and returns immediately; the inference
/// context consumes it with `take` and performs the pass. Neither side
/// blocks the other, and repeated requests before a `take` collapse into
/// one pass.
#[derive(Debug, Default)]
pub struct RunTrigger {
    requested: AtomicBool,
}

impl RunTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Consume a pending request, if any.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Fill a square int8 model input from a frame: nearest-neighbor sample per
/// cell, luma replicated across channels, shifted from unsigned to signed.
pub(crate) fn fill_input(
    input: &mut [i8],
    image: &ImageView<'_>,
    model_w: usize,
    model_h: usize,
    channels: usize,
) {
    debug_assert_eq!(input.len(), model_w * model_h * channels);
    for my in 0..model_h {
        let sy = (my as u64 * image.height() as u64 / model_h as u64) as u32;
        for mx in 0..model_w {
            let sx = (mx as u64 * image.width() as u64 / model_w as u64) as u32;
            let signed = (image.luma_at(sx, sy) as i16 - 128) as i8;
            let base = (my * model_w + mx) * channels;
            for cell in &mut input[base..base + channels] {
                *cell = signed;
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
