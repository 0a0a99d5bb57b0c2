//! Whole-frame image classifier.
//!
//! Shares the detector's preprocess and publication machinery but decodes a
//! rank-2 score vector instead of box records. Only the score threshold
//! applies; there is no geometry to suppress.

use std::sync::Arc;

use crate::algorithm::config::{AlgorithmConfig, RuntimeConfig};
use crate::algorithm::pipeline::{fill_input, Algorithm};
use crate::algorithm::result::{ClassScore, ClassificationResult, ResultSlot};
use crate::engine::{Engine, QuantParams};
use crate::error::{ConstructionError, EngineError, PipelineError};
use crate::image::ImageView;

const NORMALIZED_SCALE_LIMIT: f32 = 0.1;
const MIN_INPUT_SIZE: usize = 32;
const INPUT_STRIDE: usize = 32;
const MIN_CLASSES: usize = 2;

#[derive(Clone, Debug)]
struct ClassifierLayout {
    width: usize,
    height: usize,
    channels: usize,
    classes: usize,
    quant: QuantParams,
}

impl ClassifierLayout {
    fn probe<E: Engine>(engine: &E) -> Result<Self, ConstructionError> {
        if !engine.is_ready() {
            return Err(ConstructionError::EngineNotReady);
        }

        let input = engine.input_shape(0).ok_or(ConstructionError::MissingInput)?;
        let dims = &input.dims;
        let input_ok = dims.len() == 4
            && dims[0] == 1
            && dims[1] == dims[2]
            && dims[1] >= MIN_INPUT_SIZE
            && dims[1] % INPUT_STRIDE == 0
            && (dims[3] == 1 || dims[3] == 3);
        if !input_ok {
            return Err(ConstructionError::UnsupportedInputShape { dims: dims.clone() });
        }

        let output = engine
            .output_shape(0)
            .ok_or(ConstructionError::MissingOutput)?;
        let odims = &output.dims;
        let output_ok = odims.len() == 2 && odims[0] == 1 && odims[1] >= MIN_CLASSES;
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
            width: dims[1],
            height: dims[1],
            channels: dims[3],
            classes: odims[1],
            quant,
        })
    }
}

/// Classification pipeline over a borrowed engine.
pub struct ImageClassifier<'e, E: Engine> {
    engine: &'e mut E,
    layout: ClassifierLayout,
    config: Arc<RuntimeConfig>,
    results: Arc<ResultSlot<ClassificationResult>>,
}

impl<'e, E: Engine> ImageClassifier<'e, E> {
    pub fn new(engine: &'e mut E, config: AlgorithmConfig) -> Result<Self, ConstructionError> {
        let layout = ClassifierLayout::probe(engine)?;
        log::info!(
            "classifier attached: input {}x{}x{}, {} classes",
            layout.width,
            layout.height,
            layout.channels,
            layout.classes
        );
        Ok(Self {
            engine,
            layout,
            config: Arc::new(RuntimeConfig::new(config)),
            results: Arc::new(ResultSlot::new()),
        })
    }

    /// True when the engine's loaded model has classification-shaped
    /// tensors.
    pub fn is_model_valid(engine: &E) -> bool {
        ClassifierLayout::probe(engine).is_ok()
    }

    pub fn runtime_config(&self) -> Arc<RuntimeConfig> {
        Arc::clone(&self.config)
    }

    pub fn results(&self) -> Arc<ResultSlot<ClassificationResult>> {
        Arc::clone(&self.results)
    }

    pub fn last_result(&self) -> Arc<ClassificationResult> {
        self.results.snapshot()
    }

    pub fn score_threshold(&self) -> u8 {
        self.config.score_threshold()
    }

    pub fn set_score_threshold(&self, threshold: u8) -> u8 {
        self.config.set_score_threshold(threshold)
    }
}

impl<E: Engine> Algorithm for ImageClassifier<'_, E> {
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
        Ok(())
    }

    fn invoke(&mut self) -> Result<(), PipelineError> {
        self.engine.invoke()?;
        Ok(())
    }

    fn postprocess(&mut self) -> Result<(), PipelineError> {
        let output = self
            .engine
            .output(0)
            .ok_or(PipelineError::Engine(EngineError::MissingTensor(0)))?;
        if output.len() < self.layout.classes {
            return Err(PipelineError::TruncatedOutput {
                len: output.len(),
                records: self.layout.classes,
                elements: 1,
            });
        }

        let quant = self.layout.quant;
        let normalized = quant.scale < NORMALIZED_SCALE_LIMIT;
        let score_threshold = self.config.score_threshold();

        let mut classes = Vec::new();
        for (target, &cell) in output[..self.layout.classes].iter().enumerate() {
            let mut score = quant.dequantize(cell);
            if normalized {
                score *= 100.0;
            }
            if score < score_threshold as f32 {
                continue;
            }
            classes.push(ClassScore {
                score: score.clamp(0.0, 100.0) as u8,
                target: target as u16,
            });
        }
        // Stable, so equal scores keep class-index order.
        classes.sort_by(|a, b| b.score.cmp(&a.score));
        self.results.publish(ClassificationResult { classes });
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
