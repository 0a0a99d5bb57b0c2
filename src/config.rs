//! Daemon configuration.
//!
//! Layering matches how the daemon is deployed: built-in defaults, then an
//! optional JSON file named by `VISIOND_CONFIG`, then environment
//! overrides, then validation. Library code never reads the environment;
//! only this loader does.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::algorithm::{AlgorithmConfig, NMS_THRESHOLD_DEFAULT, SCORE_THRESHOLD_DEFAULT};

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8767";
const DEFAULT_HISTORY_CAPACITY: usize = 16;
const DEFAULT_MODEL_SIZE: usize = 96;
const DEFAULT_MODEL_CLASSES: usize = 2;
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 480;
const DEFAULT_INTERVAL_MS: u64 = 200;

#[derive(Debug, Deserialize, Default)]
struct VisiondConfigFile {
    listen_addr: Option<String>,
    history_capacity: Option<usize>,
    model: Option<ModelConfigFile>,
    frame: Option<FrameConfigFile>,
    thresholds: Option<ThresholdConfigFile>,
    interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    input_size: Option<usize>,
    classes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct FrameConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    score: Option<u8>,
    nms: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct VisiondConfig {
    pub listen_addr: String,
    pub history_capacity: usize,
    pub model: ModelSettings,
    pub frame: FrameSettings,
    pub thresholds: AlgorithmConfig,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub input_size: usize,
    pub classes: usize,
}

#[derive(Debug, Clone)]
pub struct FrameSettings {
    pub width: u32,
    pub height: u32,
}

impl VisiondConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("VISIOND_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: VisiondConfigFile) -> Self {
        let listen_addr = file
            .listen_addr
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let history_capacity = file.history_capacity.unwrap_or(DEFAULT_HISTORY_CAPACITY);
        let model = ModelSettings {
            input_size: file
                .model
                .as_ref()
                .and_then(|model| model.input_size)
                .unwrap_or(DEFAULT_MODEL_SIZE),
            classes: file
                .model
                .as_ref()
                .and_then(|model| model.classes)
                .unwrap_or(DEFAULT_MODEL_CLASSES),
        };
        let frame = FrameSettings {
            width: file
                .frame
                .as_ref()
                .and_then(|frame| frame.width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            height: file
                .frame
                .as_ref()
                .and_then(|frame| frame.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
        };
        // Out-of-range thresholds clamp here like everywhere else.
        let thresholds = AlgorithmConfig::new(
            file.thresholds
                .as_ref()
                .and_then(|thresholds| thresholds.score)
                .unwrap_or(SCORE_THRESHOLD_DEFAULT),
            file.thresholds
                .as_ref()
                .and_then(|thresholds| thresholds.nms)
                .unwrap_or(NMS_THRESHOLD_DEFAULT),
        );
        let interval = Duration::from_millis(file.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS));
        Self {
            listen_addr,
            history_capacity,
            model,
            frame,
            thresholds,
            interval,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("VISIOND_LISTEN_ADDR") {
            if !addr.trim().is_empty() {
                self.listen_addr = addr;
            }
        }
        if let Ok(capacity) = std::env::var("VISIOND_HISTORY_CAPACITY") {
            self.history_capacity = capacity
                .parse()
                .map_err(|_| anyhow!("VISIOND_HISTORY_CAPACITY must be an integer"))?;
        }
        if let Ok(score) = std::env::var("VISIOND_SCORE_THRESHOLD") {
            let score: u8 = score
                .parse()
                .map_err(|_| anyhow!("VISIOND_SCORE_THRESHOLD must be an integer 0-100"))?;
            self.thresholds = AlgorithmConfig::new(score, self.thresholds.nms_threshold);
        }
        if let Ok(nms) = std::env::var("VISIOND_NMS_THRESHOLD") {
            let nms: u8 = nms
                .parse()
                .map_err(|_| anyhow!("VISIOND_NMS_THRESHOLD must be an integer 0-100"))?;
            self.thresholds = AlgorithmConfig::new(self.thresholds.score_threshold, nms);
        }
        if let Ok(interval) = std::env::var("VISIOND_INTERVAL_MS") {
            let millis: u64 = interval
                .parse()
                .map_err(|_| anyhow!("VISIOND_INTERVAL_MS must be an integer"))?;
            self.interval = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(anyhow!("history_capacity must be greater than zero"));
        }
        if self.model.input_size < 32 || self.model.input_size % 32 != 0 {
            return Err(anyhow!(
                "model input_size must be a multiple of 32, got {}",
                self.model.input_size
            ));
        }
        if self.model.classes == 0 {
            return Err(anyhow!("model classes must be greater than zero"));
        }
        if self.frame.width == 0 || self.frame.height == 0 {
            return Err(anyhow!("frame geometry must be non-zero"));
        }
        if self.interval.is_zero() {
            return Err(anyhow!("interval_ms must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<VisiondConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
