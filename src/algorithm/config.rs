//! Runtime-tunable detection thresholds.
//!
//! Thresholds live on a 0..=100 percent scale and are stored as atomic
//! bytes, so the control plane can retune a running detector without ever
//! taking a lock the inference path might hold. Values outside the scale
//! clamp to the nearest bound instead of failing.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Score threshold a detector starts with.
pub const SCORE_THRESHOLD_DEFAULT: u8 = 50;
/// Overlap threshold a detector starts with.
pub const NMS_THRESHOLD_DEFAULT: u8 = 45;

const THRESHOLD_MAX: u8 = 100;

// ----------------------------------------------------------------------------
// Plain config value
// ----------------------------------------------------------------------------

/// Threshold pair on the percent scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    pub score_threshold: u8,
    pub nms_threshold: u8,
}

impl AlgorithmConfig {
    pub fn new(score_threshold: u8, nms_threshold: u8) -> Self {
        Self {
            score_threshold,
            nms_threshold,
        }
        .clamped()
    }

    /// Copy with both fields forced into 0..=100.
    pub fn clamped(self) -> Self {
        Self {
            score_threshold: self.score_threshold.min(THRESHOLD_MAX),
            nms_threshold: self.nms_threshold.min(THRESHOLD_MAX),
        }
    }
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            score_threshold: SCORE_THRESHOLD_DEFAULT,
            nms_threshold: NMS_THRESHOLD_DEFAULT,
        }
    }
}

// ----------------------------------------------------------------------------
// Shared runtime storage
// ----------------------------------------------------------------------------

/// Threshold storage shared between the inference path and the control
/// plane.
///
/// Each field is an independent atomic byte: writes are tear-free and take
/// effect on the next postprocess snapshot. A pass in flight keeps the
/// values it already snapshotted.
#[derive(Debug)]
pub struct RuntimeConfig {
    score_threshold: AtomicU8,
    nms_threshold: AtomicU8,
}

impl RuntimeConfig {
    pub fn new(config: AlgorithmConfig) -> Self {
        let config = config.clamped();
        Self {
            score_threshold: AtomicU8::new(config.score_threshold),
            nms_threshold: AtomicU8::new(config.nms_threshold),
        }
    }

    pub fn score_threshold(&self) -> u8 {
        self.score_threshold.load(Ordering::SeqCst)
    }

    /// Store a new score threshold; returns the value actually applied
    /// after clamping.
    pub fn set_score_threshold(&self, threshold: u8) -> u8 {
        let applied = threshold.min(THRESHOLD_MAX);
        self.score_threshold.store(applied, Ordering::SeqCst);
        applied
    }

    pub fn nms_threshold(&self) -> u8 {
        self.nms_threshold.load(Ordering::SeqCst)
    }

    /// Store a new overlap threshold; returns the value actually applied
    /// after clamping.
    pub fn set_nms_threshold(&self, threshold: u8) -> u8 {
        let applied = threshold.min(THRESHOLD_MAX);
        self.nms_threshold.store(applied, Ordering::SeqCst);
        applied
    }

    /// Read both fields. The loads are individually atomic; a concurrent
    /// bulk write may land between them.
    pub fn algorithm_config(&self) -> AlgorithmConfig {
        AlgorithmConfig {
            score_threshold: self.score_threshold(),
            nms_threshold: self.nms_threshold(),
        }
    }

    /// Store both fields, last write per field wins. Returns the clamped
    /// pair actually applied.
    pub fn set_algorithm_config(&self, config: AlgorithmConfig) -> AlgorithmConfig {
        let config = config.clamped();
        self.score_threshold
            .store(config.score_threshold, Ordering::SeqCst);
        self.nms_threshold
            .store(config.nms_threshold, Ordering::SeqCst);
        config
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(AlgorithmConfig::default())
    }
}

/// Parse an operator-supplied percent value. Numbers outside 0..=100 clamp
/// to the nearest bound; non-numeric input is rejected.
pub fn parse_percent(text: &str) -> Option<u8> {
    let value: i64 = text.trim().parse().ok()?;
    Some(value.clamp(0, THRESHOLD_MAX as i64) as u8)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = AlgorithmConfig::default();
        assert_eq!(config.score_threshold, SCORE_THRESHOLD_DEFAULT);
        assert_eq!(config.nms_threshold, NMS_THRESHOLD_DEFAULT);
    }

    #[test]
    fn set_and_get_round_trip() {
        let runtime = RuntimeConfig::default();
        for value in [0u8, 1, 50, 99, 100] {
            assert_eq!(runtime.set_score_threshold(value), value);
            assert_eq!(runtime.score_threshold(), value);
            assert_eq!(runtime.set_nms_threshold(value), value);
            assert_eq!(runtime.nms_threshold(), value);
        }
    }

    #[test]
    fn out_of_range_values_clamp() {
        let runtime = RuntimeConfig::default();
        assert_eq!(runtime.set_score_threshold(101), 100);
        assert_eq!(runtime.score_threshold(), 100);
        assert_eq!(runtime.set_nms_threshold(255), 100);
        assert_eq!(runtime.nms_threshold(), 100);

        let config = AlgorithmConfig::new(200, 150);
        assert_eq!(config.score_threshold, 100);
        assert_eq!(config.nms_threshold, 100);
    }

    #[test]
    fn bulk_update_applies_both_fields() {
        let runtime = RuntimeConfig::default();
        let applied = runtime.set_algorithm_config(AlgorithmConfig::new(70, 30));
        assert_eq!(applied, AlgorithmConfig::new(70, 30));
        assert_eq!(runtime.algorithm_config(), applied);
    }

    #[test]
    fn percent_parsing_clamps_and_rejects() {
        assert_eq!(parse_percent("42"), Some(42));
        assert_eq!(parse_percent(" 42 "), Some(42));
        assert_eq!(parse_percent("0"), Some(0));
        assert_eq!(parse_percent("100"), Some(100));
        assert_eq!(parse_percent("300"), Some(100));
        assert_eq!(parse_percent("-5"), Some(0));
        assert_eq!(parse_percent("abc"), None);
        assert_eq!(parse_percent(""), None);
        assert_eq!(parse_percent("4.5"), None);
    }
}
