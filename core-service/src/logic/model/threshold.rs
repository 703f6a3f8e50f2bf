//! Decision Threshold
//!
//! The predictor only produces a probability; the cutoff is applied here by
//! the caller so it can be reported next to the decision.

use serde::{Deserialize, Serialize};

/// Fixed probability cutoff for the positive class
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Threshold Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Probability cutoff (0.0 - 1.0)
    pub threshold: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self { threshold: DECISION_THRESHOLD }
    }
}

impl ThresholdConfig {
    /// 1 iff probability >= threshold
    pub fn decide(&self, probability: f64) -> u8 {
        u8::from(probability >= self.threshold)
    }
}

/// Probability + thresholded decision for one request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub probability: f64,
    pub decision: u8,
    pub threshold: f64,
}

impl PredictionResult {
    pub fn from_probability(probability: f64, config: &ThresholdConfig) -> Self {
        Self {
            probability,
            decision: config.decide(probability),
            threshold: config.threshold,
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.decision == 1
    }
}
