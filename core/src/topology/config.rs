//! Predictor tuning knobs
//!
//! Every threshold the estimator, resolver and solver rely on lives here so a
//! host can load them from its own config file. The defaults are the values
//! the model was calibrated with; changing them changes predictions.

use crate::PredictorError;
use serde::{Deserialize, Serialize};

/// How a single observation moves a link's probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRule {
    /// Current probability is the running success mass over `n + 1`
    /// pseudo-observations. Keeps no history beyond a single scalar.
    #[default]
    RunningMass,
    /// Rule of succession over explicit success/failure tallies:
    /// `(successes + 1) / (successes + failures + 2)`.
    Laplace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Observations between automatic resolution passes
    pub resolution_interval: u64,
    /// Observation count at which per-edge confidence saturates at 1.0
    pub confidence_saturation: u64,
    /// Probability at or above which a link is considered to exist.
    /// Shared by `predict_connection` and the pruning rule.
    pub existence_threshold: f64,
    /// Per-edge confidence above which the resolver is allowed to prune
    pub decisive_confidence: f64,
    /// Weight of a new latency/bandwidth sample in the moving average
    pub latency_smoothing: f64,
    /// Latency assumed for edges with no latency samples (ms)
    pub default_latency_ms: f64,
    /// Bandwidth assumed for edges with no bandwidth samples
    pub default_bandwidth: f64,
    /// Cost of a certainly-absent edge in the path solver
    pub probability_weight: f64,
    /// Latency is divided by this before it enters the edge cost
    pub latency_divisor: f64,
    pub update_rule: UpdateRule,
    /// Alternatives computed alongside each optimal path (0 = none)
    pub max_alternatives: usize,
    /// Reject observations for ids missing from the registry
    pub require_registered_nodes: bool,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            resolution_interval: 10,
            confidence_saturation: 20,
            existence_threshold: 0.7,
            decisive_confidence: 0.5,
            latency_smoothing: 0.3,
            default_latency_ms: 50.0,
            default_bandwidth: 1000.0,
            probability_weight: 100.0,
            latency_divisor: 10.0,
            update_rule: UpdateRule::RunningMass,
            max_alternatives: 0,
            require_registered_nodes: false,
        }
    }
}

impl PredictorConfig {
    /// Check that every value can be used without producing NaN or
    /// out-of-range probabilities
    pub fn validate(&self) -> Result<(), PredictorError> {
        if self.resolution_interval == 0 {
            return Err(PredictorError::InvalidConfig(
                "resolution_interval must be at least 1".to_string(),
            ));
        }
        if self.confidence_saturation == 0 {
            return Err(PredictorError::InvalidConfig(
                "confidence_saturation must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("existence_threshold", self.existence_threshold),
            ("decisive_confidence", self.decisive_confidence),
            ("latency_smoothing", self.latency_smoothing),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PredictorError::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [
            ("default_latency_ms", self.default_latency_ms),
            ("default_bandwidth", self.default_bandwidth),
            ("probability_weight", self.probability_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PredictorError::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !self.latency_divisor.is_finite() || self.latency_divisor <= 0.0 {
            return Err(PredictorError::InvalidConfig(format!(
                "latency_divisor must be positive, got {}",
                self.latency_divisor
            )));
        }
        Ok(())
    }
}
