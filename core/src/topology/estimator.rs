//! Connection Estimator
//!
//! Per directed pair `(from, to)` estimate of "does this link exist", updated
//! online from success/failure observations. `(A, B)` and `(B, A)` are
//! separate links with separate evidence.
//!
//! Estimates are created lazily on first observation at `p = 0.5` with zero
//! confidence. Latency and bandwidth are tracked as exponential moving
//! averages seeded by the first sample.

use super::config::{PredictorConfig, UpdateRule};
use super::registry::NodeId;
use crate::PredictorError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered pair key. Ordering makes map iteration, and therefore path
/// tie-breaking, deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionKey {
    pub from: NodeId,
    pub to: NodeId,
}

impl ConnectionKey {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Optional measurements attached to an observation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationMetadata {
    /// Round-trip latency in milliseconds
    pub latency: Option<f64>,
    /// Caller-defined units (kbps in the bundled CLI)
    pub bandwidth: Option<f64>,
}

impl ObservationMetadata {
    pub fn with_latency(latency: f64) -> Self {
        Self {
            latency: Some(latency),
            bandwidth: None,
        }
    }

    pub fn and_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    /// Samples must be finite and non-negative
    pub fn validate(&self) -> Result<(), PredictorError> {
        for (name, sample) in [("latency", self.latency), ("bandwidth", self.bandwidth)] {
            if let Some(value) = sample {
                if !value.is_finite() || value < 0.0 {
                    return Err(PredictorError::InvalidMetric { name, value });
                }
            }
        }
        Ok(())
    }
}

/// What we believe about one directed link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEstimate {
    /// Probability the link exists, always within [0, 1]
    pub probability: f64,
    /// Saturating function of observation count, always within [0, 1]
    pub confidence: f64,
    pub observation_count: u64,
    pub successes: u64,
    pub failures: u64,
    /// ms since epoch
    pub last_observed: u64,
    pub latency_estimate: Option<f64>,
    pub bandwidth_estimate: Option<f64>,
}

impl ConnectionEstimate {
    /// Estimate for a link nothing is known about yet
    pub fn unobserved(now: u64) -> Self {
        Self {
            probability: 0.5,
            confidence: 0.0,
            observation_count: 0,
            successes: 0,
            failures: 0,
            last_observed: now,
            latency_estimate: None,
            bandwidth_estimate: None,
        }
    }

    /// Estimate restored from a caller-held prior.
    ///
    /// The observation count is reconstructed from `confidence` so later
    /// updates weigh the prior as that many observations.
    pub fn seeded(
        probability: f64,
        confidence: f64,
        confidence_saturation: u64,
        now: u64,
    ) -> Result<Self, PredictorError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(PredictorError::InvalidProbability(probability));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(PredictorError::InvalidConfidence(confidence));
        }
        let observation_count = (confidence * confidence_saturation as f64).round() as u64;
        let successes = (probability * observation_count as f64).round() as u64;
        Ok(Self {
            probability,
            confidence,
            observation_count,
            successes,
            failures: observation_count - successes,
            last_observed: now,
            latency_estimate: None,
            bandwidth_estimate: None,
        })
    }

    pub fn exists(&self, threshold: f64) -> bool {
        self.probability >= threshold
    }

    fn apply(
        &mut self,
        success: bool,
        metadata: Option<&ObservationMetadata>,
        now: u64,
        params: &EstimatorParams,
    ) {
        let n = self.observation_count as f64;

        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }

        let probability = match params.update_rule {
            UpdateRule::RunningMass => {
                let mass = self.probability * (n + 1.0);
                if success {
                    (mass + 1.0) / (n + 2.0)
                } else {
                    mass / (n + 2.0)
                }
            }
            UpdateRule::Laplace => {
                (self.successes as f64 + 1.0) / ((self.successes + self.failures) as f64 + 2.0)
            }
        };
        self.probability = probability.clamp(0.0, 1.0);

        self.observation_count += 1;
        self.confidence =
            (self.observation_count as f64 / params.confidence_saturation as f64).min(1.0);
        self.last_observed = now;

        if let Some(meta) = metadata {
            if let Some(latency) = meta.latency {
                self.latency_estimate = Some(smooth(self.latency_estimate, latency, params.smoothing));
            }
            if let Some(bandwidth) = meta.bandwidth {
                self.bandwidth_estimate =
                    Some(smooth(self.bandwidth_estimate, bandwidth, params.smoothing));
            }
        }
    }
}

/// Exponential moving average; the first sample seeds the average
fn smooth(previous: Option<f64>, sample: f64, weight: f64) -> f64 {
    match previous {
        Some(prev) => (1.0 - weight) * prev + weight * sample,
        None => sample,
    }
}

#[derive(Debug, Clone)]
struct EstimatorParams {
    update_rule: UpdateRule,
    confidence_saturation: u64,
    smoothing: f64,
}

/// Owns every link estimate. The only writer of link state.
#[derive(Debug, Clone)]
pub struct ConnectionEstimator {
    connections: BTreeMap<ConnectionKey, ConnectionEstimate>,
    params: EstimatorParams,
}

impl ConnectionEstimator {
    pub fn new(config: &PredictorConfig) -> Self {
        Self {
            connections: BTreeMap::new(),
            params: EstimatorParams {
                update_rule: config.update_rule,
                confidence_saturation: config.confidence_saturation,
                smoothing: config.latency_smoothing,
            },
        }
    }

    /// Fold one observation into the `(from, to)` estimate, creating it if needed
    pub fn observe(
        &mut self,
        from: &str,
        to: &str,
        success: bool,
        metadata: Option<&ObservationMetadata>,
        now: u64,
    ) -> &ConnectionEstimate {
        let estimate = self
            .connections
            .entry(ConnectionKey::new(from, to))
            .or_insert_with(|| ConnectionEstimate::unobserved(now));
        estimate.apply(success, metadata, now, &self.params);
        estimate
    }

    pub fn get(&self, from: &str, to: &str) -> Option<&ConnectionEstimate> {
        // BTreeMap lookups need an owned key for a struct of Strings
        self.connections.get(&ConnectionKey::new(from, to))
    }

    /// Store a prior, replacing whatever was known about the link
    pub fn insert(&mut self, key: ConnectionKey, estimate: ConnectionEstimate) {
        self.connections.insert(key, estimate);
    }

    pub fn saturation(&self) -> u64 {
        self.params.confidence_saturation
    }

    /// Keep only estimates matching `keep`; returns how many were removed
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&ConnectionKey, &ConnectionEstimate) -> bool,
    {
        let before = self.connections.len();
        self.connections.retain(|key, estimate| keep(key, estimate));
        before - self.connections.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionKey, &ConnectionEstimate)> {
        self.connections.iter()
    }

    pub fn probabilities(&self) -> impl Iterator<Item = f64> + '_ {
        self.connections.values().map(|e| e.probability)
    }

    pub fn connections(&self) -> &BTreeMap<ConnectionKey, ConnectionEstimate> {
        &self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
