// Meshsight Core: Predictive Topology Estimation
//
// Turns a stream of noisy "could A reach B?" observations into a probabilistic
// picture of the mesh, and answers routing questions from that picture without
// sending a single probe.
//
// The core never touches the network or the filesystem. Whoever owns the
// transport feeds observations in; whoever owns the UI reads paths out.

pub mod topology;

use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use topology::{
    AnticipatoryCache, ConnectionEstimate, ConnectionEstimator, ConnectionKey,
    ConnectionPrediction, DiscoveryProvider, Node, NodeId, NodeRegistry, ObservationMetadata,
    OptimalPath, PathSolver, PredictorConfig, RefreshReport, RouteKey, Segment, SharedPredictor,
    StaticDiscovery, TopologyMetrics, TopologyPredictor, TopologySnapshot, UpdateRule,
    LOCAL_NODE_ID,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Programmer errors surfaced by the predictor.
///
/// "No data" situations (unknown pair, unreachable destination, empty graph)
/// are never errors; they come back as `None` or as the default prediction.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictorError {
    #[error("Node id must not be empty")]
    EmptyNodeId,
    #[error("Probability out of range [0, 1]: {0}")]
    InvalidProbability(f64),
    #[error("Confidence out of range [0, 1]: {0}")]
    InvalidConfidence(f64),
    #[error("Invalid {name} sample: {value}")]
    InvalidMetric { name: &'static str, value: f64 },
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Milliseconds since the unix epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
