//! Predictive topology: estimation, resolution, path selection, route cache
//!
//! Layered from the leaves up:
//! - Registry: node metadata supplied by the caller
//! - Estimator: per directed pair link probability, fed by `observe()`
//! - Entropy: how uncertain the whole model is
//! - Snapshot: resolved, pruned view published every N observations and kept
//!   in step with later observations
//! - Solver: minimum expected-cost paths over the published snapshot
//! - Cache: precomputed paths for routes the caller expects to need
//!
//! `TopologyPredictor` ties the layers together and is the only type most
//! callers need. `SharedPredictor` is the same thing behind a lock.

pub mod cache;
pub mod config;
pub mod discovery;
pub mod entropy;
pub mod estimator;
pub mod predictor;
pub mod registry;
pub mod snapshot;
pub mod solver;

pub use cache::{AnticipatoryCache, RefreshReport, RouteKey};
pub use config::{PredictorConfig, UpdateRule};
pub use discovery::{DiscoveryProvider, StaticDiscovery};
pub use entropy::{binary_entropy, confidence_from_entropy, mean_entropy};
pub use estimator::{ConnectionEstimate, ConnectionEstimator, ConnectionKey, ObservationMetadata};
pub use predictor::{ConnectionPrediction, SharedPredictor, TopologyMetrics, TopologyPredictor};
pub use registry::{Node, NodeId, NodeRegistry, LOCAL_NODE_ID};
pub use snapshot::TopologySnapshot;
pub use solver::{OptimalPath, PathSolver, Segment};
