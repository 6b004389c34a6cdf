//! Topology Predictor, the public face of the core
//!
//! Owns the registry, the link estimator, the solver and the route cache, and
//! keeps the derived state consistent between them:
//! - every `resolution_interval` observations a resolution pass prunes
//!   confidently-absent links and publishes a fresh snapshot
//! - between passes, every change to a link or node is copied into the
//!   published snapshot along with the recomputed entropy; holders of an older
//!   `Arc` keep their copy unchanged
//! - queries (`predict_connection`, `calculate_optimal_path`) read the
//!   published snapshot and know nothing until the first pass has run
//! - cached routes change only when the caller refreshes them
//!
//! `TopologyPredictor` is single-threaded. `SharedPredictor` puts it behind a
//! read/write lock for hosts that observe from several tasks.

use super::cache::{AnticipatoryCache, RefreshReport, RouteKey};
use super::config::PredictorConfig;
use super::discovery::DiscoveryProvider;
use super::entropy::{confidence_from_entropy, mean_entropy};
use super::estimator::{ConnectionEstimate, ConnectionEstimator, ConnectionKey, ObservationMetadata};
use super::registry::{Node, NodeRegistry, LOCAL_NODE_ID};
use super::snapshot::{prune_absent_links, TopologySnapshot};
use super::solver::{OptimalPath, PathSolver};
use crate::{current_timestamp, PredictorError};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Answer to "does this link probably exist?"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPrediction {
    pub exists: bool,
    pub probability: f64,
    pub confidence: f64,
}

impl ConnectionPrediction {
    /// What we say about a link we have never observed
    pub const UNKNOWN: ConnectionPrediction = ConnectionPrediction {
        exists: false,
        probability: 0.5,
        confidence: 0.0,
    };
}

/// Size and certainty of the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopologyMetrics {
    pub nodes: usize,
    pub connections: usize,
    pub entropy: f64,
    pub confidence: f64,
    /// Accepted observations since creation
    pub observations: u64,
}

#[derive(Debug, Clone)]
pub struct TopologyPredictor {
    config: PredictorConfig,
    registry: NodeRegistry,
    estimator: ConnectionEstimator,
    solver: PathSolver,
    cache: AnticipatoryCache,
    /// Published view, kept in step with the estimator once it exists
    snapshot: Option<Arc<TopologySnapshot>>,
    observations: u64,
    /// Mean link entropy of the live model
    entropy: f64,
}

impl Default for TopologyPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl TopologyPredictor {
    /// Create a predictor with the default calibration
    pub fn new() -> Self {
        Self::build(PredictorConfig::default())
    }

    /// Create a predictor with custom tuning
    pub fn with_config(config: PredictorConfig) -> Result<Self, PredictorError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PredictorConfig) -> Self {
        Self {
            registry: NodeRegistry::new(),
            estimator: ConnectionEstimator::new(&config),
            solver: PathSolver::new(&config),
            cache: AnticipatoryCache::new(),
            snapshot: None,
            observations: 0,
            entropy: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Node registry
    // ------------------------------------------------------------------------

    /// Insert or overwrite a node
    pub fn add_node(&mut self, node: Node) -> Result<(), PredictorError> {
        let id = node.id.clone();
        self.registry.add(node).map_err(|e| {
            warn!("Rejected node: {}", e);
            e
        })?;
        self.publish_node(&id);
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.registry.get(id)
    }

    /// Forget a node. Links observed to or from it are kept.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let removed = self.registry.remove(id)?;
        self.publish_node(id);
        Some(removed)
    }

    pub fn nodes(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Register the local node and publish the resulting snapshot.
    ///
    /// Real discovery lives outside the core; see `bootstrap_with`.
    pub fn bootstrap_discovery(&mut self, local_address: &str) -> Arc<TopologySnapshot> {
        self.register_discovered(local_address, Vec::new())
    }

    /// Register the local node plus everything `provider` finds
    pub async fn bootstrap_with(
        &mut self,
        provider: &dyn DiscoveryProvider,
        local_address: &str,
    ) -> Arc<TopologySnapshot> {
        let discovered = provider.discover(local_address).await;
        self.register_discovered(local_address, discovered)
    }

    /// Register the local node and a batch of discovered nodes, then resolve
    pub fn register_discovered(
        &mut self,
        local_address: &str,
        discovered: Vec<Node>,
    ) -> Arc<TopologySnapshot> {
        self.registry.register_local(local_address);

        let mut registered = 0usize;
        for node in discovered {
            if node.id == LOCAL_NODE_ID {
                continue;
            }
            if self.add_node(node).is_ok() {
                registered += 1;
            }
        }
        info!(
            "Bootstrapped at {} with {} discovered node(s)",
            local_address, registered
        );
        self.resolve_topology()
    }

    // ------------------------------------------------------------------------
    // Estimation
    // ------------------------------------------------------------------------

    /// Record one connectivity observation for the directed link `from -> to`
    pub fn observe(
        &mut self,
        from: &str,
        to: &str,
        success: bool,
        metadata: Option<ObservationMetadata>,
    ) -> Result<(), PredictorError> {
        self.observe_at(from, to, success, metadata, current_timestamp())
    }

    /// `observe` with an explicit timestamp (ms since epoch)
    pub fn observe_at(
        &mut self,
        from: &str,
        to: &str,
        success: bool,
        metadata: Option<ObservationMetadata>,
        now: u64,
    ) -> Result<(), PredictorError> {
        self.check_pair(from, to)?;
        if let Some(meta) = &metadata {
            meta.validate().map_err(|e| {
                warn!("Rejected observation {} -> {}: {}", from, to, e);
                e
            })?;
        }

        self.estimator
            .observe(from, to, success, metadata.as_ref(), now);
        self.observations += 1;
        self.recompute_entropy();
        self.publish_link(from, to);

        if self.observations % self.config.resolution_interval == 0 {
            self.resolve_topology_at(now);
        }
        Ok(())
    }

    /// Restore a prior for a link, replacing what was known about it
    pub fn seed_estimate(
        &mut self,
        from: &str,
        to: &str,
        probability: f64,
        confidence: f64,
    ) -> Result<(), PredictorError> {
        self.check_pair(from, to)?;
        let estimate = ConnectionEstimate::seeded(
            probability,
            confidence,
            self.estimator.saturation(),
            current_timestamp(),
        )
        .map_err(|e| {
            warn!("Rejected prior for {} -> {}: {}", from, to, e);
            e
        })?;

        self.estimator.insert(ConnectionKey::new(from, to), estimate);
        self.recompute_entropy();
        self.publish_link(from, to);
        Ok(())
    }

    fn check_pair(&self, from: &str, to: &str) -> Result<(), PredictorError> {
        if from.is_empty() || to.is_empty() {
            warn!("Rejected link with empty node id ({:?} -> {:?})", from, to);
            return Err(PredictorError::EmptyNodeId);
        }
        if self.config.require_registered_nodes {
            for id in [from, to] {
                if !self.registry.contains(id) {
                    warn!("Rejected link for unregistered node {}", id);
                    return Err(PredictorError::UnknownNode(id.to_string()));
                }
            }
        }
        Ok(())
    }

    fn recompute_entropy(&mut self) {
        self.entropy = mean_entropy(self.estimator.probabilities());
    }

    /// Copy the current estimate for `from -> to` and the topology-wide
    /// entropy into the published snapshot. Clones the snapshot only if a
    /// reader still holds it.
    fn publish_link(&mut self, from: &str, to: &str) {
        let key = ConnectionKey::new(from, to);
        let estimate = self.estimator.get(from, to).cloned();
        let entropy = self.entropy;
        if let Some(published) = self.snapshot.as_mut() {
            let snapshot = Arc::make_mut(published);
            match estimate {
                Some(estimate) => {
                    snapshot.connections.insert(key, estimate);
                }
                None => {
                    snapshot.connections.remove(&key);
                }
            }
            snapshot.entropy = entropy;
            snapshot.confidence = confidence_from_entropy(entropy);
        }
    }

    fn publish_node(&mut self, id: &str) {
        let node = self.registry.get(id).cloned();
        if let Some(published) = self.snapshot.as_mut() {
            let snapshot = Arc::make_mut(published);
            match node {
                Some(node) => {
                    snapshot.nodes.insert(id.to_string(), node);
                }
                None => {
                    snapshot.nodes.remove(id);
                }
            }
        }
    }

    /// Drop links not observed within `max_age_ms` of `now`.
    /// Returns how many were removed.
    pub fn expire_stale_connections(&mut self, max_age_ms: u64, now: u64) -> usize {
        let cutoff = now.saturating_sub(max_age_ms);
        let removed = self
            .estimator
            .retain(|_, estimate| estimate.last_observed >= cutoff);
        if removed > 0 {
            self.recompute_entropy();
            if let Some(published) = self.snapshot.as_mut() {
                let timestamp = published.timestamp;
                *published = Arc::new(TopologySnapshot::capture(
                    &self.registry,
                    &self.estimator,
                    timestamp,
                ));
            }
            debug!("Expired {} stale link(s)", removed);
        }
        removed
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Prune confidently-absent links and publish a new snapshot
    pub fn resolve_topology(&mut self) -> Arc<TopologySnapshot> {
        self.resolve_topology_at(current_timestamp())
    }

    fn resolve_topology_at(&mut self, now: u64) -> Arc<TopologySnapshot> {
        let pruned = prune_absent_links(&mut self.estimator, &self.config);
        self.recompute_entropy();

        let snapshot = Arc::new(TopologySnapshot::capture(
            &self.registry,
            &self.estimator,
            now,
        ));
        debug!(
            "Resolved topology: {} link(s), {} pruned, entropy {:.4}",
            snapshot.connections.len(),
            pruned,
            snapshot.entropy
        );
        self.snapshot = Some(snapshot.clone());
        snapshot
    }

    /// Published snapshot, `None` until the first resolution pass
    pub fn topology(&self) -> Option<Arc<TopologySnapshot>> {
        self.snapshot.clone()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Does `from -> to` probably exist? Never blocks, never fails.
    pub fn predict_connection(&self, from: &str, to: &str) -> ConnectionPrediction {
        let estimate = self
            .snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.connection(from, to));
        match estimate {
            Some(estimate) => ConnectionPrediction {
                exists: estimate.exists(self.config.existence_threshold),
                probability: estimate.probability,
                confidence: estimate.confidence,
            },
            None => ConnectionPrediction::UNKNOWN,
        }
    }

    /// Raw estimate for a link, whether or not a snapshot exists yet
    pub fn connection(&self, from: &str, to: &str) -> Option<&ConnectionEstimate> {
        self.estimator.get(from, to)
    }

    /// Cheapest expected path between two nodes, `None` if there is none
    pub fn calculate_optimal_path(&self, source: &str, destination: &str) -> Option<OptimalPath> {
        let snapshot = self.snapshot.as_ref()?;
        self.solver
            .solve(&self.registry, &snapshot.connections, source, destination)
    }

    pub fn metrics(&self) -> TopologyMetrics {
        TopologyMetrics {
            nodes: self.registry.len(),
            connections: self.estimator.len(),
            entropy: self.entropy,
            confidence: confidence_from_entropy(self.entropy),
            observations: self.observations,
        }
    }

    // ------------------------------------------------------------------------
    // Anticipatory cache
    // ------------------------------------------------------------------------

    /// Start keeping a path for `source -> destination`, computing it now
    pub fn anticipate_route(&mut self, source: &str, destination: &str) {
        let path = self.calculate_optimal_path(source, destination);
        if path.is_none() {
            debug!("No path yet for anticipated route {} -> {}", source, destination);
        }
        self.cache.anticipate(source, destination, path);
    }

    /// Cached path for an anticipated route. Never computes.
    pub fn get_path(&self, source: &str, destination: &str) -> Option<&OptimalPath> {
        self.cache.get(source, destination)
    }

    /// Recompute every anticipated route against the published snapshot
    pub fn refresh_paths(&mut self) -> RefreshReport {
        let solver = &self.solver;
        let registry = &self.registry;
        let snapshot = self.snapshot.as_deref();
        let report = self.cache.refresh(|src, dst| {
            snapshot.and_then(|s| solver.solve(registry, &s.connections, src, dst))
        });
        debug!(
            "Refreshed {} anticipated route(s), {} unreachable",
            report.refreshed,
            report.unreachable.len()
        );
        report
    }

    pub fn forget_route(&mut self, source: &str, destination: &str) -> bool {
        self.cache.forget(source, destination)
    }

    pub fn anticipated_routes(&self) -> Vec<RouteKey> {
        self.cache.anticipated().cloned().collect()
    }
}

// ============================================================================
// SHARED HANDLE
// ============================================================================

/// Cloneable, thread-safe predictor handle.
///
/// Writers (`observe`, `add_node`, resolution, cache refresh) serialize on the
/// write lock so concurrent read-modify-write updates are never lost. Readers
/// share the read lock; `topology()` hands out the immutable published
/// snapshot, which stays valid after the lock is released.
#[derive(Debug, Clone, Default)]
pub struct SharedPredictor {
    inner: Arc<RwLock<TopologyPredictor>>,
}

impl SharedPredictor {
    pub fn new(predictor: TopologyPredictor) -> Self {
        Self {
            inner: Arc::new(RwLock::new(predictor)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, TopologyPredictor> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, TopologyPredictor> {
        self.inner.write()
    }

    pub fn add_node(&self, node: Node) -> Result<(), PredictorError> {
        self.inner.write().add_node(node)
    }

    pub fn observe(
        &self,
        from: &str,
        to: &str,
        success: bool,
        metadata: Option<ObservationMetadata>,
    ) -> Result<(), PredictorError> {
        self.inner.write().observe(from, to, success, metadata)
    }

    pub fn predict_connection(&self, from: &str, to: &str) -> ConnectionPrediction {
        self.inner.read().predict_connection(from, to)
    }

    pub fn calculate_optimal_path(&self, source: &str, destination: &str) -> Option<OptimalPath> {
        self.inner.read().calculate_optimal_path(source, destination)
    }

    pub fn resolve_topology(&self) -> Arc<TopologySnapshot> {
        self.inner.write().resolve_topology()
    }

    pub fn topology(&self) -> Option<Arc<TopologySnapshot>> {
        self.inner.read().topology()
    }

    pub fn metrics(&self) -> TopologyMetrics {
        self.inner.read().metrics()
    }

    pub fn bootstrap_discovery(&self, local_address: &str) -> Arc<TopologySnapshot> {
        self.inner.write().bootstrap_discovery(local_address)
    }

    /// Discovery runs without holding the lock
    pub async fn bootstrap_with(
        &self,
        provider: &dyn DiscoveryProvider,
        local_address: &str,
    ) -> Arc<TopologySnapshot> {
        let discovered = provider.discover(local_address).await;
        self.inner
            .write()
            .register_discovered(local_address, discovered)
    }

    pub fn anticipate_route(&self, source: &str, destination: &str) {
        self.inner.write().anticipate_route(source, destination)
    }

    pub fn get_path(&self, source: &str, destination: &str) -> Option<OptimalPath> {
        self.inner.read().get_path(source, destination).cloned()
    }

    pub fn refresh_paths(&self) -> RefreshReport {
        self.inner.write().refresh_paths()
    }
}
