//! Topology Snapshot and the resolution pass
//!
//! A snapshot combines the registry and the link estimates with the
//! topology-wide entropy. A resolution pass captures a fresh one; between
//! passes the predictor copies each changed link into it on write, so an
//! `Arc<TopologySnapshot>` already handed to a reader never changes.
//!
//! Resolution is where the continuous model turns decisive: once a link has
//! enough evidence (per-edge confidence above the decisive threshold) and
//! still looks unlikely, it is dropped as "does not exist". Links without
//! enough evidence are never touched.

use super::config::PredictorConfig;
use super::entropy::{confidence_from_entropy, mean_entropy};
use super::estimator::{ConnectionEstimate, ConnectionEstimator, ConnectionKey};
use super::registry::{Node, NodeId, NodeRegistry};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySnapshot {
    pub nodes: BTreeMap<NodeId, Node>,
    #[serde(serialize_with = "serialize_connections")]
    pub connections: BTreeMap<ConnectionKey, ConnectionEstimate>,
    /// Mean binary entropy over all links (0 when there are none)
    pub entropy: f64,
    /// `1 - entropy`
    pub confidence: f64,
    /// Time of the resolution pass that produced it (ms since epoch)
    pub timestamp: u64,
}

impl TopologySnapshot {
    /// Copy the current registry and estimates into a new snapshot
    pub fn capture(registry: &NodeRegistry, estimator: &ConnectionEstimator, now: u64) -> Self {
        let entropy = mean_entropy(estimator.probabilities());
        Self {
            nodes: registry.to_map(),
            connections: estimator.connections().clone(),
            entropy,
            confidence: confidence_from_entropy(entropy),
            timestamp: now,
        }
    }

    pub fn connection(&self, from: &str, to: &str) -> Option<&ConnectionEstimate> {
        self.connections.get(&ConnectionKey::new(from, to))
    }

    /// Equal in everything but the timestamp
    pub fn same_contents(&self, other: &TopologySnapshot) -> bool {
        self.nodes == other.nodes
            && self.connections == other.connections
            && self.entropy == other.entropy
            && self.confidence == other.confidence
    }
}

/// Drop links that are confidently absent.
///
/// A link is removed when its per-edge confidence is above
/// `decisive_confidence` and its probability is below `existence_threshold`.
/// Returns the number of links removed.
pub fn prune_absent_links(estimator: &mut ConnectionEstimator, config: &PredictorConfig) -> usize {
    estimator.retain(|_, estimate| {
        estimate.confidence <= config.decisive_confidence
            || estimate.probability >= config.existence_threshold
    })
}

#[derive(Serialize)]
struct ConnectionEntry<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(flatten)]
    estimate: &'a ConnectionEstimate,
}

// JSON object keys must be strings, so links go out as a list of entries
fn serialize_connections<S>(
    connections: &BTreeMap<ConnectionKey, ConnectionEstimate>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(connections.iter().map(|(key, estimate)| ConnectionEntry {
        from: &key.from,
        to: &key.to,
        estimate,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::estimator::ConnectionEstimate;

    fn estimator_with(entries: &[(&str, &str, f64, f64)]) -> ConnectionEstimator {
        let config = PredictorConfig::default();
        let mut est = ConnectionEstimator::new(&config);
        for (from, to, p, c) in entries {
            est.insert(
                ConnectionKey::new(*from, *to),
                ConnectionEstimate::seeded(*p, *c, 20, 0).unwrap(),
            );
        }
        est
    }

    #[test]
    fn test_prune_rule_boundaries() {
        let mut est = estimator_with(&[
            ("a", "b", 0.69, 0.55), // confident and unlikely: pruned
            ("a", "c", 0.70, 0.55), // at threshold: kept
            ("a", "d", 0.10, 0.50), // not confident enough: kept
            ("a", "e", 0.10, 1.00), // pruned
        ]);
        let removed = prune_absent_links(&mut est, &PredictorConfig::default());
        assert_eq!(removed, 2);
        assert!(est.get("a", "b").is_none());
        assert!(est.get("a", "c").is_some());
        assert!(est.get("a", "d").is_some());
        assert!(est.get("a", "e").is_none());
    }

    #[test]
    fn test_capture_computes_entropy() {
        let est = estimator_with(&[("a", "b", 0.5, 0.2), ("b", "c", 1.0, 1.0)]);
        let snapshot = TopologySnapshot::capture(&NodeRegistry::new(), &est, 42);
        assert!((snapshot.entropy - 0.5).abs() < 1e-12);
        assert!((snapshot.confidence - 0.5).abs() < 1e-12);
        assert_eq!(snapshot.timestamp, 42);
        assert!(snapshot.connection("a", "b").is_some());
        assert!(snapshot.connection("b", "a").is_none());
    }

    #[test]
    fn test_empty_snapshot() {
        let est = estimator_with(&[]);
        let snapshot = TopologySnapshot::capture(&NodeRegistry::new(), &est, 5);
        assert_eq!(snapshot.entropy, 0.0);
        assert_eq!(snapshot.confidence, 1.0);
        let later = TopologySnapshot::capture(&NodeRegistry::new(), &est, 9);
        assert!(snapshot.same_contents(&later));
    }

    #[test]
    fn test_serializes_connections_as_list() {
        let est = estimator_with(&[("a", "b", 0.8, 0.5)]);
        let snapshot = TopologySnapshot::capture(&NodeRegistry::new(), &est, 0);
        let json = serde_json::to_value(&snapshot).unwrap();
        let links = json["connections"].as_array().unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0]["from"], "a");
        assert_eq!(links[0]["to"], "b");
        assert_eq!(links[0]["probability"], 0.8);
    }
}
