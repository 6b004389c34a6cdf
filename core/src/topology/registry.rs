//! Node Registry
//!
//! Metadata about nodes the caller knows of. Nodes only ever enter through
//! `add_node` (or bootstrap); observing a link never registers its endpoints.

use crate::PredictorError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Caller-chosen node identifier
pub type NodeId = String;

/// A known node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Transport address, opaque to the core
    pub address: String,
    /// Last time the caller heard from this node (ms since epoch)
    pub last_seen: u64,
    /// Caller-assessed reliability (0.0 = never answers, 1.0 = always)
    pub reliability: f64,
    pub capabilities: BTreeSet<String>,
    pub latency_ms: Option<f64>,
    pub bandwidth: Option<f64>,
}

impl Node {
    /// Create a node with neutral reliability and no capabilities
    pub fn new(id: impl Into<NodeId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            last_seen: crate::current_timestamp(),
            reliability: 0.5,
            capabilities: BTreeSet::new(),
            latency_ms: None,
            bandwidth: None,
        }
    }

    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability.clamp(0.0, 1.0);
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_bandwidth(mut self, bandwidth: f64) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }
}

/// Id the bootstrap pass gives the local node
pub const LOCAL_NODE_ID: &str = "local";

/// All nodes the predictor knows by id
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeId, Node>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a node by id
    pub fn add(&mut self, node: Node) -> Result<(), PredictorError> {
        if node.id.is_empty() {
            return Err(PredictorError::EmptyNodeId);
        }
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Insert or overwrite the fully reliable self-node at `address`
    pub fn register_local(&mut self, address: &str) -> &Node {
        let local = Node::new(LOCAL_NODE_ID, address).with_reliability(1.0);
        self.nodes.insert(LOCAL_NODE_ID.to_string(), local);
        &self.nodes[LOCAL_NODE_ID]
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Node> {
        self.nodes.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Copy of the registry contents for a snapshot
    pub fn to_map(&self) -> BTreeMap<NodeId, Node> {
        self.nodes.clone()
    }
}
