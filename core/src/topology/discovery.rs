//! Discovery seam
//!
//! The core does not discover anything itself. Hosts plug in whatever finds
//! nodes on their network (mDNS, ARP sweep, a bootstrap list) by implementing
//! `DiscoveryProvider`; `TopologyPredictor::bootstrap_with` registers what it
//! returns.

use super::registry::Node;
use async_trait::async_trait;

#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Nodes reachable from `local_address`, as far as this provider can tell
    async fn discover(&self, local_address: &str) -> Vec<Node>;
}

/// Serves a fixed node list, e.g. seed nodes from a config file
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    nodes: Vec<Node>,
}

impl StaticDiscovery {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl DiscoveryProvider for StaticDiscovery {
    async fn discover(&self, _local_address: &str) -> Vec<Node> {
        self.nodes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_discovery_returns_list() {
        let provider = StaticDiscovery::new(vec![
            Node::new("seed-1", "10.0.0.1:9000"),
            Node::new("seed-2", "10.0.0.2:9000"),
        ]);
        let nodes = futures::executor::block_on(provider.discover("10.0.0.9:9000"));
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "seed-1");
    }
}
