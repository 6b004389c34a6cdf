//! Path Solver
//!
//! Minimum expected-cost paths over the link model. Each directed link costs
//!
//! ```text
//! cost(u, v) = (1 - p(u, v)) * probability_weight + latency(u, v) / latency_divisor
//! ```
//!
//! so an unlikely link is expensive even when it is fast. Search is Dijkstra
//! with strict relaxation: when two routes tie, the one discovered first wins.
//! Adjacency is built from the ordered link map, which makes discovery order,
//! and therefore every tie, deterministic.
//!
//! The path's `total_probability` multiplies link probabilities, i.e. it
//! assumes links fail independently of each other.
//!
//! When `max_alternatives > 0`, Yen's algorithm supplies the next-cheapest
//! loopless paths as `alternatives`.

use super::config::PredictorConfig;
use super::estimator::{ConnectionEstimate, ConnectionKey};
use super::registry::{NodeId, NodeRegistry};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet};

/// One hop of a path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: NodeId,
    pub to: NodeId,
    pub probability: f64,
    /// Estimated latency, or the configured default when never measured
    pub latency: f64,
    /// Estimated bandwidth, or the configured default when never measured
    pub bandwidth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalPath {
    pub source: NodeId,
    pub destination: NodeId,
    pub segments: Vec<Segment>,
    /// Probability every link on the path exists
    pub total_probability: f64,
    pub total_latency: f64,
    /// Bottleneck bandwidth, 0 for a path with no segments
    pub min_bandwidth: f64,
    /// Same value as `total_probability`
    pub reliability: f64,
    /// Next-best loopless paths, cheapest first
    pub alternatives: Vec<OptimalPath>,
}

impl OptimalPath {
    pub fn hop_count(&self) -> usize {
        self.segments.len()
    }

    /// Node ids from source to destination
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.source.as_str()];
        ids.extend(self.segments.iter().map(|s| s.to.as_str()));
        ids
    }
}

#[derive(Debug, Clone)]
struct Edge {
    to: usize,
    cost: f64,
    probability: f64,
    latency: f64,
    bandwidth: f64,
}

/// Index-based view of the link map for one search
struct Graph<'a> {
    ids: Vec<&'a str>,
    index: BTreeMap<&'a str, usize>,
    adjacency: Vec<Vec<Edge>>,
}

impl<'a> Graph<'a> {
    fn edge(&self, from: usize, to: usize) -> Option<&Edge> {
        self.adjacency[from].iter().find(|e| e.to == to)
    }

    fn path_cost(&self, path: &[usize]) -> f64 {
        path.windows(2)
            .filter_map(|w| self.edge(w[0], w[1]))
            .map(|e| e.cost)
            .sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct QueueEntry {
    cost: f64,
    seq: u64,
    node: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // BinaryHeap is a max-heap: invert so the cheapest, earliest entry pops first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Computes optimal paths; holds only cost parameters, no topology
#[derive(Debug, Clone)]
pub struct PathSolver {
    probability_weight: f64,
    latency_divisor: f64,
    default_latency: f64,
    default_bandwidth: f64,
    max_alternatives: usize,
}

impl PathSolver {
    pub fn new(config: &PredictorConfig) -> Self {
        Self {
            probability_weight: config.probability_weight,
            latency_divisor: config.latency_divisor,
            default_latency: config.default_latency_ms,
            default_bandwidth: config.default_bandwidth,
            max_alternatives: config.max_alternatives,
        }
    }

    pub fn with_max_alternatives(mut self, max_alternatives: usize) -> Self {
        self.max_alternatives = max_alternatives;
        self
    }

    /// Blended probability/latency cost of traversing one link; lower is better
    pub fn edge_cost(&self, estimate: &ConnectionEstimate) -> f64 {
        let latency = estimate.latency_estimate.unwrap_or(self.default_latency);
        (1.0 - estimate.probability) * self.probability_weight + latency / self.latency_divisor
    }

    /// Cheapest path from `source` to `destination`.
    ///
    /// Nodes are everything in the registry plus every endpoint of a known
    /// link. `None` when either end is unknown or the destination is
    /// unreachable.
    pub fn solve(
        &self,
        registry: &NodeRegistry,
        connections: &BTreeMap<ConnectionKey, ConnectionEstimate>,
        source: &str,
        destination: &str,
    ) -> Option<OptimalPath> {
        let graph = self.build_graph(registry, connections);
        let src = *graph.index.get(source)?;
        let dst = *graph.index.get(destination)?;

        let no_edges = HashSet::new();
        let no_nodes = vec![false; graph.ids.len()];
        let best = shortest_path(&graph, src, dst, &no_edges, &no_nodes)?;

        let alternatives = if self.max_alternatives > 0 && src != dst {
            yen_alternatives(&graph, &best, dst, self.max_alternatives)
                .iter()
                .map(|path| self.to_path(&graph, path, Vec::new()))
                .collect()
        } else {
            Vec::new()
        };

        Some(self.to_path(&graph, &best, alternatives))
    }

    fn build_graph<'a>(
        &self,
        registry: &'a NodeRegistry,
        connections: &'a BTreeMap<ConnectionKey, ConnectionEstimate>,
    ) -> Graph<'a> {
        let mut names: BTreeSet<&'a str> = registry.ids().map(String::as_str).collect();
        for key in connections.keys() {
            names.insert(key.from.as_str());
            names.insert(key.to.as_str());
        }

        let ids: Vec<&'a str> = names.into_iter().collect();
        let index: BTreeMap<&'a str, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut adjacency = vec![Vec::new(); ids.len()];

        for (key, estimate) in connections {
            let from = index[key.from.as_str()];
            let to = index[key.to.as_str()];
            adjacency[from].push(Edge {
                to,
                cost: self.edge_cost(estimate),
                probability: estimate.probability,
                latency: estimate.latency_estimate.unwrap_or(self.default_latency),
                bandwidth: estimate.bandwidth_estimate.unwrap_or(self.default_bandwidth),
            });
        }

        Graph {
            ids,
            index,
            adjacency,
        }
    }

    fn to_path(&self, graph: &Graph<'_>, nodes: &[usize], alternatives: Vec<OptimalPath>) -> OptimalPath {
        let segments: Vec<Segment> = nodes
            .windows(2)
            .filter_map(|w| {
                graph.edge(w[0], w[1]).map(|edge| Segment {
                    from: graph.ids[w[0]].to_string(),
                    to: graph.ids[w[1]].to_string(),
                    probability: edge.probability,
                    latency: edge.latency,
                    bandwidth: edge.bandwidth,
                })
            })
            .collect();

        let total_probability = segments.iter().fold(1.0, |acc, s| acc * s.probability);
        let total_latency = segments.iter().map(|s| s.latency).sum();
        let min_bandwidth = if segments.is_empty() {
            0.0
        } else {
            segments
                .iter()
                .map(|s| s.bandwidth)
                .fold(f64::INFINITY, f64::min)
        };

        OptimalPath {
            source: graph.ids[nodes[0]].to_string(),
            destination: graph.ids[nodes[nodes.len() - 1]].to_string(),
            segments,
            total_probability,
            total_latency,
            min_bandwidth,
            reliability: total_probability,
            alternatives,
        }
    }
}

/// Dijkstra from `src` to `dst`, skipping banned links and nodes.
/// Returns the node sequence, source first.
fn shortest_path(
    graph: &Graph<'_>,
    src: usize,
    dst: usize,
    banned_edges: &HashSet<(usize, usize)>,
    banned_nodes: &[bool],
) -> Option<Vec<usize>> {
    let n = graph.ids.len();
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    dist[src] = 0.0;
    heap.push(QueueEntry {
        cost: 0.0,
        seq,
        node: src,
    });

    while let Some(QueueEntry { cost, node, .. }) = heap.pop() {
        if settled[node] {
            continue;
        }
        settled[node] = true;
        if node == dst {
            break;
        }

        for edge in &graph.adjacency[node] {
            if banned_nodes[edge.to] || banned_edges.contains(&(node, edge.to)) {
                continue;
            }
            let candidate = cost + edge.cost;
            if candidate < dist[edge.to] {
                dist[edge.to] = candidate;
                prev[edge.to] = Some(node);
                seq += 1;
                heap.push(QueueEntry {
                    cost: candidate,
                    seq,
                    node: edge.to,
                });
            }
        }
    }

    if !settled[dst] {
        return None;
    }

    let mut path = vec![dst];
    let mut current = dst;
    while let Some(p) = prev[current] {
        path.push(p);
        current = p;
    }
    path.reverse();
    Some(path)
}

/// Yen's k-shortest loopless paths after `best`, cheapest first
fn yen_alternatives(graph: &Graph<'_>, best: &[usize], dst: usize, k: usize) -> Vec<Vec<usize>> {
    let mut accepted: Vec<Vec<usize>> = vec![best.to_vec()];
    let mut candidates: Vec<(f64, Vec<usize>)> = Vec::new();

    while accepted.len() <= k {
        let last = accepted[accepted.len() - 1].clone();

        for i in 0..last.len().saturating_sub(1) {
            let spur = last[i];
            let root = &last[..=i];

            let mut banned_edges = HashSet::new();
            for path in &accepted {
                if path.len() > i + 1 && path[..=i] == *root {
                    banned_edges.insert((path[i], path[i + 1]));
                }
            }
            let mut banned_nodes = vec![false; graph.ids.len()];
            for &node in &root[..i] {
                banned_nodes[node] = true;
            }

            if let Some(spur_path) = shortest_path(graph, spur, dst, &banned_edges, &banned_nodes) {
                let mut full = root[..i].to_vec();
                full.extend(spur_path);
                let known = accepted.contains(&full) || candidates.iter().any(|(_, p)| *p == full);
                if !known {
                    candidates.push((graph.path_cost(&full), full));
                }
            }
        }

        // First cheapest candidate wins ties, matching the primary search
        let Some(pos) = candidates
            .iter()
            .enumerate()
            .min_by(|(ia, a), (ib, b)| a.0.total_cmp(&b.0).then(ia.cmp(ib)))
            .map(|(i, _)| i)
        else {
            break;
        };
        accepted.push(candidates.remove(pos).1);
    }

    accepted.into_iter().skip(1).collect()
}
