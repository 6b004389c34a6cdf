//! Anticipatory Routing Cache
//!
//! Holds paths for routes the caller has said it will need. Entries are
//! written when a route is first anticipated and rewritten only by an explicit
//! refresh; new observations never invalidate them. Reads never compute.

use super::solver::OptimalPath;
use super::registry::NodeId;
use std::collections::{BTreeSet, HashMap};

/// `(source, destination)` of an anticipated route
pub type RouteKey = (NodeId, NodeId);

/// Outcome of a refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Routes with a freshly computed path
    pub refreshed: usize,
    /// Routes with no path right now (their stale entries were dropped)
    pub unreachable: Vec<RouteKey>,
}

#[derive(Debug, Clone, Default)]
pub struct AnticipatoryCache {
    anticipated: BTreeSet<RouteKey>,
    paths: HashMap<RouteKey, OptimalPath>,
}

impl AnticipatoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route and store its first path, if there is one
    pub fn anticipate(&mut self, source: &str, destination: &str, path: Option<OptimalPath>) {
        let key = (source.to_string(), destination.to_string());
        self.anticipated.insert(key.clone());
        if let Some(path) = path {
            self.paths.insert(key, path);
        }
    }

    pub fn get(&self, source: &str, destination: &str) -> Option<&OptimalPath> {
        self.paths.get(&(source.to_string(), destination.to_string()))
    }

    /// Recompute every anticipated route with `compute`
    pub fn refresh<F>(&mut self, mut compute: F) -> RefreshReport
    where
        F: FnMut(&str, &str) -> Option<OptimalPath>,
    {
        let mut report = RefreshReport::default();
        for key in &self.anticipated {
            match compute(&key.0, &key.1) {
                Some(path) => {
                    self.paths.insert(key.clone(), path);
                    report.refreshed += 1;
                }
                None => {
                    self.paths.remove(key);
                    report.unreachable.push(key.clone());
                }
            }
        }
        report
    }

    /// Stop anticipating a route; returns whether it was registered
    pub fn forget(&mut self, source: &str, destination: &str) -> bool {
        let key = (source.to_string(), destination.to_string());
        self.paths.remove(&key);
        self.anticipated.remove(&key)
    }

    pub fn anticipated(&self) -> impl Iterator<Item = &RouteKey> {
        self.anticipated.iter()
    }
}
