//! Dependency graph over resource ids
//!
//! Edges point from a dependency to its dependent, so a topological order is
//! a valid provisioning order and its reverse a valid teardown order.

use crate::error::{ConfigError, Result};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index_map: HashMap<String, NodeIndex>,
    /// Insertion order for deterministic tie-breaking
    insertion_order: Vec<NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource node. Adding the same id twice is a no-op.
    pub fn add_resource(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index_map.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.index_map.insert(id.to_string(), idx);
        self.insertion_order.push(idx);
        idx
    }

    /// Record that `resource` depends on `dependency`
    pub fn add_dependency(&mut self, resource: &str, dependency: &str) -> Result<()> {
        let to = self.node(resource)?;
        let from = self
            .index_map
            .get(dependency)
            .copied()
            .ok_or_else(|| ConfigError::UnknownDependency {
                resource: resource.to_string(),
                dependency: dependency.to_string(),
            })?;
        self.graph.add_edge(from, to, ());
        Ok(())
    }

    fn node(&self, id: &str) -> Result<NodeIndex> {
        self.index_map
            .get(id)
            .copied()
            .ok_or_else(|| ConfigError::InvalidConfig(format!("unknown resource '{}'", id)))
    }

    fn position(&self, idx: NodeIndex) -> usize {
        self.insertion_order
            .iter()
            .position(|&i| i == idx)
            .unwrap_or(usize::MAX)
    }

    /// Kahn's algorithm; nodes that become ready together are emitted in
    /// insertion order.
    pub fn toposort(&self) -> Result<Vec<String>> {
        let node_count = self.graph.node_count();
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| (idx, 0))
            .collect();
        for edge in self.graph.edge_references() {
            *in_degree.entry(edge.target()).or_insert(0) += 1;
        }

        let mut queue: VecDeque<NodeIndex> = self
            .insertion_order
            .iter()
            .filter(|idx| in_degree.get(idx).copied().unwrap_or(0) == 0)
            .copied()
            .collect();

        let mut result = Vec::with_capacity(node_count);
        while let Some(idx) = queue.pop_front() {
            result.push(self.graph[idx].clone());

            let mut neighbors: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(idx, Direction::Outgoing)
                .collect();
            neighbors.sort_by_key(|n| self.position(*n));
            neighbors.dedup();

            for neighbor in neighbors {
                // parallel edges are possible when a dependency is listed twice
                let edges = self.graph.edges_connecting(idx, neighbor).count();
                if let Some(deg) = in_degree.get_mut(&neighbor) {
                    *deg = deg.saturating_sub(edges);
                    if *deg == 0 {
                        queue.push_back(neighbor);
                    }
                }
            }
        }

        if result.len() != node_count {
            let stuck: Vec<String> = self
                .insertion_order
                .iter()
                .filter(|idx| in_degree.get(idx).copied().unwrap_or(0) > 0)
                .map(|&idx| self.graph[idx].clone())
                .collect();
            return Err(ConfigError::CircularDependency(stuck.join(" -> ")));
        }

        Ok(result)
    }
}
