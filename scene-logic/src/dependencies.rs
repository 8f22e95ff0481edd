// Copyright (c) 2024-present the scene-logic contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.

//! Owns the node DAG and its topological-sort cache. Link *validation* and
//! the property-level link/unlink bookkeeping live on [`crate::engine::Engine`]
//! - they need simultaneous access to two nodes' property arenas, which this
//! type has no business knowing about. What lives here is purely the node
//! graph: which nodes exist, which strong edges connect them, and the cached
//! order, invalidated only by structural change.

use crate::dag::DirectedAcyclicGraph;
use crate::error::{LogicError, LogicResult};
use crate::ids::NodeId;

#[derive(Default)]
pub struct LogicNodeDependencies {
    dag: DirectedAcyclicGraph<NodeId>,
    cached_sort: Option<Vec<NodeId>>,
}

impl LogicNodeDependencies {
    pub fn new() -> Self {
        Self {
            dag: DirectedAcyclicGraph::new(),
            cached_sort: None,
        }
    }

    pub fn add_node(&mut self, id: NodeId) {
        self.dag.add_node(id);
        // A new, unlinked node can simply be appended to any cached order
        // without invalidating it - it has no edges yet, so it can't violate
        // the relative order of anything already sorted.
        if let Some(sorted) = &mut self.cached_sort {
            sorted.push(id);
        }
    }

    /// Removes `id` from the graph. Per the source this is modeled on, this
    /// patches the cached sort in place (dropping `id` from it) rather than
    /// forcing a full resort - the relative order of the remaining nodes is
    /// preserved, even though no particular order is promised for nodes that
    /// aren't linked to each other.
    pub fn remove_node(&mut self, id: NodeId) {
        self.dag.remove_node(id);
        if let Some(sorted) = &mut self.cached_sort {
            sorted.retain(|&n| n != id);
        }
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.dag.contains_node(id)
    }

    /// Adds a strong edge `from -> to`. Invalidates the cached sort only if
    /// the edge is new.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        if self.dag.add_edge(from, to) {
            self.cached_sort = None;
        }
    }

    /// Removes a strong edge `from -> to`. Invalidates the cached sort only
    /// if the edge existed.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) {
        if self.dag.remove_edge(from, to) {
            self.cached_sort = None;
        }
    }

    pub fn has_edge(&self, from: NodeId, to: NodeId) -> bool {
        self.dag.has_edge(from, to)
    }

    /// Returns the cached order if clean, recomputing it via a Kahn-style
    /// sort on a topology change. Fails if a cycle exists through non-weak
    /// edges (weak edges never reach this graph in the first place).
    pub fn get_topologically_sorted_nodes(&mut self) -> LogicResult<&[NodeId]> {
        if self.cached_sort.is_none() {
            let sorted = self
                .dag
                .topological_sort()
                .ok_or_else(|| LogicError::runtime("dependency graph contains a cycle"))?;
            self.cached_sort = Some(sorted);
        }
        Ok(self.cached_sort.as_deref().unwrap())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn removing_a_node_preserves_order_of_the_rest() {
        let mut deps = LogicNodeDependencies::new();
        deps.add_node(1);
        deps.add_node(2);
        deps.add_node(3);
        deps.add_edge(1, 2);
        deps.add_edge(2, 3);
        assert_eq!(deps.get_topologically_sorted_nodes().unwrap(), &[1, 2, 3]);
        deps.remove_node(2);
        assert_eq!(deps.get_topologically_sorted_nodes().unwrap(), &[1, 3]);
    }

    #[test]
    fn sort_cache_is_coherent_after_mutation() {
        let mut deps = LogicNodeDependencies::new();
        deps.add_node(1);
        deps.add_node(2);
        deps.add_edge(1, 2);
        let first = deps.get_topologically_sorted_nodes().unwrap().to_vec();
        deps.add_node(3);
        deps.add_edge(2, 3);
        let second = deps.get_topologically_sorted_nodes().unwrap().to_vec();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![1, 2, 3]);
    }

    #[test]
    fn cycle_through_strong_edges_fails() {
        let mut deps = LogicNodeDependencies::new();
        deps.add_node(1);
        deps.add_node(2);
        deps.add_edge(1, 2);
        deps.add_edge(2, 1);
        assert!(deps.get_topologically_sorted_nodes().is_err());
    }
}
