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

//! A generic node+edge container with a Kahn-style topological sort. Only
//! *strong* edges are ever stored here - weak links never reach the DAG at
//! all, which is what lets them close a logical cycle without the scheduler
//! seeing one.

use std::collections::HashSet;

/// Directed, acyclic-by-construction graph over node identities of type `N`.
/// "Acyclic by construction" means `add_edge` never rejects an edge that
/// would create a cycle - the scheduler finds out about a cycle the same way
/// Kahn's algorithm always does, by `topological_sort` coming back short.
#[derive(Clone, Debug, Default)]
pub struct DirectedAcyclicGraph<N: Eq + std::hash::Hash + Copy + Ord> {
    nodes: Vec<N>,
    node_set: HashSet<N>,
    edges: std::collections::BTreeMap<N, Vec<N>>,
}

impl<N: Eq + std::hash::Hash + Copy + Ord> DirectedAcyclicGraph<N> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            node_set: HashSet::new(),
            edges: std::collections::BTreeMap::new(),
        }
    }

    pub fn contains_node(&self, node: N) -> bool {
        self.node_set.contains(&node)
    }

    pub fn add_node(&mut self, node: N) {
        assert!(
            self.node_set.insert(node),
            "node already present in the graph"
        );
        self.nodes.push(node);
        self.edges.entry(node).or_default();
    }

    /// Removes `node` and every edge incident to it (incoming or outgoing).
    pub fn remove_node(&mut self, node: N) {
        assert!(self.node_set.remove(&node), "node not present in the graph");
        self.nodes.retain(|&n| n != node);
        self.edges.remove(&node);
        for targets in self.edges.values_mut() {
            targets.retain(|&n| n != node);
        }
    }

    /// Adds a directed edge `from -> to`. Returns `false` (no-op) if the edge
    /// already existed.
    pub fn add_edge(&mut self, from: N, to: N) -> bool {
        let targets = self.edges.entry(from).or_default();
        if targets.contains(&to) {
            false
        } else {
            targets.push(to);
            true
        }
    }

    /// Removes a directed edge `from -> to`. Returns `true` if it existed.
    pub fn remove_edge(&mut self, from: N, to: N) -> bool {
        if let Some(targets) = self.edges.get_mut(&from) {
            let before = targets.len();
            targets.retain(|&n| n != to);
            before != targets.len()
        } else {
            false
        }
    }

    pub fn has_edge(&self, from: N, to: N) -> bool {
        self.edges
            .get(&from)
            .map(|targets| targets.contains(&to))
            .unwrap_or(false)
    }

    /// Kahn's algorithm. Insertion order of nodes breaks ties among nodes with
    /// equal in-degree, so the result is deterministic given a fixed sequence
    /// of `add_node` calls, but no particular tie-break order is guaranteed by
    /// contract beyond "non-weak-linked pairs stay in source-before-target
    /// order".
    pub fn topological_sort(&self) -> Option<Vec<N>> {
        let mut in_degree: std::collections::HashMap<N, usize> =
            self.nodes.iter().map(|&n| (n, 0)).collect();
        for targets in self.edges.values() {
            for &to in targets {
                *in_degree.entry(to).or_insert(0) += 1;
            }
        }

        let mut queue: Vec<N> = self
            .nodes
            .iter()
            .copied()
            .filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0)
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());
        let mut cursor = 0;
        while cursor < queue.len() {
            let n = queue[cursor];
            cursor += 1;
            sorted.push(n);
            if let Some(targets) = self.edges.get(&n) {
                for &to in targets {
                    let degree = in_degree.get_mut(&to).expect("edge target must be a node");
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push(to);
                    }
                }
            }
        }

        if sorted.len() == self.nodes.len() {
            Some(sorted)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn linear_chain_sorts_in_order() {
        let mut dag = DirectedAcyclicGraph::new();
        dag.add_node(1u64);
        dag.add_node(2);
        dag.add_node(3);
        dag.add_edge(1, 2);
        dag.add_edge(2, 3);
        assert_eq!(dag.topological_sort(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn cycle_is_detected() {
        let mut dag = DirectedAcyclicGraph::new();
        dag.add_node(1u64);
        dag.add_node(2);
        dag.add_edge(1, 2);
        dag.add_edge(2, 1);
        assert_eq!(dag.topological_sort(), None);
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut dag = DirectedAcyclicGraph::new();
        dag.add_node(1u64);
        dag.add_node(2);
        dag.add_edge(1, 2);
        dag.remove_node(1);
        assert!(!dag.has_edge(1, 2));
        assert_eq!(dag.topological_sort(), Some(vec![2]));
    }

    #[test]
    fn add_edge_reports_whether_it_is_new() {
        let mut dag = DirectedAcyclicGraph::new();
        dag.add_node(1u64);
        dag.add_node(2);
        assert!(dag.add_edge(1, 2));
        assert!(!dag.add_edge(1, 2));
    }
}
