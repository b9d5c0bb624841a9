// SPDX-License-Identifier: MIT

//! Deterministic execution ordering
//!
//! Kahn's algorithm over the edge set. Ties are broken by ascending node id,
//! both when seeding the queue and when releasing successors, so the order
//! depends only on the graph's content and never on edge insertion order.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use super::error::Problem;
use super::graph::{FlowGraph, GraphIndex, NodeId};

/// The graph could not be fully ordered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleDetected {
    /// Nodes lying on at least one cycle, ascending
    pub nodes: Vec<NodeId>,
}

impl From<CycleDetected> for Problem {
    fn from(cycle: CycleDetected) -> Self {
        Problem::GraphHasCycle { nodes: cycle.nodes }
    }
}

/// Topological order of every node in `graph`.
///
/// For every edge `(s, t)`, `s` precedes `t` in the result. If some nodes
/// cannot be ordered, no partial order is returned; the error names the
/// nodes that sit on cycles.
pub fn order(graph: &FlowGraph) -> Result<Vec<NodeId>, CycleDetected> {
    let index = graph.index();

    let mut in_degree: BTreeMap<NodeId, usize> = graph
        .node_ids()
        .map(|id| (id, index.in_degree(id)))
        .collect();

    let mut queue: VecDeque<NodeId> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());

    while let Some(id) = queue.pop_front() {
        order.push(id);

        let mut targets: Vec<NodeId> = index.out_edges(id).iter().map(|e| e.target).collect();
        targets.sort();

        for target in targets {
            if let Some(degree) = in_degree.get_mut(&target) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(target);
                }
            }
        }
    }

    if order.len() == graph.node_count() {
        log::debug!("Execution order: {:?}", order);
        return Ok(order);
    }

    let scheduled: HashSet<NodeId> = order.iter().copied().collect();
    let remaining: BTreeSet<NodeId> = graph
        .node_ids()
        .filter(|id| !scheduled.contains(id))
        .collect();

    let nodes = nodes_on_cycles(&index, &remaining);
    log::debug!(
        "{} nodes could not be ordered, cycle members: {:?}",
        remaining.len(),
        nodes
    );
    Err(CycleDetected { nodes })
}

/// Members of non-trivial strongly connected components (or self-loops)
/// among the nodes Kahn's algorithm left behind.
///
/// The remainder also holds nodes that merely sit downstream of a cycle;
/// those are not reported.
fn nodes_on_cycles(index: &GraphIndex<'_>, remaining: &BTreeSet<NodeId>) -> Vec<NodeId> {
    let successors: BTreeMap<NodeId, Vec<NodeId>> = remaining
        .iter()
        .map(|&id| {
            let targets = index
                .successors(id)
                .into_iter()
                .filter(|target| remaining.contains(target))
                .collect();
            (id, targets)
        })
        .collect();

    let mut predecessors: BTreeMap<NodeId, Vec<NodeId>> =
        remaining.iter().map(|&id| (id, Vec::new())).collect();
    for (&source, targets) in &successors {
        for target in targets {
            if let Some(sources) = predecessors.get_mut(target) {
                sources.push(source);
            }
        }
    }

    // Kosaraju, first pass: finishing order on the forward graph
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut finished: Vec<NodeId> = Vec::with_capacity(remaining.len());
    for &start in remaining {
        if !visited.insert(start) {
            continue;
        }
        let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
        while let Some(top) = stack.last_mut() {
            let (node, position) = *top;
            let next = successors
                .get(&node)
                .and_then(|targets| targets.get(position))
                .copied();
            match next {
                Some(target) => {
                    top.1 += 1;
                    if visited.insert(target) {
                        stack.push((target, 0));
                    }
                }
                None => {
                    finished.push(node);
                    stack.pop();
                }
            }
        }
    }

    // Second pass: components on the reversed graph
    let mut assigned: HashSet<NodeId> = HashSet::new();
    let mut on_cycle: Vec<NodeId> = Vec::new();
    for &root in finished.iter().rev() {
        if !assigned.insert(root) {
            continue;
        }
        let mut component = vec![root];
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let sources = predecessors.get(&node).map(|v| v.as_slice()).unwrap_or(&[]);
            for &source in sources {
                if assigned.insert(source) {
                    component.push(source);
                    stack.push(source);
                }
            }
        }

        let self_loop = successors
            .get(&root)
            .is_some_and(|targets| targets.contains(&root));
        if component.len() > 1 || self_loop {
            on_cycle.extend(component);
        }
    }

    on_cycle.sort();
    on_cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::{ActionConfig, ActionKind, ConnectorConfig, ConnectorKind};

    fn action(graph: &mut FlowGraph) -> NodeId {
        graph.add_node(ActionConfig::empty(ActionKind::GetWeather))
    }

    fn assert_topological(graph: &FlowGraph, order: &[NodeId]) {
        assert_eq!(order.len(), graph.node_count());
        let position = |id: NodeId| order.iter().position(|n| *n == id).unwrap();
        for edge in graph.edges() {
            assert!(
                position(edge.source) < position(edge.target),
                "edge {} -> {} out of order in {:?}",
                edge.source,
                edge.target,
                order
            );
        }
    }

    #[test]
    fn test_empty_graph() {
        assert_eq!(order(&FlowGraph::new()), Ok(vec![]));
    }

    #[test]
    fn test_connector_before_action() {
        let mut graph = FlowGraph::new();
        let g = action(&mut graph);
        let w = graph.add_node(ConnectorConfig::empty(ConnectorKind::Weather));
        graph.add_edge(w, g).unwrap();

        assert_eq!(order(&graph), Ok(vec![w, g]));
    }

    #[test]
    fn test_ties_break_by_ascending_id() {
        let mut graph = FlowGraph::new();
        let a = action(&mut graph);
        let b = action(&mut graph);
        let c = action(&mut graph);
        let d = action(&mut graph);
        // d feeds a; b and c are free
        graph.add_edge(d, a).unwrap();

        assert_eq!(order(&graph), Ok(vec![b, c, d, a]));
    }

    #[test]
    fn test_edge_insertion_order_does_not_matter() {
        let build = |reverse: bool| {
            let mut graph = FlowGraph::new();
            let root = action(&mut graph);
            let x = action(&mut graph);
            let y = action(&mut graph);
            let z = action(&mut graph);
            let mut edges = vec![(root, z), (root, x), (root, y)];
            if reverse {
                edges.reverse();
            }
            for (s, t) in edges {
                graph.add_edge(s, t).unwrap();
            }
            order(&graph).unwrap()
        };

        assert_eq!(build(false), build(true));
    }

    #[test]
    fn test_diamond_and_parallel_edges() {
        let mut graph = FlowGraph::new();
        let a = action(&mut graph);
        let b = action(&mut graph);
        let c = action(&mut graph);
        let d = action(&mut graph);
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, c).unwrap();
        graph.add_edge(b, d).unwrap();
        graph.add_edge(c, d).unwrap();
        graph.add_edge(c, d).unwrap();

        let result = order(&graph).unwrap();
        assert_topological(&graph, &result);
        assert_eq!(result, vec![a, b, c, d]);
    }

    #[test]
    fn test_order_is_deterministic() {
        let mut graph = FlowGraph::new();
        let nodes: Vec<NodeId> = (0..8).map(|_| action(&mut graph)).collect();
        for (s, t) in [(7, 0), (5, 1), (0, 3), (2, 3), (1, 6), (4, 6)] {
            graph.add_edge(nodes[s], nodes[t]).unwrap();
        }

        let first = order(&graph).unwrap();
        assert_topological(&graph, &first);
        assert_eq!(first, order(&graph).unwrap());
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut graph = FlowGraph::new();
        let g = action(&mut graph);
        graph.add_edge(g, g).unwrap();

        assert_eq!(order(&graph), Err(CycleDetected { nodes: vec![g] }));
    }

    #[test]
    fn test_cycle_excludes_downstream_nodes() {
        let mut graph = FlowGraph::new();
        let entry = action(&mut graph);
        let a = action(&mut graph);
        let b = action(&mut graph);
        let tail = action(&mut graph);
        graph.add_edge(entry, a).unwrap();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, a).unwrap();
        graph.add_edge(b, tail).unwrap();

        let err = order(&graph).unwrap_err();
        assert_eq!(err.nodes, vec![a, b]);
    }

    #[test]
    fn test_two_separate_cycles() {
        let mut graph = FlowGraph::new();
        let a = action(&mut graph);
        let b = action(&mut graph);
        let bridge = action(&mut graph);
        let c = action(&mut graph);
        let d = action(&mut graph);
        graph.add_edge(a, b).unwrap();
        graph.add_edge(b, a).unwrap();
        graph.add_edge(b, bridge).unwrap();
        graph.add_edge(bridge, c).unwrap();
        graph.add_edge(c, d).unwrap();
        graph.add_edge(d, c).unwrap();

        let err = order(&graph).unwrap_err();
        assert_eq!(err.nodes, vec![a, b, c, d]);
        assert_eq!(
            Problem::from(err),
            Problem::GraphHasCycle {
                nodes: vec![a, b, c, d]
            }
        );
    }
}
