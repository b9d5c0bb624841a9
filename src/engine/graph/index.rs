//! Precomputed adjacency for one validation, scheduling or execution pass

use std::collections::HashMap;

use super::flow_graph::FlowGraph;
use super::types::{ActionConfig, ConnectorConfig, Edge, Node, NodeId};

/// In/out edge lists per node, built once in O(nodes + edges).
///
/// Edge lists keep the graph's edge insertion order.
pub struct GraphIndex<'g> {
    graph: &'g FlowGraph,
    incoming: HashMap<NodeId, Vec<&'g Edge>>,
    outgoing: HashMap<NodeId, Vec<&'g Edge>>,
}

impl<'g> GraphIndex<'g> {
    pub(crate) fn new(graph: &'g FlowGraph) -> Self {
        let mut incoming: HashMap<NodeId, Vec<&'g Edge>> = HashMap::new();
        let mut outgoing: HashMap<NodeId, Vec<&'g Edge>> = HashMap::new();

        for id in graph.node_ids() {
            incoming.entry(id).or_default();
            outgoing.entry(id).or_default();
        }

        for edge in graph.edges() {
            outgoing.entry(edge.source).or_default().push(edge);
            incoming.entry(edge.target).or_default().push(edge);
        }

        Self {
            graph,
            incoming,
            outgoing,
        }
    }

    pub fn graph(&self) -> &'g FlowGraph {
        self.graph
    }

    pub fn in_edges(&self, id: NodeId) -> &[&'g Edge] {
        self.incoming.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn out_edges(&self, id: NodeId) -> &[&'g Edge] {
        self.outgoing.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Number of edges ending at `id`, counting parallel edges
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.in_edges(id).len()
    }

    /// Distinct successors of `id`, ascending
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        let mut targets: Vec<NodeId> = self.out_edges(id).iter().map(|e| e.target).collect();
        targets.sort();
        targets.dedup();
        targets
    }

    /// The connector an action runs through: the source of the first inbound
    /// edge (in edge order) that comes from a connector of the kind the
    /// action targets.
    pub fn qualifying_connector(&self, action_id: NodeId) -> Option<(&'g Node, &'g ConnectorConfig)> {
        let required = self.graph.node(action_id)?.as_action()?.kind().target();

        self.in_edges(action_id).iter().find_map(|edge| {
            let source = self.graph.node(edge.source)?;
            let connector = source.as_connector()?;
            (connector.kind() == required).then_some((source, connector))
        })
    }

    /// Actions feeding into a connector node, in edge order
    pub fn upstream_actions(&self, connector_id: NodeId) -> Vec<(&'g Node, &'g ActionConfig)> {
        self.in_edges(connector_id)
            .iter()
            .filter_map(|edge| {
                let source = self.graph.node(edge.source)?;
                source.as_action().map(|action| (source, action))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::types::{ActionKind, ConnectorKind};

    #[test]
    fn test_qualifying_connector_skips_wrong_kind() {
        let mut graph = FlowGraph::new();
        let chat = graph.add_node(ConnectorConfig::empty(ConnectorKind::Chat));
        let weather = graph.add_node(ConnectorConfig::empty(ConnectorKind::Weather));
        let action = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));
        graph.add_edge(chat, action).unwrap();
        graph.add_edge(weather, action).unwrap();

        let index = graph.index();
        let (node, config) = index.qualifying_connector(action).unwrap();
        assert_eq!(node.id, weather);
        assert_eq!(config.kind(), ConnectorKind::Weather);
    }

    #[test]
    fn test_qualifying_connector_requires_action() {
        let mut graph = FlowGraph::new();
        let weather = graph.add_node(ConnectorConfig::empty(ConnectorKind::Weather));
        assert!(graph.index().qualifying_connector(weather).is_none());
        assert!(graph.index().qualifying_connector(NodeId(7)).is_none());
    }

    #[test]
    fn test_successors_are_sorted_and_distinct() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(ConnectorConfig::empty(ConnectorKind::Weather));
        let b = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));
        let c = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));
        graph.add_edge(a, c).unwrap();
        graph.add_edge(a, b).unwrap();
        graph.add_edge(a, c).unwrap();

        let index = graph.index();
        assert_eq!(index.successors(a), vec![b, c]);
        assert_eq!(index.in_degree(c), 2);
        assert!(index.out_edges(NodeId(99)).is_empty());
    }

    #[test]
    fn test_upstream_actions() {
        let mut graph = FlowGraph::new();
        let tracker = graph.add_node(ConnectorConfig::empty(ConnectorKind::IssueTracker));
        let fetch = graph.add_node(ActionConfig::empty(ActionKind::FetchIssues));
        let chat = graph.add_node(ConnectorConfig::empty(ConnectorKind::Chat));
        graph.add_edge(tracker, fetch).unwrap();
        graph.add_edge(tracker, chat).unwrap();
        graph.add_edge(fetch, chat).unwrap();

        let index = graph.index();
        let upstream = index.upstream_actions(chat);
        assert_eq!(upstream.len(), 1);
        assert_eq!(upstream[0].0.id, fetch);
    }
}
