// SPDX-License-Identifier: MIT

//! The flow graph and its authoring operations

use std::collections::BTreeMap;

use super::index::GraphIndex;
use super::types::{
    ActionConfig, ConfigPatch, ConnectorConfig, Edge, EdgeId, Node, NodeConfig, NodeId, NodeKind,
};
use crate::engine::error::GraphError;

/// Nodes keyed by id plus an ordered edge list.
///
/// Mutated only by the authoring surface; every engine component reads it.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    nodes: BTreeMap<NodeId, Node>,
    edges: Vec<Edge>,
    next_node_id: u64,
    next_edge_id: u64,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node labelled after its kind
    pub fn add_node(&mut self, config: impl Into<NodeConfig>) -> NodeId {
        self.insert_node(None, config.into())
    }

    pub fn add_labeled_node(
        &mut self,
        label: impl Into<String>,
        config: impl Into<NodeConfig>,
    ) -> NodeId {
        self.insert_node(Some(label.into()), config.into())
    }

    fn insert_node(&mut self, label: Option<String>, config: NodeConfig) -> NodeId {
        self.next_node_id += 1;
        let id = NodeId(self.next_node_id);
        self.nodes.insert(id, Node::new(id, label, config));
        id
    }

    /// Remove a node together with every edge touching it
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.edges
            .retain(|edge| edge.source != id && edge.target != id);
        Some(node)
    }

    /// Connect two existing nodes. Self-loops are accepted here and reported
    /// as cycles by validation.
    pub fn add_edge(&mut self, source: NodeId, target: NodeId) -> Result<EdgeId, GraphError> {
        for endpoint in [source, target] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(GraphError::UnknownNode(endpoint));
            }
        }

        self.next_edge_id += 1;
        let id = EdgeId(self.next_edge_id);
        self.edges.push(Edge { id, source, target });
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge, GraphError> {
        let position = self
            .edges
            .iter()
            .position(|edge| edge.id == id)
            .ok_or(GraphError::UnknownEdge(id))?;
        Ok(self.edges.remove(position))
    }

    /// Apply a partial config update. Either the whole patch applies or the
    /// node is left untouched.
    pub fn update_node_config(&mut self, id: NodeId, patch: ConfigPatch) -> Result<(), GraphError> {
        let node = self.nodes.get(&id).ok_or(GraphError::UnknownNode(id))?;
        let config = match &node.config {
            NodeConfig::Connector(config) => {
                if patch.action_kind.is_some() {
                    return Err(GraphError::KindMismatch {
                        node_id: id,
                        expected: NodeKind::Action,
                    });
                }
                NodeConfig::Connector(patch_connector(id, config, &patch)?)
            }
            NodeConfig::Action(config) => {
                if patch.connector_kind.is_some() {
                    return Err(GraphError::KindMismatch {
                        node_id: id,
                        expected: NodeKind::Connector,
                    });
                }
                NodeConfig::Action(patch_action(id, config, &patch)?)
            }
        };

        if let Some(node) = self.nodes.get_mut(&id) {
            node.config = config;
            if let Some(label) = patch.label {
                node.label = label;
            }
        }
        Ok(())
    }

    /// All nodes in ascending id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Edges in insertion order
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    /// Edges ending at `id`; empty for unknown ids
    pub fn in_edges(&self, id: NodeId) -> Vec<&Edge> {
        self.edges.iter().filter(|edge| edge.target == id).collect()
    }

    /// Edges starting at `id`; empty for unknown ids
    pub fn out_edges(&self, id: NodeId) -> Vec<&Edge> {
        self.edges.iter().filter(|edge| edge.source == id).collect()
    }

    /// Nodes adjacent to `id` in either direction, ascending, without `id` itself
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let mut neighbors: Vec<NodeId> = self
            .edges
            .iter()
            .filter_map(|edge| {
                if edge.source == id {
                    Some(edge.target)
                } else if edge.target == id {
                    Some(edge.source)
                } else {
                    None
                }
            })
            .filter(|other| *other != id)
            .collect();
        neighbors.sort();
        neighbors.dedup();
        neighbors
    }

    /// Build in/out adjacency once for a validation or scheduling pass
    pub fn index(&self) -> GraphIndex<'_> {
        GraphIndex::new(self)
    }
}

fn patch_connector(
    id: NodeId,
    current: &ConnectorConfig,
    patch: &ConfigPatch,
) -> Result<ConnectorConfig, GraphError> {
    let mut config = match patch.connector_kind {
        Some(kind) if kind != current.kind() => {
            let api_key = current.api_key().to_string();
            let mut fresh = ConnectorConfig::empty(kind);
            set_api_key(&mut fresh, api_key);
            fresh
        }
        _ => current.clone(),
    };

    if patch.city.is_some() {
        return Err(not_applicable(id, "city"));
    }
    if patch.filter.is_some() {
        return Err(not_applicable(id, "filter"));
    }
    if let Some(api_key) = &patch.api_key {
        set_api_key(&mut config, api_key.clone());
    }

    match &mut config {
        ConnectorConfig::IssueTracker {
            base_url, username, ..
        } => {
            if let Some(value) = &patch.base_url {
                *base_url = value.clone();
            }
            if let Some(value) = &patch.username {
                *username = value.clone();
            }
            if patch.channel.is_some() {
                return Err(not_applicable(id, "channel"));
            }
        }
        ConnectorConfig::Chat { channel, .. } => {
            if patch.base_url.is_some() {
                return Err(not_applicable(id, "base_url"));
            }
            if patch.username.is_some() {
                return Err(not_applicable(id, "username"));
            }
            if let Some(value) = &patch.channel {
                *channel = Some(value.clone()).filter(|c| !c.trim().is_empty());
            }
        }
        ConnectorConfig::Weather { .. } => {
            if patch.base_url.is_some() {
                return Err(not_applicable(id, "base_url"));
            }
            if patch.username.is_some() {
                return Err(not_applicable(id, "username"));
            }
            if patch.channel.is_some() {
                return Err(not_applicable(id, "channel"));
            }
        }
    }

    Ok(config)
}

fn set_api_key(config: &mut ConnectorConfig, value: String) {
    match config {
        ConnectorConfig::Weather { api_key }
        | ConnectorConfig::IssueTracker { api_key, .. }
        | ConnectorConfig::Chat { api_key, .. } => *api_key = value,
    }
}

fn patch_action(
    id: NodeId,
    current: &ActionConfig,
    patch: &ConfigPatch,
) -> Result<ActionConfig, GraphError> {
    let mut config = match patch.action_kind {
        Some(kind) if kind != current.kind() => ActionConfig::empty(kind),
        _ => current.clone(),
    };

    for (field, value) in [
        ("api_key", &patch.api_key),
        ("base_url", &patch.base_url),
        ("username", &patch.username),
    ] {
        if value.is_some() {
            return Err(not_applicable(id, field));
        }
    }

    match &mut config {
        ActionConfig::GetWeather { city } => {
            reject(id, "channel", &patch.channel)?;
            reject(id, "filter", &patch.filter)?;
            if let Some(value) = &patch.city {
                *city = value.clone();
            }
        }
        ActionConfig::FetchIssues { filter } => {
            reject(id, "channel", &patch.channel)?;
            reject(id, "city", &patch.city)?;
            if let Some(value) = &patch.filter {
                *filter = value.clone();
            }
        }
        ActionConfig::SendMessage { channel } => {
            reject(id, "city", &patch.city)?;
            reject(id, "filter", &patch.filter)?;
            if let Some(value) = &patch.channel {
                *channel = value.clone();
            }
        }
    }

    Ok(config)
}

fn reject(id: NodeId, field: &'static str, value: &Option<String>) -> Result<(), GraphError> {
    match value {
        Some(_) => Err(not_applicable(id, field)),
        None => Ok(()),
    }
}

fn not_applicable(node_id: NodeId, field: &'static str) -> GraphError {
    GraphError::FieldNotApplicable { node_id, field }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::types::{ActionKind, ConnectorKind};

    fn weather_connector() -> ConnectorConfig {
        ConnectorConfig::Weather {
            api_key: "k".to_string(),
        }
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(weather_connector());
        let b = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));
        assert!(graph.remove_node(b).is_some());
        let c = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));

        assert_eq!(a, NodeId(1));
        assert_ne!(b, c);
        assert_eq!(c, NodeId(3));
    }

    #[test]
    fn test_add_edge_rejects_missing_endpoint() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(weather_connector());

        assert_eq!(
            graph.add_edge(a, NodeId(42)),
            Err(GraphError::UnknownNode(NodeId(42)))
        );
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let mut graph = FlowGraph::new();
        let w = graph.add_node(weather_connector());
        let g = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));
        let other = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));
        graph.add_edge(w, g).unwrap();
        let kept = graph.add_edge(w, other).unwrap();

        graph.remove_node(g);

        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].id, kept);
        assert!(graph.in_edges(g).is_empty());
    }

    #[test]
    fn test_remove_edge_keeps_nodes() {
        let mut graph = FlowGraph::new();
        let w = graph.add_node(weather_connector());
        let g = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));
        let edge = graph.add_edge(w, g).unwrap();

        let removed = graph.remove_edge(edge).unwrap();
        assert_eq!((removed.source, removed.target), (w, g));
        assert_eq!(graph.remove_edge(edge), Err(GraphError::UnknownEdge(edge)));
        assert!(graph.edges().is_empty());
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_structural_queries() {
        let mut graph = FlowGraph::new();
        let w = graph.add_node(weather_connector());
        let g = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));
        let s = graph.add_node(ActionConfig::empty(ActionKind::SendMessage));
        graph.add_edge(w, g).unwrap();
        graph.add_edge(g, s).unwrap();
        graph.add_edge(s, g).unwrap();

        assert_eq!(graph.in_edges(g).len(), 2);
        assert_eq!(graph.out_edges(g).len(), 1);
        assert_eq!(graph.neighbors(g), vec![w, s]);
        assert!(graph.in_edges(NodeId(99)).is_empty());
        assert!(graph.node(NodeId(99)).is_none());
    }

    #[test]
    fn test_switch_connector_kind_keeps_api_key() {
        let mut graph = FlowGraph::new();
        let c = graph.add_node(weather_connector());

        graph
            .update_node_config(
                c,
                ConfigPatch {
                    connector_kind: Some(ConnectorKind::IssueTracker),
                    base_url: Some("https://tracker.example".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let config = graph.node(c).unwrap().as_connector().unwrap();
        assert_eq!(config.kind(), ConnectorKind::IssueTracker);
        assert_eq!(config.api_key(), "k");
        assert_eq!(config.missing_fields(), vec!["username"]);
    }

    #[test]
    fn test_patch_is_atomic() {
        let mut graph = FlowGraph::new();
        let g = graph.add_node(ActionConfig::GetWeather {
            city: "Paris".to_string(),
        });

        let result = graph.update_node_config(
            g,
            ConfigPatch {
                city: Some("Oslo".to_string()),
                channel: Some("#general".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(
            result,
            Err(GraphError::FieldNotApplicable {
                node_id: g,
                field: "channel"
            })
        );
        assert_eq!(
            graph.node(g).unwrap().as_action(),
            Some(&ActionConfig::GetWeather {
                city: "Paris".to_string()
            })
        );
    }

    #[test]
    fn test_patch_rejects_kind_switch_on_wrong_node() {
        let mut graph = FlowGraph::new();
        let g = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));

        let result = graph.update_node_config(
            g,
            ConfigPatch {
                connector_kind: Some(ConnectorKind::Chat),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(GraphError::KindMismatch { .. })));
    }

    #[test]
    fn test_patch_label_and_action_kind() {
        let mut graph = FlowGraph::new();
        let a = graph.add_node(ActionConfig::empty(ActionKind::GetWeather));

        graph
            .update_node_config(
                a,
                ConfigPatch {
                    label: Some("Notify".to_string()),
                    action_kind: Some(ActionKind::SendMessage),
                    channel: Some("#ops".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let node = graph.node(a).unwrap();
        assert_eq!(node.label, "Notify");
        assert_eq!(
            node.as_action(),
            Some(&ActionConfig::SendMessage {
                channel: "#ops".to_string()
            })
        );
    }
}
