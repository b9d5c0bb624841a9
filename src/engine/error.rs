// SPDX-License-Identifier: MIT

//! Typed error handling for flowline
//!
//! Validation problems, upstream failures and authoring errors are kept as
//! structured data so callers can point at the exact node or field involved.

use serde::Serialize;
use thiserror::Error;

use super::graph::{ConnectorKind, EdgeId, NodeId, NodeKind};

/// Top-level error type for flowline
#[derive(Debug, Error)]
pub enum FlowError {
    /// Configuration errors (bad env vars, unparsable relay URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Flow document errors (duplicate keys, dangling edges)
    #[error("Flow document error: {0}")]
    Document(String),

    /// Graph mutation errors
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl FlowError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a document error
    pub fn document(message: impl Into<String>) -> Self {
        Self::Document(message.into())
    }
}

/// Errors raised by the authoring operations on a `FlowGraph`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} not found")]
    UnknownNode(NodeId),

    #[error("edge {0} not found")]
    UnknownEdge(EdgeId),

    /// A patch tried to set a field the node's kind does not have
    #[error("field '{field}' does not apply to node {node_id}")]
    FieldNotApplicable { node_id: NodeId, field: &'static str },

    /// A patch tried to switch a connector kind on an action (or vice versa)
    #[error("node {node_id} is not a {expected} node")]
    KindMismatch { node_id: NodeId, expected: NodeKind },
}

/// A reason a graph is not runnable
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum Problem {
    /// Nodes that lie on at least one cycle, ascending
    #[error("graph has a cycle through nodes {}", join_ids(.nodes))]
    GraphHasCycle { nodes: Vec<NodeId> },

    /// An action without an inbound connector of the kind it targets
    #[error("action '{label}' ({node_id}) needs a {required} connector connection")]
    UnwiredAction {
        node_id: NodeId,
        label: String,
        required: ConnectorKind,
    },

    #[error("node {node_id} is missing required fields: {}", .missing_fields.join(", "))]
    IncompleteConfig {
        node_id: NodeId,
        missing_fields: Vec<&'static str>,
    },
}

impl Problem {
    /// The nodes this problem is about
    pub fn node_ids(&self) -> Vec<NodeId> {
        match self {
            Problem::GraphHasCycle { nodes } => nodes.clone(),
            Problem::UnwiredAction { node_id, .. } | Problem::IncompleteConfig { node_id, .. } => {
                vec![*node_id]
            }
        }
    }
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure reported by the connector invocation boundary.
///
/// Never fatal to a run: the failing node is logged and execution moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{}", describe_upstream(.status, .message))]
pub struct UpstreamError {
    /// HTTP status when the upstream answered at all
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    /// The upstream answered with a non-success status
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// The upstream could not be reached or answered garbage
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

fn describe_upstream(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("HTTP error! status: {}: {}", status, message),
        None => message.to_string(),
    }
}

/// Errors returned instead of starting a run
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("another run is already in progress")]
    ConcurrentRunRejected,
}
