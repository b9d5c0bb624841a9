// SPDX-License-Identifier: MIT

//! Graph model
//!
//! Typed nodes and edges plus the `FlowGraph` that owns them. Beyond the
//! authoring operations it only answers structural queries.

mod flow_graph;
mod index;
mod types;

pub use flow_graph::FlowGraph;
pub use index::GraphIndex;
pub use types::{
    ActionConfig, ActionKind, ConfigPatch, ConnectorConfig, ConnectorKind, Edge, EdgeId, Node,
    NodeConfig, NodeId, NodeKind,
};
