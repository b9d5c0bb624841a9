//! Flow document loader - YAML/JSON flow definitions
//!
//! Documents refer to nodes by string keys; `into_graph` turns them into a
//! `FlowGraph` with engine-assigned ids.

use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::engine::error::FlowError;
use crate::engine::graph::{FlowGraph, NodeConfig, NodeId};

/// A flow as written on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub edges: Vec<EdgeDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeDocument {
    /// Document-local name used by edges
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Either `connector: {kind, ...}` or `action: {kind, ...}`
    #[serde(flatten)]
    pub config: NodeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EdgeDocument {
    pub from: String,
    pub to: String,
}

/// A document turned into a graph, with the key of every node
#[derive(Debug, Clone)]
pub struct LoadedFlow {
    pub name: String,
    pub graph: FlowGraph,
    pub keys: BTreeMap<String, NodeId>,
}

impl LoadedFlow {
    pub fn node_id(&self, key: &str) -> Option<NodeId> {
        self.keys.get(key).copied()
    }

    /// Reverse lookup for display
    pub fn key_of(&self, id: NodeId) -> Option<&str> {
        self.keys
            .iter()
            .find(|(_, node)| **node == id)
            .map(|(key, _)| key.as_str())
    }
}

impl FlowDocument {
    /// Build the graph. Nodes get ids in document order.
    pub fn into_graph(self) -> Result<LoadedFlow, FlowError> {
        let mut graph = FlowGraph::new();
        let mut keys: BTreeMap<String, NodeId> = BTreeMap::new();

        for node in self.nodes {
            if node.key.trim().is_empty() {
                return Err(FlowError::document("node key must not be empty"));
            }
            if keys.contains_key(&node.key) {
                return Err(FlowError::document(format!(
                    "duplicate node key '{}'",
                    node.key
                )));
            }
            let id = match node.label {
                Some(label) => graph.add_labeled_node(label, node.config),
                None => graph.add_node(node.config),
            };
            keys.insert(node.key, id);
        }

        for edge in &self.edges {
            let lookup = |key: &str| {
                keys.get(key).copied().ok_or_else(|| {
                    FlowError::document(format!(
                        "edge {} -> {} names unknown node '{}'",
                        edge.from, edge.to, key
                    ))
                })
            };
            let source = lookup(&edge.from)?;
            let target = lookup(&edge.to)?;
            graph.add_edge(source, target)?;
        }

        log::debug!(
            "Loaded flow '{}' with {} nodes and {} edges",
            self.name,
            graph.node_count(),
            graph.edges().len()
        );

        Ok(LoadedFlow {
            name: self.name,
            graph,
            keys,
        })
    }

    /// JSON Schema of the document format
    pub fn schema() -> RootSchema {
        schemars::schema_for!(FlowDocument)
    }
}

/// Short listing entry for a stored flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowSummary {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Loads flow documents from files
pub struct FlowLoader;

impl FlowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a document, picking the format from the file extension
    /// (`.json` is JSON, anything else YAML)
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<FlowDocument, FlowError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&content),
            _ => Self::parse_yaml(&content),
        }
    }

    pub fn parse_yaml(content: &str) -> Result<FlowDocument, FlowError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn parse_json(content: &str) -> Result<FlowDocument, FlowError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Every readable flow document in `dir`, sorted by id
    pub fn list<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<FlowSummary>, FlowError> {
        let mut flows = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(id) = flow_id(&path) else {
                continue;
            };
            match self.load(&path) {
                Ok(doc) => flows.push(FlowSummary {
                    id,
                    name: doc.name,
                    description: doc.description,
                }),
                Err(e) => log::warn!("Skipping flow {}: {}", path.display(), e),
            }
        }
        flows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(flows)
    }

    /// Find the document with the given id (file stem) in `dir`
    pub fn find<P: AsRef<Path>>(&self, dir: P, id: &str) -> Result<Option<PathBuf>, FlowError> {
        if !is_valid_id(id) {
            return Err(FlowError::document(format!("invalid flow id '{}'", id)));
        }
        let dir = dir.as_ref();
        Ok(["yaml", "yml", "json"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", id, ext)))
            .find(|path| path.is_file()))
    }
}

impl Default for FlowLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn flow_id(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !matches!(ext, "yaml" | "yml" | "json") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    is_valid_id(stem).then(|| stem.to_string())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
