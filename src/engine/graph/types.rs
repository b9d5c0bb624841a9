//! Node, edge and configuration types
//!
//! Node kind, connector kind and action kind are closed enums so every
//! dispatch site matches them exhaustively.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable node identifier, never reused within a graph
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable edge identifier, independent of node ids
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Connector,
    Action,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Connector => write!(f, "Connector"),
            NodeKind::Action => write!(f, "Action"),
        }
    }
}

/// The external service a connector node holds credentials for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ConnectorKind {
    Weather,
    #[serde(alias = "Jira")]
    IssueTracker,
    #[serde(alias = "Slack")]
    Chat,
}

impl ConnectorKind {
    pub const ALL: [ConnectorKind; 3] = [
        ConnectorKind::Weather,
        ConnectorKind::IssueTracker,
        ConnectorKind::Chat,
    ];

    /// Credential fields that must be filled in before a run
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            ConnectorKind::Weather => &["api_key"],
            ConnectorKind::IssueTracker => &["base_url", "username", "api_key"],
            ConnectorKind::Chat => &["api_key"],
        }
    }

    /// Actions that can run through this connector
    pub fn actions(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|action| action.target() == *self)
            .collect()
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorKind::Weather => write!(f, "Weather"),
            ConnectorKind::IssueTracker => write!(f, "IssueTracker"),
            ConnectorKind::Chat => write!(f, "Chat"),
        }
    }
}

/// An operation performed through a connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ActionKind {
    GetWeather,
    FetchIssues,
    SendMessage,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [
        ActionKind::GetWeather,
        ActionKind::FetchIssues,
        ActionKind::SendMessage,
    ];

    /// The connector kind this action must be wired to
    pub fn target(&self) -> ConnectorKind {
        match self {
            ActionKind::GetWeather => ConnectorKind::Weather,
            ActionKind::FetchIssues => ConnectorKind::IssueTracker,
            ActionKind::SendMessage => ConnectorKind::Chat,
        }
    }

    /// Whether the action forwards an earlier action's output as its payload
    pub fn forwards_upstream(&self) -> bool {
        matches!(self, ActionKind::SendMessage)
    }

    /// Human-readable name, also the default node label
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::GetWeather => "Get Weather",
            ActionKind::FetchIssues => "Fetch Issues",
            ActionKind::SendMessage => "Send Message",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Credentials and settings of a connector node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum ConnectorConfig {
    Weather {
        #[serde(default)]
        api_key: String,
    },
    #[serde(alias = "Jira")]
    IssueTracker {
        #[serde(default)]
        base_url: String,
        #[serde(default)]
        username: String,
        #[serde(default)]
        api_key: String,
    },
    #[serde(alias = "Slack")]
    Chat {
        #[serde(default)]
        api_key: String,
        /// Channel used when the action does not name one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
}

impl ConnectorConfig {
    /// An unfilled config of the given kind, as created on the canvas
    pub fn empty(kind: ConnectorKind) -> Self {
        match kind {
            ConnectorKind::Weather => ConnectorConfig::Weather {
                api_key: String::new(),
            },
            ConnectorKind::IssueTracker => ConnectorConfig::IssueTracker {
                base_url: String::new(),
                username: String::new(),
                api_key: String::new(),
            },
            ConnectorKind::Chat => ConnectorConfig::Chat {
                api_key: String::new(),
                channel: None,
            },
        }
    }

    pub fn kind(&self) -> ConnectorKind {
        match self {
            ConnectorConfig::Weather { .. } => ConnectorKind::Weather,
            ConnectorConfig::IssueTracker { .. } => ConnectorKind::IssueTracker,
            ConnectorConfig::Chat { .. } => ConnectorKind::Chat,
        }
    }

    pub fn api_key(&self) -> &str {
        match self {
            ConnectorConfig::Weather { api_key }
            | ConnectorConfig::IssueTracker { api_key, .. }
            | ConnectorConfig::Chat { api_key, .. } => api_key,
        }
    }

    /// Default channel of a chat connector, if one is set
    pub fn default_channel(&self) -> Option<&str> {
        match self {
            ConnectorConfig::Chat { channel, .. } => {
                channel.as_deref().filter(|c| !c.trim().is_empty())
            }
            _ => None,
        }
    }

    /// Required credential fields that are still blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self {
            ConnectorConfig::Weather { api_key } => {
                if is_blank(api_key) {
                    missing.push("api_key");
                }
            }
            ConnectorConfig::IssueTracker {
                base_url,
                username,
                api_key,
            } => {
                if is_blank(base_url) {
                    missing.push("base_url");
                }
                if is_blank(username) {
                    missing.push("username");
                }
                if is_blank(api_key) {
                    missing.push("api_key");
                }
            }
            ConnectorConfig::Chat { api_key, .. } => {
                if is_blank(api_key) {
                    missing.push("api_key");
                }
            }
        }
        missing
    }
}

/// Parameters of an action node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum ActionConfig {
    GetWeather {
        #[serde(default)]
        city: String,
    },
    FetchIssues {
        /// Issue query; empty fetches the tracker's default listing
        #[serde(default)]
        filter: String,
    },
    SendMessage {
        #[serde(default)]
        channel: String,
    },
}

impl ActionConfig {
    pub fn empty(kind: ActionKind) -> Self {
        match kind {
            ActionKind::GetWeather => ActionConfig::GetWeather {
                city: String::new(),
            },
            ActionKind::FetchIssues => ActionConfig::FetchIssues {
                filter: String::new(),
            },
            ActionKind::SendMessage => ActionConfig::SendMessage {
                channel: String::new(),
            },
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ActionConfig::GetWeather { .. } => ActionKind::GetWeather,
            ActionConfig::FetchIssues { .. } => ActionKind::FetchIssues,
            ActionConfig::SendMessage { .. } => ActionKind::SendMessage,
        }
    }

    /// Required parameters that are still blank.
    ///
    /// `connector` is the connector the action runs through; a chat connector
    /// with a default channel satisfies a blank `channel`.
    pub fn missing_fields(&self, connector: Option<&ConnectorConfig>) -> Vec<&'static str> {
        match self {
            ActionConfig::GetWeather { city } if is_blank(city) => vec!["city"],
            ActionConfig::SendMessage { channel }
                if is_blank(channel) && connector.and_then(|c| c.default_channel()).is_none() =>
            {
                vec!["channel"]
            }
            _ => vec![],
        }
    }
}

/// Kind-specific configuration; the variant decides the node kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeConfig {
    Connector(ConnectorConfig),
    Action(ActionConfig),
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Connector(_) => NodeKind::Connector,
            NodeConfig::Action(_) => NodeKind::Action,
        }
    }

    fn default_label(&self) -> String {
        match self {
            NodeConfig::Connector(config) => config.kind().to_string(),
            NodeConfig::Action(config) => config.kind().label().to_string(),
        }
    }
}

impl From<ConnectorConfig> for NodeConfig {
    fn from(config: ConnectorConfig) -> Self {
        NodeConfig::Connector(config)
    }
}

impl From<ActionConfig> for NodeConfig {
    fn from(config: ActionConfig) -> Self {
        NodeConfig::Action(config)
    }
}

/// A node in a flow graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub label: String,
    #[serde(flatten)]
    pub config: NodeConfig,
}

impl Node {
    pub(crate) fn new(id: NodeId, label: Option<String>, config: NodeConfig) -> Self {
        let label = label.unwrap_or_else(|| config.default_label());
        Self { id, label, config }
    }

    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    pub fn as_connector(&self) -> Option<&ConnectorConfig> {
        match &self.config {
            NodeConfig::Connector(config) => Some(config),
            NodeConfig::Action(_) => None,
        }
    }

    pub fn as_action(&self) -> Option<&ActionConfig> {
        match &self.config {
            NodeConfig::Action(config) => Some(config),
            NodeConfig::Connector(_) => None,
        }
    }

    pub fn is_action(&self) -> bool {
        self.kind() == NodeKind::Action
    }
}

/// Directed edge: the source's output or identity feeds the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

/// Partial update for a node's configuration, as sent by a properties form.
///
/// Unset fields are left alone. Switching `connector_kind` resets the
/// kind-specific fields but carries the API key over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_kind: Option<ConnectorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_kind: Option<ActionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
