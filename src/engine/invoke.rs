// SPDX-License-Identifier: MIT

//! Connector invocation boundary
//!
//! The engine hands a typed `Invocation` to a `ConnectorInvoker` and gets a
//! `ConnectorOutput` or an `UpstreamError` back. Transport is entirely the
//! invoker's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::UpstreamError;
use super::graph::{ActionConfig, ConnectorConfig, ConnectorKind};

/// Trait for the collaborator that performs vendor calls.
///
/// Implementations must be safe to share across tasks; the engine calls
/// `invoke` once per action node per run and never retries.
#[async_trait]
pub trait ConnectorInvoker: Send + Sync {
    /// Perform the call described by `invocation`
    async fn invoke(&self, invocation: Invocation) -> Result<ConnectorOutput, UpstreamError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherQuery {
    pub api_key: String,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueQuery {
    pub base_url: String,
    pub username: String,
    pub api_key: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub api_key: String,
    pub channel: String,
    pub message: String,
}

/// One call through a connector, with everything the upstream needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "connector", rename_all = "snake_case")]
pub enum Invocation {
    Weather(WeatherQuery),
    Issues(IssueQuery),
    Chat(ChatMessage),
}

impl Invocation {
    /// Combine a connector's credentials with an action's parameters.
    ///
    /// `message` is the chat payload; other kinds ignore it. Returns `None`
    /// when the action does not target this connector's kind.
    pub fn build(
        connector: &ConnectorConfig,
        action: &ActionConfig,
        message: &str,
    ) -> Option<Self> {
        match (connector, action) {
            (ConnectorConfig::Weather { api_key }, ActionConfig::GetWeather { city }) => {
                Some(Invocation::Weather(WeatherQuery {
                    api_key: api_key.clone(),
                    city: city.clone(),
                }))
            }
            (
                ConnectorConfig::IssueTracker {
                    base_url,
                    username,
                    api_key,
                },
                ActionConfig::FetchIssues { filter },
            ) => Some(Invocation::Issues(IssueQuery {
                base_url: base_url.clone(),
                username: username.clone(),
                api_key: api_key.clone(),
                query: filter.clone(),
            })),
            (ConnectorConfig::Chat { api_key, .. }, ActionConfig::SendMessage { channel }) => {
                let channel = connector
                    .default_channel()
                    .unwrap_or(channel.as_str())
                    .to_string();
                Some(Invocation::Chat(ChatMessage {
                    api_key: api_key.clone(),
                    channel,
                    message: message.to_string(),
                }))
            }
            _ => None,
        }
    }

    pub fn connector_kind(&self) -> ConnectorKind {
        match self {
            Invocation::Weather(_) => ConnectorKind::Weather,
            Invocation::Issues(_) => ConnectorKind::IssueTracker,
            Invocation::Chat(_) => ConnectorKind::Chat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: String,
    pub temperature_c: f64,
    pub condition: String,
}

impl fmt::Display for WeatherReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Location: {}. Temperature: {}°C, Condition: {}",
            self.location, self.temperature_c, self.condition
        )
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConnectorOutput {
    Weather(WeatherReport),
    /// Issue summaries in tracker order; may be empty
    Issues(Vec<String>),
    /// Delivery confirmation from the chat service
    Delivery(String),
}

impl ConnectorOutput {
    /// Text form, used for the run log and as a forwarded chat payload
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConnectorOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectorOutput::Weather(report) => fmt::Display::fmt(report, f),
            ConnectorOutput::Issues(issues) => f.write_str(&issues.join("\n")),
            ConnectorOutput::Delivery(detail) => f.write_str(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::ActionKind;

    #[test]
    fn test_build_weather_invocation() {
        let connector = ConnectorConfig::Weather {
            api_key: "k".to_string(),
        };
        let action = ActionConfig::GetWeather {
            city: "Paris".to_string(),
        };

        assert_eq!(
            Invocation::build(&connector, &action, "ignored"),
            Some(Invocation::Weather(WeatherQuery {
                api_key: "k".to_string(),
                city: "Paris".to_string(),
            }))
        );
    }

    #[test]
    fn test_build_rejects_mismatched_kinds() {
        let connector = ConnectorConfig::empty(ConnectorKind::Chat);
        let action = ActionConfig::empty(ActionKind::GetWeather);
        assert_eq!(Invocation::build(&connector, &action, "m"), None);
    }

    #[test]
    fn test_connector_channel_wins_over_action_channel() {
        let connector = ConnectorConfig::Chat {
            api_key: "k".to_string(),
            channel: Some("#from-connector".to_string()),
        };
        let action = ActionConfig::SendMessage {
            channel: "#from-action".to_string(),
        };

        match Invocation::build(&connector, &action, "hello") {
            Some(Invocation::Chat(message)) => {
                assert_eq!(message.channel, "#from-connector");
                assert_eq!(message.message, "hello");
            }
            other => panic!("unexpected invocation: {:?}", other),
        }
    }

    #[test]
    fn test_output_text() {
        let weather = ConnectorOutput::Weather(WeatherReport {
            location: "Paris".to_string(),
            temperature_c: 18.0,
            condition: "Clear".to_string(),
        });
        assert_eq!(
            weather.to_text(),
            "Location: Paris. Temperature: 18°C, Condition: Clear"
        );

        let issues = ConnectorOutput::Issues(vec!["OPS-1 Disk full".into(), "OPS-2 Slow".into()]);
        assert_eq!(issues.to_text(), "OPS-1 Disk full\nOPS-2 Slow");
        assert_eq!(ConnectorOutput::Issues(vec![]).to_text(), "");
    }
}
