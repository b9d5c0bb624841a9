//! Mutable state of a single run

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use super::graph::NodeId;
use super::invoke::ConnectorOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
}

/// One line of the user-visible run log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    pub level: LogLevel,
    pub message: String,
}

/// Accumulated outputs, the run log and the current-node pointer.
///
/// Created fresh for every run and owned by it; never shared between runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    run_id: Uuid,
    action_outputs: HashMap<NodeId, ConnectorOutput>,
    log: Vec<LogEntry>,
    current_node: Option<NodeId>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            action_outputs: HashMap::new(),
            log: Vec::new(),
            current_node: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Node currently executing; only meaningful for observers
    pub fn current_node(&self) -> Option<NodeId> {
        self.current_node
    }

    pub(crate) fn enter(&mut self, id: NodeId) {
        self.current_node = Some(id);
    }

    pub(crate) fn leave(&mut self) {
        self.current_node = None;
    }

    pub fn output(&self, id: NodeId) -> Option<&ConnectorOutput> {
        self.action_outputs.get(&id)
    }

    pub(crate) fn record_output(&mut self, id: NodeId, output: ConnectorOutput) {
        self.action_outputs.insert(id, output);
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Log lines for one node, in order
    pub fn log_for(&self, id: NodeId) -> impl Iterator<Item = &LogEntry> {
        self.log.iter().filter(move |entry| entry.node_id == Some(id))
    }

    pub(crate) fn info(&mut self, node_id: Option<NodeId>, message: impl Into<String>) -> LogEntry {
        self.push(node_id, LogLevel::Info, message.into())
    }

    pub(crate) fn error(&mut self, node_id: Option<NodeId>, message: impl Into<String>) -> LogEntry {
        self.push(node_id, LogLevel::Error, message.into())
    }

    fn push(&mut self, node_id: Option<NodeId>, level: LogLevel, message: String) -> LogEntry {
        match level {
            LogLevel::Info => log::info!("[run {}] {}", self.run_id, message),
            LogLevel::Error => log::warn!("[run {}] {}", self.run_id, message),
        }
        let entry = LogEntry {
            at: Utc::now(),
            node_id,
            level,
            message,
        };
        self.log.push(entry.clone());
        entry
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_append_only_and_ordered() {
        let mut context = RunContext::new();
        context.info(Some(NodeId(1)), "first");
        context.error(Some(NodeId(2)), "second");
        context.info(None, "third");

        let messages: Vec<&str> = context.log().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(context.log()[1].level, LogLevel::Error);
        assert_eq!(context.log_for(NodeId(2)).count(), 1);
    }

    #[test]
    fn test_current_node_pointer() {
        let mut context = RunContext::new();
        assert_eq!(context.current_node(), None);
        context.enter(NodeId(3));
        assert_eq!(context.current_node(), Some(NodeId(3)));
        context.leave();
        assert_eq!(context.current_node(), None);
    }

    #[test]
    fn test_fresh_contexts_have_distinct_ids() {
        assert_ne!(RunContext::new().run_id(), RunContext::new().run_id());
    }
}
