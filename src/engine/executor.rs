// SPDX-License-Identifier: MIT

//! Run state machine
//!
//! `FlowEngine` validates a graph, orders it and then walks the order one
//! node at a time, calling the `ConnectorInvoker` for action nodes. At most
//! one run is active per engine.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::config::EngineConfig;
use super::context::{LogEntry, RunContext};
use super::error::{EngineError, Problem};
use super::graph::{ActionConfig, ActionKind, FlowGraph, GraphIndex, Node, NodeConfig, NodeId};
use super::invoke::{ConnectorInvoker, ConnectorOutput, Invocation};
use super::scheduler;
use super::validator::{self, ValidationResult};

/// Observable engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    /// Validation failed; no node was executed
    Invalid { problems: Vec<Problem> },
    Cancelled,
}

/// Terminal result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Aborted(AbortReason),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }

    /// Validation problems, if the run was aborted because of them
    pub fn problems(&self) -> &[Problem] {
        match self {
            RunOutcome::Aborted(AbortReason::Invalid { problems }) => problems,
            _ => &[],
        }
    }

    fn state(&self) -> RunState {
        match self {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::Aborted(_) => RunState::Aborted,
        }
    }
}

/// Progress notifications streamed while a run executes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Started { run_id: Uuid, order: Vec<NodeId> },
    NodeStarted { node_id: NodeId },
    Log(LogEntry),
    NodeFinished { node_id: NodeId },
    Finished { outcome: RunOutcome },
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub context: RunContext,
}

impl RunReport {
    pub fn output(&self, id: NodeId) -> Option<&ConnectorOutput> {
        self.context.output(id)
    }

    pub fn log(&self) -> &[LogEntry] {
        self.context.log()
    }
}

/// Executes flow graphs against a connector invoker
pub struct FlowEngine {
    invoker: Arc<dyn ConnectorInvoker>,
    config: EngineConfig,
    gate: Mutex<()>,
    state: watch::Sender<RunState>,
}

impl FlowEngine {
    pub fn new(invoker: Arc<dyn ConnectorInvoker>, config: EngineConfig) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            invoker,
            config,
            gate: Mutex::new(()),
            state,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// State of the latest run, `Idle` before the first one
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Run `graph` to completion
    pub async fn run(&self, graph: &FlowGraph) -> Result<RunReport, EngineError> {
        self.execute(graph, CancellationToken::new(), None).await
    }

    /// Run `graph`, streaming progress to `tx`. Cancelling `cancel` stops the
    /// run after the node in flight.
    pub async fn run_stream(
        &self,
        graph: &FlowGraph,
        cancel: CancellationToken,
        tx: mpsc::Sender<RunEvent>,
    ) -> Result<RunReport, EngineError> {
        self.execute(graph, cancel, Some(&tx)).await
    }

    async fn execute(
        &self,
        graph: &FlowGraph,
        cancel: CancellationToken,
        tx: Option<&mpsc::Sender<RunEvent>>,
    ) -> Result<RunReport, EngineError> {
        let _guard = self.gate.try_lock().map_err(|_| {
            log::warn!("Run rejected: another run is in progress");
            EngineError::ConcurrentRunRejected
        })?;

        let events = Events(tx);
        let mut context = RunContext::new();
        let run_id = context.run_id();

        let order = match self.prepare(graph) {
            Ok(order) => order,
            Err(problems) => {
                log::info!("Run {} aborted: {} validation problems", run_id, problems.len());
                let outcome = RunOutcome::Aborted(AbortReason::Invalid { problems });
                return Ok(self.finish(context, outcome, &events).await);
            }
        };

        self.state.send_replace(RunState::Running);
        log::info!("Run {} started with {} nodes", run_id, order.len());
        events
            .send(RunEvent::Started {
                run_id,
                order: order.clone(),
            })
            .await;

        let index = graph.index();
        for (position, &node_id) in order.iter().enumerate() {
            if position > 0 && !self.pace(&cancel).await {
                return Ok(self.cancelled(context, &events).await);
            }
            if cancel.is_cancelled() {
                return Ok(self.cancelled(context, &events).await);
            }
            let Some(node) = graph.node(node_id) else {
                continue;
            };

            context.enter(node_id);
            events.send(RunEvent::NodeStarted { node_id }).await;

            let entry = match &node.config {
                NodeConfig::Connector(connector) => context.info(
                    Some(node_id),
                    format!("Executing Connector node: {}", connector.kind()),
                ),
                NodeConfig::Action(action) => {
                    self.dispatch_action(&index, node, action, &mut context)
                        .await
                }
            };
            events.send(RunEvent::Log(entry)).await;

            context.leave();
            events.send(RunEvent::NodeFinished { node_id }).await;
        }

        // A cancel that lands during the last node still aborts the run
        if cancel.is_cancelled() {
            return Ok(self.cancelled(context, &events).await);
        }
        Ok(self.finish(context, RunOutcome::Completed, &events).await)
    }

    /// Validation plus scheduling; problems mean the run never starts
    fn prepare(&self, graph: &FlowGraph) -> Result<Vec<NodeId>, Vec<Problem>> {
        if let ValidationResult::Invalid(problems) = validator::validate(graph) {
            return Err(problems);
        }
        scheduler::order(graph).map_err(|cycle| vec![Problem::from(cycle)])
    }

    async fn dispatch_action(
        &self,
        index: &GraphIndex<'_>,
        node: &Node,
        action: &ActionConfig,
        context: &mut RunContext,
    ) -> LogEntry {
        let Some((connector_node, connector)) = index.qualifying_connector(node.id) else {
            return context.error(Some(node.id), "Action node requires a connector connection.");
        };

        let message = if action.kind().forwards_upstream() {
            self.upstream_message(index, connector_node.id, context)
        } else {
            self.config.default_message.clone()
        };

        let Some(invocation) = Invocation::build(connector, action, &message) else {
            return context.error(
                Some(node.id),
                format!("{} cannot run through a {} connector", action.kind(), connector.kind()),
            );
        };

        log::debug!("Invoking {} for node {}", invocation.connector_kind(), node.id);
        match self.invoker.invoke(invocation).await {
            Ok(output) => {
                let entry = context.info(Some(node.id), describe_output(&output));
                context.record_output(node.id, output);
                entry
            }
            Err(err) => context.error(
                Some(node.id),
                format!("{}: {}", failure_prefix(action.kind()), err),
            ),
        }
    }

    /// Output of the first action wired into `connector_id`, or the default
    /// payload when that action produced nothing
    fn upstream_message(
        &self,
        index: &GraphIndex<'_>,
        connector_id: NodeId,
        context: &RunContext,
    ) -> String {
        index
            .upstream_actions(connector_id)
            .into_iter()
            .next()
            .and_then(|(source, _)| context.output(source.id))
            .map(ConnectorOutput::to_text)
            .unwrap_or_else(|| self.config.default_message.clone())
    }

    /// Wait out the pacing delay; false if cancelled meanwhile
    async fn pace(&self, cancel: &CancellationToken) -> bool {
        if self.config.pacing.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.pacing) => true,
        }
    }

    async fn cancelled(&self, context: RunContext, events: &Events<'_>) -> RunReport {
        log::info!("Run {} cancelled", context.run_id());
        self.finish(context, RunOutcome::Aborted(AbortReason::Cancelled), events)
            .await
    }

    async fn finish(
        &self,
        mut context: RunContext,
        outcome: RunOutcome,
        events: &Events<'_>,
    ) -> RunReport {
        context.leave();
        self.state.send_replace(outcome.state());
        events
            .send(RunEvent::Finished {
                outcome: outcome.clone(),
            })
            .await;
        RunReport {
            run_id: context.run_id(),
            outcome,
            context,
        }
    }
}

/// Optional event sink; a dropped receiver never fails the run
struct Events<'a>(Option<&'a mpsc::Sender<RunEvent>>);

impl Events<'_> {
    async fn send(&self, event: RunEvent) {
        if let Some(tx) = self.0 {
            let _ = tx.send(event).await;
        }
    }
}

fn describe_output(output: &ConnectorOutput) -> String {
    match output {
        ConnectorOutput::Weather(report) => format!("Weather: {}", report),
        ConnectorOutput::Issues(issues) => format!("Issues: {}", issues.join("\n")),
        ConnectorOutput::Delivery(detail) => format!("Chat response: {}", detail),
    }
}

fn failure_prefix(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::GetWeather => "Error getting weather",
        ActionKind::FetchIssues => "Error fetching issues",
        ActionKind::SendMessage => "Error sending message",
    }
}
