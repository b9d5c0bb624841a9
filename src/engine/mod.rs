// SPDX-License-Identifier: MIT

//! Flow graph execution core
//!
//! Graph model, validation, deterministic scheduling and the run state
//! machine. Vendor calls go through the `ConnectorInvoker` trait so this
//! module never touches the network itself.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod invoke;
pub mod scheduler;
pub mod validator;

pub use config::EngineConfig;
pub use context::{LogEntry, LogLevel, RunContext};
pub use error::{EngineError, FlowError, GraphError, Problem, UpstreamError};
pub use executor::{AbortReason, FlowEngine, RunEvent, RunOutcome, RunReport, RunState};
pub use graph::{
    ActionConfig, ActionKind, ConfigPatch, ConnectorConfig, ConnectorKind, Edge, EdgeId,
    FlowGraph, GraphIndex, Node, NodeConfig, NodeId, NodeKind,
};
pub use invoke::{ConnectorInvoker, ConnectorOutput, Invocation, WeatherReport};
pub use validator::{validate, ValidationResult};
