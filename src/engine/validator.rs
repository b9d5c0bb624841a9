// SPDX-License-Identifier: MIT

//! Pre-run validation
//!
//! Decides whether a graph is runnable. Problems are collected rather than
//! short-circuited so every issue can be fixed in one pass.

use serde::Serialize;

use super::error::Problem;
use super::graph::{FlowGraph, GraphIndex, NodeId};
use super::scheduler;

/// Outcome of validating a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "problems", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<Problem>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn problems(&self) -> &[Problem] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid(problems) => problems,
        }
    }
}

/// Run every check against `graph`.
///
/// Checks, in order: acyclicity, action wiring, config completeness.
pub fn validate(graph: &FlowGraph) -> ValidationResult {
    let mut problems = Vec::new();

    if let Err(cycle) = scheduler::order(graph) {
        problems.push(Problem::from(cycle));
    }

    let index = graph.index();
    problems.extend(check_wiring(&index));
    problems.extend(check_completeness(&index));

    if problems.is_empty() {
        ValidationResult::Valid
    } else {
        log::debug!("Validation found {} problems", problems.len());
        ValidationResult::Invalid(problems)
    }
}

/// Every action needs an inbound edge from a connector of the kind it targets
fn check_wiring(index: &GraphIndex<'_>) -> Vec<Problem> {
    index
        .graph()
        .nodes()
        .filter_map(|node| {
            let action = node.as_action()?;
            if index.qualifying_connector(node.id).is_some() {
                return None;
            }
            Some(Problem::UnwiredAction {
                node_id: node.id,
                label: node.label.clone(),
                required: action.kind().target(),
            })
        })
        .collect()
}

/// Actions need their parameters; connectors that some action runs through
/// need their credentials. Unused connectors are not checked.
fn check_completeness(index: &GraphIndex<'_>) -> Vec<Problem> {
    let graph = index.graph();
    let mut problems = Vec::new();
    let mut used_connectors: Vec<NodeId> = Vec::new();

    for node in graph.nodes() {
        let Some(action) = node.as_action() else {
            continue;
        };
        let connector = index.qualifying_connector(node.id);
        if let Some((connector_node, _)) = connector {
            used_connectors.push(connector_node.id);
        }

        let missing = action.missing_fields(connector.map(|(_, config)| config));
        if !missing.is_empty() {
            problems.push(Problem::IncompleteConfig {
                node_id: node.id,
                missing_fields: missing,
            });
        }
    }

    used_connectors.sort();
    used_connectors.dedup();
    for id in used_connectors {
        let Some(config) = graph.node(id).and_then(|node| node.as_connector()) else {
            continue;
        };
        let missing = config.missing_fields();
        if !missing.is_empty() {
            problems.push(Problem::IncompleteConfig {
                node_id: id,
                missing_fields: missing,
            });
        }
    }

    problems
}
