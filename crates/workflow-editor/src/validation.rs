//! Checks run before a workflow is saved
//!
//! Reports invalid steps, tool errors, cycles and leftover dangling
//! connectors. Problems are collected rather than stopping at the first.

use crate::error::EditorError;
use crate::layout::topological_levels;
use crate::types::{ConnectorId, NodeId, NodeKind};
use crate::workflow::Workflow;

/// Validation error with location context
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A step whose tool is not installed
    InvalidStep { node_id: NodeId, tool_id: String },
    /// A tool reported errors for its current state
    ToolErrors { node_id: NodeId, name: String },
    /// The listed nodes form or feed a cycle
    CycleDetected { node_ids: Vec<NodeId> },
    /// A connector with a missing end outlived its drag gesture
    DanglingConnector { connector_id: ConnectorId },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidStep { node_id, tool_id } => {
                write!(f, "Step {} uses unrecognized tool '{}'", node_id, tool_id)
            }
            Self::ToolErrors { node_id, name } => {
                write!(f, "Step {} ('{}') has tool errors", node_id, name)
            }
            Self::CycleDetected { node_ids } => {
                write!(f, "Cycle detected among steps {:?}", node_ids)
            }
            Self::DanglingConnector { connector_id } => {
                write!(f, "Connector {} is missing an end", connector_id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a workflow
///
/// Returns all validation errors found (not just the first).
pub fn validate_workflow(workflow: &Workflow) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_steps(workflow, &mut errors);
    validate_connectors(workflow, &mut errors);
    detect_cycles(workflow, &mut errors);

    errors
}

fn validate_steps(workflow: &Workflow, errors: &mut Vec<ValidationError>) {
    for node in workflow.nodes() {
        match node.kind() {
            NodeKind::Invalid { tool_id } => {
                errors.push(ValidationError::InvalidStep {
                    node_id: node.id(),
                    tool_id: tool_id.clone(),
                });
            }
            _ if !node.is_valid() => {
                errors.push(ValidationError::ToolErrors {
                    node_id: node.id(),
                    name: node.name.clone(),
                });
            }
            _ => {}
        }
    }
}

fn validate_connectors(workflow: &Workflow, errors: &mut Vec<ValidationError>) {
    for connector in workflow.connectors().filter(|c| c.is_dangling()) {
        errors.push(ValidationError::DanglingConnector {
            connector_id: connector.id,
        });
    }
}

fn detect_cycles(workflow: &Workflow, errors: &mut Vec<ValidationError>) {
    if let Err(EditorError::LayoutCycle(node_ids)) = topological_levels(workflow) {
        errors.push(ValidationError::CycleDetected { node_ids });
    }
}
