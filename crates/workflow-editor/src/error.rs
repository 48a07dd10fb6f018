//! Error types for the workflow editor

use thiserror::Error;

use crate::types::{ConnectorId, NodeId, TerminalKind, TerminalRef};

/// Result type alias using EditorError
pub type Result<T> = std::result::Result<T, EditorError>;

/// Errors that can occur while editing, loading or laying out a workflow
#[derive(Debug, Error)]
pub enum EditorError {
    /// A document step has a node type the editor does not know
    #[error("Unrecognized node type '{node_type}' for step {step}")]
    UnknownNodeType { step: NodeId, node_type: String },

    /// A document step of a tool-backed type has no tool id
    #[error("Step {step} of type '{node_type}' has no tool id")]
    MissingToolId { step: NodeId, node_type: String },

    /// A connection references a step that is not in the document
    #[error("Step {step} references missing step {missing}")]
    MissingStep { step: NodeId, missing: NodeId },

    /// A node has no terminal with the given name on that side
    #[error("Node {node} has no {kind} terminal named '{name}'")]
    UnknownTerminal {
        node: NodeId,
        kind: TerminalKind,
        name: String,
    },

    /// A single-connection input is given more than one connection
    #[error("Step {step} connects {count} sources to single-connection input '{input}'")]
    TooManyConnections {
        step: NodeId,
        input: String,
        count: usize,
    },

    /// Layout found a cycle among the listed nodes
    #[error("Cycle detected among nodes {0:?}; layout aborted")]
    LayoutCycle(Vec<NodeId>),

    /// Node not present in the workflow
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Connector not present in the workflow
    #[error("Connector not found: {0}")]
    ConnectorNotFound(ConnectorId),

    /// A node was deregistered while connectors were still attached
    #[error("Node {node} still has {count} attached connector(s)")]
    NodeStillConnected { node: NodeId, count: usize },

    /// The requested end of a connector is already attached
    #[error("Connector {connector} already has its {kind} end attached")]
    ConnectorEndOccupied {
        connector: ConnectorId,
        kind: TerminalKind,
    },

    /// The input refuses a connector from the output
    #[error("Input {input} does not accept a connection from {output}")]
    IncompatibleConnection { output: TerminalRef, input: TerminalRef },

    /// A store id that cannot name a file inside the store directory
    #[error("Invalid workflow document id: '{0}'")]
    InvalidDocumentId(String),

    /// Stored document not found
    #[error("Workflow document not found: {0}")]
    DocumentNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EditorError {
    /// Whether this error came from reading a malformed document
    pub fn is_deserialization(&self) -> bool {
        matches!(
            self,
            Self::UnknownNodeType { .. }
                | Self::MissingToolId { .. }
                | Self::MissingStep { .. }
                | Self::UnknownTerminal { .. }
                | Self::TooManyConnections { .. }
                | Self::Serialization(_)
        )
    }

    pub(crate) fn unknown_terminal(node: NodeId, kind: TerminalKind, name: &str) -> Self {
        Self::UnknownTerminal {
            node,
            kind,
            name: name.to_string(),
        }
    }
}
