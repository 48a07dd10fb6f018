//! Core types for the editor graph
//!
//! Identifiers, canvas positions, port definitions, node kinds and
//! post-job actions shared by the graph model and the document format.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a node within a workflow
pub type NodeId = u64;

/// Unique identifier for a connector within a workflow
pub type ConnectorId = u64;

/// Datatype that every input accepts (and that data-input nodes produce)
pub const WILDCARD_DATATYPE: &str = "input";

/// Post-job action that suppresses an output from user-visible results
pub const HIDE_DATASET_ACTION: &str = "HideDatasetAction";

/// Post-job action that changes the datatype of an output
pub const CHANGE_DATATYPE_ACTION: &str = "ChangeDatatypeAction";

/// Canvas position of a node, in graph-relative pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub top: f64,
    pub left: f64,
}

impl Position {
    pub fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }

    /// Position shifted by a drag delta
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            left: self.left + dx,
        }
    }
}

/// Rendered size of a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Which side of a node a terminal sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    Input,
    Output,
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// Address of a terminal: owning node, side and port name
///
/// Terminals are addressed by name rather than position so that a port
/// replaced after an asynchronous refresh keeps the same address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalRef {
    pub node: NodeId,
    pub kind: TerminalKind,
    pub name: String,
}

impl TerminalRef {
    pub fn input(node: NodeId, name: impl Into<String>) -> Self {
        Self {
            node,
            kind: TerminalKind::Input,
            name: name.into(),
        }
    }

    pub fn output(node: NodeId, name: impl Into<String>) -> Self {
        Self {
            node,
            kind: TerminalKind::Output,
            name: name.into(),
        }
    }
}

impl fmt::Display for TerminalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.node, self.kind, self.name)
    }
}

/// Definition of a data port as supplied by the tool module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDefinition {
    /// Port name, unique per side of a node
    pub name: String,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Accepted (inputs) or produced (outputs) datatype extensions
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Whether the input accepts more than one connector
    #[serde(default)]
    pub multiple: bool,
}

impl PortDefinition {
    /// Create a port accepting or producing the given extensions
    pub fn new<I, S>(name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            label: None,
            extensions: extensions.into_iter().map(Into::into).collect(),
            multiple: false,
        }
    }

    /// Set this port to accept multiple connections
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Set a human-readable label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Kind of a node, each carrying only the fields valid for it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A tool invocation
    Tool { tool_id: String },
    /// A single dataset supplied when the workflow runs
    DataInput,
    /// A dataset collection supplied when the workflow runs
    DataCollectionInput,
    /// Placeholder for a step whose tool is not installed
    Invalid { tool_id: String },
}

impl NodeKind {
    pub fn tool(tool_id: impl Into<String>) -> Self {
        Self::Tool {
            tool_id: tool_id.into(),
        }
    }

    /// The `type` string used in documents
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Tool { .. } => "tool",
            Self::DataInput => "data_input",
            Self::DataCollectionInput => "data_collection_input",
            Self::Invalid { .. } => "invalid",
        }
    }

    pub fn tool_id(&self) -> Option<&str> {
        match self {
            Self::Tool { tool_id } | Self::Invalid { tool_id } => Some(tool_id),
            Self::DataInput | Self::DataCollectionInput => None,
        }
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool { .. })
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Self::DataInput | Self::DataCollectionInput)
    }

    /// Rebuild a kind from its document `type` string
    ///
    /// Returns `None` for unrecognised types, and for tool-backed kinds
    /// that arrive without a tool id.
    pub fn from_parts(type_name: &str, tool_id: Option<&str>) -> Option<Self> {
        match (type_name, tool_id) {
            ("tool", Some(id)) => Some(Self::tool(id)),
            ("invalid", Some(id)) => Some(Self::Invalid {
                tool_id: id.to_string(),
            }),
            ("invalid", None) => Some(Self::Invalid {
                tool_id: String::new(),
            }),
            ("data_input", _) => Some(Self::DataInput),
            ("data_collection_input", _) => Some(Self::DataCollectionInput),
            _ => None,
        }
    }
}

/// Structured key of a post-job action
///
/// Ordering and equality are on the pair, so two actions can never
/// collide the way concatenated string keys could.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostJobActionKey {
    pub action_type: String,
    pub output_name: String,
}

impl PostJobActionKey {
    pub fn new(action_type: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            output_name: output_name.into(),
        }
    }

    /// Key string used by the document format (`actionType + outputName`)
    pub fn wire_key(&self) -> String {
        format!("{}{}", self.action_type, self.output_name)
    }
}

/// An action applied to a tool's outputs after the job runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostJobAction {
    pub action_type: String,
    /// Target output; empty means all outputs
    #[serde(default)]
    pub output_name: String,
    #[serde(default = "empty_arguments")]
    pub action_arguments: serde_json::Value,
}

fn empty_arguments() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl PostJobAction {
    pub fn new(
        action_type: impl Into<String>,
        output_name: impl Into<String>,
        action_arguments: serde_json::Value,
    ) -> Self {
        Self {
            action_type: action_type.into(),
            output_name: output_name.into(),
            action_arguments,
        }
    }

    /// Hide the named output, with empty arguments
    pub fn hide(output_name: impl Into<String>) -> Self {
        Self::new(HIDE_DATASET_ACTION, output_name, empty_arguments())
    }

    /// Change the datatype of the named output (empty name: all outputs)
    pub fn change_datatype(output_name: impl Into<String>, newtype: impl Into<String>) -> Self {
        Self::new(
            CHANGE_DATATYPE_ACTION,
            output_name,
            serde_json::json!({ "newtype": newtype.into() }),
        )
    }

    pub fn key(&self) -> PostJobActionKey {
        PostJobActionKey::new(self.action_type.clone(), self.output_name.clone())
    }

    pub fn is_hide(&self) -> bool {
        self.action_type == HIDE_DATASET_ACTION
    }

    /// The datatype this action adds to `output`, if it is a matching
    /// change-datatype action
    pub fn new_datatype_for(&self, output: &str) -> Option<&str> {
        if self.action_type != CHANGE_DATATYPE_ACTION {
            return None;
        }
        if !self.output_name.is_empty() && self.output_name != output {
            return None;
        }
        self.action_arguments.get("newtype").and_then(|v| v.as_str())
    }
}

/// Post-job actions of a node
pub type PostJobActions = BTreeMap<PostJobActionKey, PostJobAction>;
