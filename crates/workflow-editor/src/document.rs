//! Flat document form of a workflow
//!
//! The document is what the persistence API accepts and returns: one
//! step record per node, keyed by node id, with connections expressed as
//! `(source step id, output name)` pairs on each input. Loading a
//! document and writing it back yields the same steps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};
use crate::events::EditorEvent;
use crate::node::{Node, NodeData, WirePostJobActions};
use crate::types::{NodeId, NodeKind, PortDefinition, Position, TerminalKind, TerminalRef};
use crate::workflow::Workflow;

/// A serialized workflow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default)]
    pub name: String,
    pub steps: BTreeMap<NodeId, StepRecord>,
}

/// One upstream connection of an input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Id of the source step
    pub id: NodeId,
    pub output_name: String,
}

impl ConnectionRecord {
    pub fn new(id: NodeId, output_name: impl Into<String>) -> Self {
        Self {
            id,
            output_name: output_name.into(),
        }
    }
}

/// Connections of one input
///
/// Always written as a list; older documents store a single object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputConnections {
    Many(Vec<ConnectionRecord>),
    One(ConnectionRecord),
}

impl InputConnections {
    pub fn records(&self) -> &[ConnectionRecord] {
        match self {
            Self::Many(records) => records,
            Self::One(record) => std::slice::from_ref(record),
        }
    }
}

/// Serialized form of a single node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tool_state: Option<serde_json::Value>,
    #[serde(default)]
    pub tool_errors: Option<serde_json::Value>,
    #[serde(default)]
    pub tooltip: Option<String>,
    #[serde(default)]
    pub form_html: Option<String>,
    #[serde(default)]
    pub annotation: String,
    #[serde(default)]
    pub data_inputs: Vec<PortDefinition>,
    #[serde(default)]
    pub data_outputs: Vec<PortDefinition>,
    /// Input name to its connections, `null` when unconnected
    #[serde(default)]
    pub input_connections: BTreeMap<String, Option<InputConnections>>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub post_job_actions: WirePostJobActions,
    #[serde(default)]
    pub workflow_outputs: Vec<String>,
}

impl StepRecord {
    /// Connections feeding the named input, empty when unconnected
    pub fn connections(&self, input: &str) -> &[ConnectionRecord] {
        self.input_connections
            .get(input)
            .and_then(Option::as_ref)
            .map(InputConnections::records)
            .unwrap_or(&[])
    }

    fn kind(&self) -> Result<NodeKind> {
        NodeKind::from_parts(&self.node_type, self.tool_id.as_deref()).ok_or_else(|| {
            if self.node_type == "tool" {
                EditorError::MissingToolId {
                    step: self.id,
                    node_type: self.node_type.clone(),
                }
            } else {
                EditorError::UnknownNodeType {
                    step: self.id,
                    node_type: self.node_type.clone(),
                }
            }
        })
    }

    fn to_node(&self) -> Result<Node> {
        let data = NodeData {
            name: Some(self.name.clone()),
            tool_state: self.tool_state.clone(),
            tool_errors: self.tool_errors.clone(),
            tooltip: self.tooltip.clone(),
            form_html: self.form_html.clone(),
            annotation: Some(self.annotation.clone()),
            data_inputs: Some(self.data_inputs.clone()),
            data_outputs: Some(self.data_outputs.clone()),
            post_job_actions: Some(self.post_job_actions.clone()),
        };
        let mut node = Node::from_data(self.kind()?, data).with_position(self.position);
        node.restore_workflow_outputs(self.workflow_outputs.iter().cloned());
        Ok(node)
    }

    fn from_node(workflow: &Workflow, node: &Node) -> Self {
        let input_connections = node
            .inputs()
            .iter()
            .map(|terminal| {
                let records: Vec<ConnectionRecord> = terminal
                    .connectors()
                    .iter()
                    .filter_map(|id| workflow.connector(*id)?.source.as_ref())
                    .map(|source| ConnectionRecord::new(source.node, source.name.clone()))
                    .collect();
                let value = (!records.is_empty()).then_some(InputConnections::Many(records));
                (terminal.name().to_string(), value)
            })
            .collect();

        let mut post_job_actions = WirePostJobActions::new();
        for (key, action) in node.post_job_actions() {
            if let Some(replaced) = post_job_actions.insert(key.wire_key(), action.clone()) {
                log::warn!(
                    "Step {}: post-job action {}/{} shares wire key '{}' with {}/{}; only the latter is saved",
                    node.id(),
                    replaced.action_type,
                    replaced.output_name,
                    key.wire_key(),
                    action.action_type,
                    action.output_name
                );
            }
        }

        Self {
            id: node.id(),
            node_type: node.kind().type_name().to_string(),
            tool_id: node.tool_id().map(str::to_string),
            name: node.name.clone(),
            tool_state: node.tool_state.clone(),
            tool_errors: node.tool_errors.clone(),
            tooltip: node.tooltip.clone(),
            form_html: node.form_html.clone(),
            annotation: node.annotation.clone(),
            data_inputs: node.inputs().iter().map(|t| t.definition()).collect(),
            data_outputs: node.outputs().iter().map(|t| t.definition()).collect(),
            input_connections,
            position: node.position,
            post_job_actions,
            workflow_outputs: node.workflow_outputs().to_vec(),
        }
    }
}

impl WorkflowDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn step(&self, id: NodeId) -> Option<&StepRecord> {
        self.steps.get(&id)
    }
}

/// Check every connection of every step before anything is mutated
fn check_connections(document: &WorkflowDocument, nodes: &BTreeMap<NodeId, Node>) -> Result<()> {
    for record in document.steps.values() {
        let Some(target) = nodes.get(&record.id) else {
            continue;
        };
        for (input, connections) in &record.input_connections {
            let Some(connections) = connections else {
                continue;
            };
            let Some(terminal) = target.input(input) else {
                return Err(EditorError::unknown_terminal(record.id, TerminalKind::Input, input));
            };
            let records = connections.records();
            if records.len() > 1 && !terminal.multiple() {
                return Err(EditorError::TooManyConnections {
                    step: record.id,
                    input: input.clone(),
                    count: records.len(),
                });
            }
            for connection in records {
                let source = nodes.get(&connection.id).ok_or(EditorError::MissingStep {
                    step: record.id,
                    missing: connection.id,
                })?;
                if source.output(&connection.output_name).is_none() {
                    return Err(EditorError::unknown_terminal(
                        connection.id,
                        TerminalKind::Output,
                        &connection.output_name,
                    ));
                }
            }
        }
    }
    Ok(())
}

impl Workflow {
    /// Serialize the graph
    pub fn to_document(&self) -> WorkflowDocument {
        WorkflowDocument {
            name: self.name.clone(),
            steps: self
                .nodes
                .values()
                .map(|node| (node.id(), StepRecord::from_node(self, node)))
                .collect(),
        }
    }

    /// Rectify outputs, then serialize for saving
    pub fn prepare_save(&mut self) -> WorkflowDocument {
        self.flush_active_form();
        self.rectify_outputs();
        self.to_document()
    }

    /// Replace the graph with the contents of a document
    ///
    /// Node ids are preserved and the id counter continues one past the
    /// largest. The document is checked completely before the current
    /// graph is touched, so a malformed document leaves it unchanged.
    pub fn load_document(&mut self, document: &WorkflowDocument) -> Result<()> {
        let mut staged = BTreeMap::new();
        for record in document.steps.values() {
            staged.insert(record.id, record.to_node()?);
        }
        check_connections(document, &staged)?;

        self.remove_all();
        self.clear_active_node();
        self.name = document.name.clone();
        self.id_counter = 0;
        for (id, node) in staged {
            self.insert_node_with_id(id, node);
        }

        for record in document.steps.values() {
            for (input, connections) in &record.input_connections {
                let Some(connections) = connections else {
                    continue;
                };
                for connection in connections.records() {
                    self.connect_terminals(
                        Some(TerminalRef::output(connection.id, connection.output_name.clone())),
                        Some(TerminalRef::input(record.id, input.clone())),
                    )?;
                }
            }
        }

        self.upgrade_legacy_outputs();
        self.has_changes = false;
        log::debug!(
            "Loaded workflow '{}' with {} step(s)",
            self.name,
            self.nodes.len()
        );
        self.emit(EditorEvent::WorkflowLoaded {
            node_count: self.nodes.len(),
        });
        Ok(())
    }

    /// Build a new workflow from a document
    pub fn from_document(
        document: &WorkflowDocument,
        datatypes: crate::datatypes::DatatypeRegistry,
    ) -> Result<Self> {
        let mut workflow = Self::new(document.name.clone(), datatypes);
        workflow.load_document(document)?;
        Ok(workflow)
    }
}
