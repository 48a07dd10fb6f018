//! Nodes: units of work with typed terminals
//!
//! A node owns its input and output terminals, its opaque tool state and
//! its output bookkeeping (post-job actions and workflow outputs). Graph
//! level effects of node edits (destroying connectors, notifying the
//! form renderer) are carried out by the owning [`Workflow`].
//!
//! [`Workflow`]: crate::workflow::Workflow

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EditorError, Result};
use crate::terminal::Terminal;
use crate::types::{
    ConnectorId, NodeId, NodeKind, PortDefinition, Position, PostJobAction, PostJobActions,
    TerminalKind,
};

/// Post-job actions as they appear on the wire, keyed by `actionType + outputName`
pub type WirePostJobActions = BTreeMap<String, PostJobAction>;

/// Field data for a node, as returned by the tool module service
///
/// Arrives when a node is first created and again after every tool form
/// submission. Absent fields leave the node's current value untouched, so
/// a partial update carrying only `tool_state` keeps every port. An
/// explicit `"tool_errors": null` clears the node's errors; an explicit
/// empty port list removes every port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_state: Option<serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_errors: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_inputs: Option<Vec<PortDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_outputs: Option<Vec<PortDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_job_actions: Option<WirePostJobActions>,
}

/// Keep a present `null` as `Some(Value::Null)`; only a missing field is `None`
fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<serde_json::Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// What changed on a node's ports after new field data was applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortUpdate {
    /// Connectors moved onto replacement input terminals
    pub transplanted: Vec<ConnectorId>,
    /// Connectors whose terminal went away; the workflow destroys them
    pub dropped: Vec<ConnectorId>,
}

/// Result of replacing a single input port
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortReplacement {
    pub transplanted: Option<ConnectorId>,
    pub dropped: Vec<ConnectorId>,
}

/// A node on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    pub name: String,
    pub tool_state: Option<serde_json::Value>,
    pub tool_errors: Option<serde_json::Value>,
    pub tooltip: Option<String>,
    pub form_html: Option<String>,
    pub annotation: String,
    pub position: Position,
    post_job_actions: PostJobActions,
    workflow_outputs: Vec<String>,
    inputs: Vec<Terminal>,
    outputs: Vec<Terminal>,
}

impl Node {
    /// Create a node without ports
    ///
    /// The id is assigned when the node is added to a workflow.
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind,
            name: name.into(),
            tool_state: None,
            tool_errors: None,
            tooltip: None,
            form_html: None,
            annotation: String::new(),
            position: Position::default(),
            post_job_actions: PostJobActions::new(),
            workflow_outputs: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Create a node and allocate empty terminals from its field data
    pub fn from_data(kind: NodeKind, data: NodeData) -> Self {
        let name = data
            .name
            .clone()
            .or_else(|| kind.tool_id().map(str::to_string))
            .unwrap_or_else(|| kind.type_name().to_string());
        let mut node = Self::new(kind, name);
        node.apply_data(data);
        node
    }

    /// Add input ports (builder style)
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = PortDefinition>) -> Self {
        for definition in inputs {
            self.inputs
                .push(Terminal::new(self.id, TerminalKind::Input, &definition));
        }
        self
    }

    /// Add output ports (builder style)
    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = PortDefinition>) -> Self {
        for definition in outputs {
            self.outputs
                .push(Terminal::new(self.id, TerminalKind::Output, &definition));
        }
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_tool_state(mut self, state: serde_json::Value) -> Self {
        self.tool_state = Some(state);
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Assign the node id, restamping every terminal
    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = id;
        for terminal in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            terminal.set_node(id);
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_tool(&self) -> bool {
        self.kind.is_tool()
    }

    pub fn tool_id(&self) -> Option<&str> {
        self.kind.tool_id()
    }

    /// A node is valid unless it is a placeholder or its tool reported errors
    pub fn is_valid(&self) -> bool {
        if matches!(self.kind, NodeKind::Invalid { .. }) {
            return false;
        }
        match &self.tool_errors {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => true,
            Some(serde_json::Value::Array(errors)) => errors.is_empty(),
            Some(serde_json::Value::Object(errors)) => errors.is_empty(),
            Some(serde_json::Value::String(error)) => error.is_empty(),
            Some(_) => false,
        }
    }

    /// Record a tool error: the form body is cleared and the node becomes invalid
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.form_html = None;
        self.tool_errors = Some(serde_json::json!([message.into()]));
    }

    pub fn inputs(&self) -> &[Terminal] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Terminal] {
        &self.outputs
    }

    pub fn input(&self, name: &str) -> Option<&Terminal> {
        self.inputs.iter().find(|t| t.name() == name)
    }

    pub fn output(&self, name: &str) -> Option<&Terminal> {
        self.outputs.iter().find(|t| t.name() == name)
    }

    pub fn terminal(&self, kind: TerminalKind, name: &str) -> Option<&Terminal> {
        match kind {
            TerminalKind::Input => self.input(name),
            TerminalKind::Output => self.output(name),
        }
    }

    pub(crate) fn terminal_mut(&mut self, kind: TerminalKind, name: &str) -> Option<&mut Terminal> {
        let side = match kind {
            TerminalKind::Input => &mut self.inputs,
            TerminalKind::Output => &mut self.outputs,
        };
        side.iter_mut().find(|t| t.name() == name)
    }

    /// Every connector attached to any of this node's terminals
    pub fn connector_ids(&self) -> Vec<ConnectorId> {
        let mut ids: Vec<ConnectorId> = self
            .inputs
            .iter()
            .chain(self.outputs.iter())
            .flat_map(|t| t.destroy())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn post_job_actions(&self) -> &PostJobActions {
        &self.post_job_actions
    }

    pub(crate) fn post_job_actions_mut(&mut self) -> &mut PostJobActions {
        &mut self.post_job_actions
    }

    pub fn add_post_job_action(&mut self, action: PostJobAction) {
        self.post_job_actions.insert(action.key(), action);
    }

    pub fn has_hide_actions(&self) -> bool {
        self.post_job_actions.values().any(PostJobAction::is_hide)
    }

    pub fn workflow_outputs(&self) -> &[String] {
        &self.workflow_outputs
    }

    pub fn has_explicit_outputs(&self) -> bool {
        !self.workflow_outputs.is_empty()
    }

    pub fn is_workflow_output(&self, output: &str) -> bool {
        self.workflow_outputs.iter().any(|o| o == output)
    }

    /// Outputs visible to the user after a run
    ///
    /// A node with neither explicit workflow outputs nor hide actions
    /// exposes every output.
    pub fn visible_outputs(&self) -> Vec<&str> {
        if !self.has_explicit_outputs() && !self.has_hide_actions() {
            return self.outputs.iter().map(Terminal::name).collect();
        }
        self.outputs
            .iter()
            .map(Terminal::name)
            .filter(|name| self.is_workflow_output(name))
            .collect()
    }

    /// Mark or unmark an output as a workflow output
    ///
    /// Returns whether anything changed.
    pub fn set_workflow_output(&mut self, output: &str, marked: bool) -> Result<bool> {
        if self.output(output).is_none() {
            return Err(EditorError::unknown_terminal(self.id, TerminalKind::Output, output));
        }
        let present = self.is_workflow_output(output);
        match (marked, present) {
            (true, false) => {
                self.workflow_outputs.push(output.to_string());
                Ok(true)
            }
            (false, true) => {
                self.workflow_outputs.retain(|o| o != output);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Replace workflow outputs, keeping only names of existing outputs
    pub(crate) fn restore_workflow_outputs(&mut self, outputs: impl IntoIterator<Item = String>) {
        self.workflow_outputs.clear();
        for output in outputs {
            if self.output(&output).is_some() && !self.is_workflow_output(&output) {
                self.workflow_outputs.push(output);
            } else if self.output(&output).is_none() {
                log::warn!(
                    "Node {} lists unknown workflow output '{}', ignoring",
                    self.id,
                    output
                );
            }
        }
    }

    /// Replace an existing input port in place
    ///
    /// The first connector of the old terminal is transplanted onto the
    /// new one; any others are returned for the workflow to destroy.
    /// Returns `None` if no input of that name exists.
    pub fn replace_input_port(&mut self, definition: &PortDefinition) -> Option<PortReplacement> {
        let index = self.inputs.iter().position(|t| t.name() == definition.name)?;
        let mut replacement = Terminal::new(self.id, TerminalKind::Input, definition);
        let mut old_connectors = self.inputs[index].take_connectors().into_iter();
        let transplanted = old_connectors.next();
        if let Some(connector) = transplanted {
            replacement.connect(connector);
        }
        self.inputs[index] = replacement;
        Some(PortReplacement {
            transplanted,
            dropped: old_connectors.collect(),
        })
    }

    /// Apply field data from the tool module service
    ///
    /// Inputs are rebuilt by name: existing ports are replaced in place,
    /// new ports appended and vanished ports removed. Outputs keep their
    /// terminal (and connectors) when the name survives. Port lists that
    /// are absent leave the current terminals alone.
    pub fn apply_data(&mut self, data: NodeData) -> PortUpdate {
        if let Some(name) = data.name {
            self.name = name;
        }
        if data.tool_state.is_some() {
            self.tool_state = data.tool_state;
        }
        if let Some(errors) = data.tool_errors {
            self.tool_errors = (!errors.is_null()).then_some(errors);
        }
        if data.tooltip.is_some() {
            self.tooltip = data.tooltip;
        }
        if data.form_html.is_some() {
            self.form_html = data.form_html;
        }
        if let Some(annotation) = data.annotation {
            self.annotation = annotation;
        }
        if let Some(actions) = data.post_job_actions {
            self.post_job_actions = actions.into_values().map(|a| (a.key(), a)).collect();
        }

        let mut update = PortUpdate::default();
        if let Some(inputs) = &data.data_inputs {
            self.rebuild_inputs(inputs, &mut update);
        }
        if let Some(outputs) = &data.data_outputs {
            self.rebuild_outputs(outputs, &mut update);
        }

        let outputs: Vec<String> = self.outputs.iter().map(|t| t.name().to_string()).collect();
        self.workflow_outputs.retain(|o| outputs.contains(o));
        update
    }

    fn rebuild_inputs(&mut self, definitions: &[PortDefinition], update: &mut PortUpdate) {
        let mut rebuilt = Vec::with_capacity(definitions.len());
        for definition in definitions {
            match self.replace_input_port(definition) {
                Some(replacement) => {
                    update.transplanted.extend(replacement.transplanted);
                    update.dropped.extend(replacement.dropped);
                    if let Some(index) = self.inputs.iter().position(|t| t.name() == definition.name) {
                        rebuilt.push(self.inputs.remove(index));
                    }
                }
                None => rebuilt.push(Terminal::new(self.id, TerminalKind::Input, definition)),
            }
        }
        for mut vanished in std::mem::take(&mut self.inputs) {
            update.dropped.extend(vanished.take_connectors());
        }
        self.inputs = rebuilt;
    }

    fn rebuild_outputs(&mut self, definitions: &[PortDefinition], update: &mut PortUpdate) {
        let mut rebuilt = Vec::with_capacity(definitions.len());
        for definition in definitions {
            match self.outputs.iter().position(|t| t.name() == definition.name) {
                Some(index) => {
                    let mut kept = self.outputs.remove(index);
                    kept.set_datatypes(definition.extensions.clone());
                    rebuilt.push(kept);
                }
                None => rebuilt.push(Terminal::new(self.id, TerminalKind::Output, definition)),
            }
        }
        for mut vanished in std::mem::take(&mut self.outputs) {
            update.dropped.extend(vanished.take_connectors());
        }
        self.outputs = rebuilt;
    }
}
