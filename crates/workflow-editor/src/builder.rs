//! Fluent builder for workflow documents
//!
//! Provides a fluent API for constructing documents programmatically,
//! mainly for fixtures and for hosts that generate workflows.

use std::collections::BTreeMap;

use crate::document::{ConnectionRecord, InputConnections, StepRecord, WorkflowDocument};
use crate::types::{NodeId, NodeKind, PortDefinition, Position, PostJobAction};

/// Fluent builder for constructing workflow documents
///
/// Steps get ids in the order they are added, starting at 0.
///
/// # Example
///
/// ```ignore
/// let document = WorkflowBuilder::new("Sort a table")
///     .add_data_input("Input dataset")
///     .add_tool("sort1", "Sort")
///     .with_input(PortDefinition::new("input", ["tabular"]))
///     .with_output(PortDefinition::new("out_file1", ["tabular"]))
///     .connect(0, "output", 1, "input")
///     .build();
/// ```
pub struct WorkflowBuilder {
    name: String,
    steps: Vec<StepRecord>,
    connections: Vec<(NodeId, String, NodeId, String)>,
}

impl WorkflowBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            connections: Vec::new(),
        }
    }

    fn push_step(mut self, kind: NodeKind, name: String) -> Self {
        let id = self.steps.len() as NodeId;
        self.steps.push(StepRecord {
            id,
            node_type: kind.type_name().to_string(),
            tool_id: kind.tool_id().map(str::to_string),
            name,
            tool_state: None,
            tool_errors: None,
            tooltip: None,
            form_html: None,
            annotation: String::new(),
            data_inputs: Vec::new(),
            data_outputs: Vec::new(),
            input_connections: BTreeMap::new(),
            position: Position::default(),
            post_job_actions: BTreeMap::new(),
            workflow_outputs: Vec::new(),
        });
        self
    }

    /// Add a tool step
    pub fn add_tool(self, tool_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.push_step(NodeKind::tool(tool_id), name.into())
    }

    /// Add a dataset input step with its single `output` port
    pub fn add_data_input(self, name: impl Into<String>) -> Self {
        self.push_step(NodeKind::DataInput, name.into())
            .with_output(PortDefinition::new("output", ["input"]))
    }

    /// Add an input port to the most recently added step
    pub fn with_input(mut self, port: PortDefinition) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.input_connections.insert(port.name.clone(), None);
            step.data_inputs.push(port);
        }
        self
    }

    /// Add an output port to the most recently added step
    pub fn with_output(mut self, port: PortDefinition) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.data_outputs.push(port);
        }
        self
    }

    /// Set tool state on the most recently added step
    pub fn with_tool_state(mut self, state: serde_json::Value) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.tool_state = Some(state);
        }
        self
    }

    /// Mark outputs of the most recently added step as workflow outputs
    pub fn with_workflow_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(step) = self.steps.last_mut() {
            step.workflow_outputs.extend(outputs.into_iter().map(Into::into));
        }
        self
    }

    /// Attach a post-job action to the most recently added step
    pub fn with_post_job_action(mut self, action: PostJobAction) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.post_job_actions.insert(action.key().wire_key(), action);
        }
        self
    }

    /// Place the most recently added step
    pub fn at(mut self, top: f64, left: f64) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.position = Position::new(top, left);
        }
        self
    }

    /// Connect an output of one step to an input of another
    pub fn connect(
        mut self,
        source: NodeId,
        output_name: impl Into<String>,
        target: NodeId,
        input_name: impl Into<String>,
    ) -> Self {
        self.connections
            .push((source, output_name.into(), target, input_name.into()));
        self
    }

    /// Build the document without validation
    pub fn build(mut self) -> WorkflowDocument {
        for (source, output_name, target, input_name) in self.connections {
            let Some(step) = self.steps.get_mut(target as usize) else {
                log::warn!("Builder connection targets missing step {}, skipping", target);
                continue;
            };
            let record = ConnectionRecord::new(source, output_name);
            let entry = step.input_connections.entry(input_name).or_insert(None);
            let mut records = entry
                .take()
                .map(|existing| existing.records().to_vec())
                .unwrap_or_default();
            records.push(record);
            *entry = Some(InputConnections::Many(records));
        }

        WorkflowDocument {
            name: self.name,
            steps: self.steps.into_iter().map(|s| (s.id, s)).collect(),
        }
    }
}
