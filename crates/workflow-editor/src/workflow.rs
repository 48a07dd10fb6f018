//! The workflow: graph container and editing session state
//!
//! A [`Workflow`] owns every node and every connector, assigns node ids,
//! tracks the unsaved-changes flag and the single active node, and is the
//! only component that mutates the graph. Renderers observe it through
//! the [`EventSink`] and the [`FormRenderer`]; neither can change topology.
//!
//! # Example
//!
//! ```ignore
//! let mut workflow = Workflow::new("RNA-seq", registry);
//! let a = workflow.add_node(Node::new(NodeKind::tool("cat1"), "Concatenate")
//!     .with_outputs([PortDefinition::new("out_file1", ["tabular"])]));
//! let b = workflow.add_node(Node::new(NodeKind::tool("sort1"), "Sort")
//!     .with_inputs([PortDefinition::new("input", ["tabular"])]));
//! workflow.connect(&TerminalRef::output(a, "out_file1"), &TerminalRef::input(b, "input"))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::connector::Connector;
use crate::datatypes::DatatypeRegistry;
use crate::error::{EditorError, Result};
use crate::events::{EditorEvent, EventSink, NullEventSink};
use crate::form::{FormRenderer, FormView, NullFormRenderer};
use crate::node::{Node, NodeData};
use crate::terminal::Terminal;
use crate::types::{ConnectorId, NodeId, Position, TerminalKind, TerminalRef};

/// The graph plus its editing session state
pub struct Workflow {
    pub(crate) name: String,
    pub(crate) nodes: BTreeMap<NodeId, Node>,
    pub(crate) connectors: BTreeMap<ConnectorId, Connector>,
    pub(crate) id_counter: NodeId,
    pub(crate) connector_counter: ConnectorId,
    pub(crate) has_changes: bool,
    pub(crate) active_node: Option<NodeId>,
    datatypes: Arc<DatatypeRegistry>,
    events: Arc<dyn EventSink>,
    forms: Arc<dyn FormRenderer>,
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("connectors", &self.connectors.len())
            .field("has_changes", &self.has_changes)
            .field("active_node", &self.active_node)
            .finish()
    }
}

impl Workflow {
    /// Create an empty workflow
    pub fn new(name: impl Into<String>, datatypes: DatatypeRegistry) -> Self {
        Self::with_shared_datatypes(name, Arc::new(datatypes))
    }

    /// Create an empty workflow sharing an already loaded datatype table
    pub fn with_shared_datatypes(name: impl Into<String>, datatypes: Arc<DatatypeRegistry>) -> Self {
        Self {
            name: name.into(),
            nodes: BTreeMap::new(),
            connectors: BTreeMap::new(),
            id_counter: 0,
            connector_counter: 0,
            has_changes: false,
            active_node: None,
            datatypes,
            events: Arc::new(NullEventSink),
            forms: Arc::new(NullFormRenderer),
        }
    }

    /// Attach the view layer's event sink
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Attach the tool-form renderer
    pub fn with_form_renderer(mut self, forms: Arc<dyn FormRenderer>) -> Self {
        self.forms = forms;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.has_changes = true;
    }

    pub fn datatypes(&self) -> &DatatypeRegistry {
        &self.datatypes
    }

    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Clear the unsaved-changes flag after a successful save
    pub fn mark_saved(&mut self) {
        self.has_changes = false;
    }

    pub fn active_node(&self) -> Option<NodeId> {
        self.active_node
    }

    /// Id the next added node will receive
    pub fn next_node_id(&self) -> NodeId {
        self.id_counter
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Mutable access for field edits; call [`Workflow::node_changed`] afterwards
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors.get(&id)
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.values()
    }

    /// Complete edges as (output, input) pairs
    pub fn edges(&self) -> impl Iterator<Item = (&TerminalRef, &TerminalRef)> {
        self.connectors.values().filter_map(Connector::endpoints)
    }

    pub fn terminal(&self, reference: &TerminalRef) -> Option<&Terminal> {
        self.nodes
            .get(&reference.node)?
            .terminal(reference.kind, &reference.name)
    }

    fn require_terminal(&self, reference: &TerminalRef) -> Result<&Terminal> {
        let node = self
            .nodes
            .get(&reference.node)
            .ok_or(EditorError::NodeNotFound(reference.node))?;
        node.terminal(reference.kind, &reference.name).ok_or_else(|| {
            EditorError::unknown_terminal(reference.node, reference.kind, &reference.name)
        })
    }

    pub(crate) fn emit(&self, event: EditorEvent) {
        if let Err(e) = self.events.send(event) {
            log::debug!("Dropping editor event: {}", e);
        }
    }

    pub(crate) fn show_form(&self, view: FormView) {
        self.forms.show_form(view);
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Register a node, assigning it the next id
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = self.id_counter;
        self.id_counter += 1;
        node.set_id(id);
        self.nodes.insert(id, node);
        self.has_changes = true;
        log::debug!("Added node {}", id);
        self.emit(EditorEvent::NodeAdded { node_id: id });
        id
    }

    /// Register a node under an id it already has (document load)
    pub(crate) fn insert_node_with_id(&mut self, id: NodeId, mut node: Node) {
        node.set_id(id);
        self.nodes.insert(id, node);
        self.id_counter = self.id_counter.max(id + 1);
        self.emit(EditorEvent::NodeAdded { node_id: id });
    }

    /// Deregister a node
    ///
    /// Connectors are not torn down here; a node that still has any is
    /// refused so that no connector ever points at a missing node. Use
    /// [`Workflow::destroy_node`] to do both.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let node = self.nodes.get(&id).ok_or(EditorError::NodeNotFound(id))?;
        let count = node.connector_ids().len();
        if count > 0 {
            return Err(EditorError::NodeStillConnected { node: id, count });
        }
        if self.active_node == Some(id) {
            self.clear_active_node();
        }
        let node = self.nodes.remove(&id).ok_or(EditorError::NodeNotFound(id))?;
        self.has_changes = true;
        log::debug!("Removed node {}", id);
        self.emit(EditorEvent::NodeRemoved { node_id: id });
        Ok(node)
    }

    /// Destroy a node's terminals (and their connectors), then deregister it
    pub fn destroy_node(&mut self, id: NodeId) -> Result<Node> {
        let node = self.nodes.get(&id).ok_or(EditorError::NodeNotFound(id))?;
        for connector in node.connector_ids() {
            self.destroy_connector(connector);
        }
        self.remove_node(id)
    }

    /// Destroy every node
    pub fn remove_all(&mut self) {
        for id in self.node_ids() {
            if let Err(e) = self.destroy_node(id) {
                log::warn!("Failed to remove node {}: {}", id, e);
            }
        }
        // Only dangling drag proxies can remain at this point
        let leftovers: Vec<ConnectorId> = self.connectors.keys().copied().collect();
        for connector in leftovers {
            self.destroy_connector(connector);
        }
    }

    /// Record that a node changed
    ///
    /// Sets the unsaved-changes flag and, if the node is active, pushes
    /// its refreshed form to the renderer.
    pub fn node_changed(&mut self, id: NodeId) {
        self.has_changes = true;
        self.emit(EditorEvent::NodeChanged { node_id: id });
        if self.active_node == Some(id) {
            if let Some(node) = self.nodes.get(&id) {
                self.show_form(FormView::for_node(node));
            }
        }
    }

    /// Apply field data from the tool module service
    ///
    /// Safe to call long after the refresh was requested: ports are
    /// matched by name, and data for a node that has since been deleted
    /// is ignored. Returns whether the data was applied.
    pub fn update_node_data(&mut self, id: NodeId, data: NodeData) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            log::warn!("Discarding field data for node {} which no longer exists", id);
            return false;
        };
        let update = node.apply_data(data);

        let rewired: Vec<(ConnectorId, TerminalRef)> = node
            .inputs()
            .iter()
            .flat_map(|t| t.connectors().iter().map(move |c| (*c, t.reference())))
            .filter(|(c, _)| update.transplanted.contains(c))
            .collect();
        for (connector, target) in rewired {
            if let Some(c) = self.connectors.get_mut(&connector) {
                c.target = Some(target);
            }
        }

        if !update.dropped.is_empty() {
            log::warn!(
                "Node {} lost {} connection(s) after its ports were refreshed",
                id,
                update.dropped.len()
            );
        }
        for connector in update.dropped {
            self.destroy_connector(connector);
        }

        self.emit(EditorEvent::TerminalsReplaced { node_id: id });
        self.node_changed(id);
        true
    }

    /// Store a tool error on a node; the node stays editable
    pub fn set_node_error(&mut self, id: NodeId, message: impl Into<String>) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(EditorError::NodeNotFound(id))?;
        node.set_error(message);
        self.node_changed(id);
        Ok(())
    }

    /// Mark or unmark one of a node's outputs as a workflow output
    pub fn set_workflow_output(&mut self, id: NodeId, output: &str, marked: bool) -> Result<bool> {
        let node = self.nodes.get_mut(&id).ok_or(EditorError::NodeNotFound(id))?;
        let changed = node.set_workflow_output(output, marked)?;
        if changed {
            self.node_changed(id);
        }
        Ok(changed)
    }

    /// Move a node on the canvas
    pub fn set_node_position(&mut self, id: NodeId, position: Position) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(EditorError::NodeNotFound(id))?;
        node.position = position;
        self.has_changes = true;
        self.emit(EditorEvent::NodeMoved {
            node_id: id,
            position,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Focus
    // ------------------------------------------------------------------

    /// Commit pending edits of the open form into the active node
    pub fn flush_active_form(&mut self) {
        let Some(active) = self.active_node else {
            return;
        };
        if let Some(data) = self.forms.flush_pending(active) {
            log::debug!("Committing pending form edits for node {}", active);
            self.update_node_data(active, data);
        }
    }

    /// Focus a node
    ///
    /// Pending edits in the currently open form are committed first so
    /// that switching focus never loses them.
    pub fn set_active_node(&mut self, id: NodeId) -> Result<()> {
        if self.active_node == Some(id) {
            return Ok(());
        }
        if !self.nodes.contains_key(&id) {
            return Err(EditorError::NodeNotFound(id));
        }
        self.flush_active_form();
        self.active_node = Some(id);
        if let Some(node) = self.nodes.get(&id) {
            self.show_form(FormView::for_node(node));
        }
        self.emit(EditorEvent::ActiveNodeChanged { node_id: Some(id) });
        Ok(())
    }

    /// Drop focus and show the neutral form
    pub fn clear_active_node(&mut self) {
        let previous = self.active_node.take();
        self.show_form(FormView::empty());
        if previous.is_some() {
            self.emit(EditorEvent::ActiveNodeChanged { node_id: None });
        }
    }

    // ------------------------------------------------------------------
    // Connectors
    // ------------------------------------------------------------------

    /// Whether `input` would accept a connector from `output`
    pub fn can_accept(&self, input: &TerminalRef, output: &TerminalRef) -> bool {
        let (Some(target), Some(source), Some(producer)) = (
            self.terminal(input),
            self.terminal(output),
            self.nodes.get(&output.node),
        ) else {
            return false;
        };
        target.can_accept(source, producer.post_job_actions(), &self.datatypes)
    }

    /// Connect an output to an input if the input accepts it
    ///
    /// Returns `Ok(None)` when the connection is incompatible; nothing is
    /// created in that case. Unknown nodes or terminals are errors.
    pub fn connect(&mut self, output: &TerminalRef, input: &TerminalRef) -> Result<Option<ConnectorId>> {
        self.require_terminal(output)?;
        self.require_terminal(input)?;
        if !self.can_accept(input, output) {
            log::debug!("Rejected connection {} -> {}", output, input);
            return Ok(None);
        }
        self.connect_terminals(Some(output.clone()), Some(input.clone()))
            .map(Some)
    }

    /// Create a connector between two terminals without checking types
    ///
    /// Either end may be `None` for a dangling drag proxy.
    pub fn connect_terminals(
        &mut self,
        source: Option<TerminalRef>,
        target: Option<TerminalRef>,
    ) -> Result<ConnectorId> {
        for end in source.iter().chain(target.iter()) {
            self.require_terminal(end)?;
        }
        let id = self.connector_counter;
        self.connector_counter += 1;

        for end in source.iter().chain(target.iter()) {
            if let Some(terminal) = self
                .nodes
                .get_mut(&end.node)
                .and_then(|n| n.terminal_mut(end.kind, &end.name))
            {
                terminal.connect(id);
            }
        }
        self.connectors
            .insert(id, Connector::new(id, source.clone(), target.clone()));
        log::debug!("Created connector {}", id);
        self.emit(EditorEvent::ConnectorAdded {
            connector_id: id,
            source: source.clone(),
            target: target.clone(),
        });
        for node in touched_nodes(&source, &target) {
            self.node_changed(node);
        }
        Ok(id)
    }

    /// Attach the missing end of a dangling connector
    ///
    /// The end must currently be empty. When both ends would be set the
    /// input has to accept the output, as with [`Workflow::connect`].
    pub(crate) fn attach_end(&mut self, id: ConnectorId, end: TerminalRef) -> Result<()> {
        self.require_terminal(&end)?;
        let connector = self
            .connectors
            .get(&id)
            .ok_or(EditorError::ConnectorNotFound(id))?;
        let (occupied, opposite) = match end.kind {
            TerminalKind::Input => (&connector.target, &connector.source),
            TerminalKind::Output => (&connector.source, &connector.target),
        };
        if occupied.is_some() {
            return Err(EditorError::ConnectorEndOccupied {
                connector: id,
                kind: end.kind,
            });
        }
        let (output, input) = match (end.kind, opposite.clone()) {
            (TerminalKind::Input, Some(output)) => (Some(output), end.clone()),
            (TerminalKind::Output, Some(input)) => (Some(end.clone()), input),
            (TerminalKind::Input, None) => (None, end.clone()),
            (TerminalKind::Output, None) => (None, end.clone()),
        };
        let refused = match &output {
            Some(output) => !self.can_accept(&input, output),
            None => self
                .terminal(&input)
                .is_some_and(|t| t.kind() == TerminalKind::Input && !t.multiple() && t.is_connected()),
        };
        if refused {
            let output = output.unwrap_or_else(|| end.clone());
            log::debug!("Refused to attach connector {}: {} -> {}", id, output, input);
            return Err(EditorError::IncompatibleConnection { output, input });
        }

        if let Some(connector) = self.connectors.get_mut(&id) {
            match end.kind {
                TerminalKind::Input => connector.target = Some(end.clone()),
                TerminalKind::Output => connector.source = Some(end.clone()),
            }
        }
        if let Some(terminal) = self
            .nodes
            .get_mut(&end.node)
            .and_then(|n| n.terminal_mut(end.kind, &end.name))
        {
            terminal.connect(id);
        }
        self.node_changed(end.node);
        Ok(())
    }

    /// Detach one end of a connector, leaving it dangling
    pub(crate) fn detach_end(&mut self, id: ConnectorId, kind: TerminalKind) -> Option<TerminalRef> {
        let connector = self.connectors.get_mut(&id)?;
        let end = match kind {
            TerminalKind::Input => connector.target.take(),
            TerminalKind::Output => connector.source.take(),
        }?;
        if let Some(terminal) = self
            .nodes
            .get_mut(&end.node)
            .and_then(|n| n.terminal_mut(end.kind, &end.name))
        {
            terminal.disconnect(id);
        }
        self.node_changed(end.node);
        Some(end)
    }

    /// Destroy a connector, detaching it from both ends
    ///
    /// Destroying a connector that no longer exists is a no-op; returns
    /// whether anything was destroyed.
    pub fn destroy_connector(&mut self, id: ConnectorId) -> bool {
        let Some(connector) = self.connectors.remove(&id) else {
            return false;
        };
        let mut touched = Vec::new();
        for end in connector.attached_ends() {
            let detached = self
                .nodes
                .get_mut(&end.node)
                .and_then(|n| n.terminal_mut(end.kind, &end.name))
                .is_some_and(|t| t.disconnect(id));
            if detached {
                touched.push(end.node);
            }
        }
        log::debug!("Destroyed connector {}", id);
        self.emit(EditorEvent::ConnectorRemoved { connector_id: id });
        for node in touched {
            self.node_changed(node);
        }
        true
    }

    /// Nodes directly downstream of `id`
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.edges()
            .filter(|(source, _)| source.node == id)
            .map(|(_, target)| target.node)
            .collect()
    }

    /// Nodes directly upstream of `id`
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.edges()
            .filter(|(_, target)| target.node == id)
            .map(|(source, _)| source.node)
            .collect()
    }
}

fn touched_nodes(source: &Option<TerminalRef>, target: &Option<TerminalRef>) -> Vec<NodeId> {
    let mut nodes: Vec<NodeId> = source.iter().chain(target.iter()).map(|t| t.node).collect();
    nodes.dedup();
    nodes
}
