//! Terminals: the connection points on a node
//!
//! A terminal only records which connectors are attached to it. The
//! connectors themselves live in the workflow's arena, which is the only
//! place that creates or destroys them.

use crate::datatypes::DatatypeRegistry;
use crate::types::{
    ConnectorId, NodeId, PortDefinition, PostJobActions, TerminalKind, TerminalRef,
    WILDCARD_DATATYPE,
};

/// One input or output connection point
#[derive(Debug, Clone, PartialEq)]
pub struct Terminal {
    node: NodeId,
    kind: TerminalKind,
    name: String,
    label: Option<String>,
    datatypes: Vec<String>,
    multiple: bool,
    connectors: Vec<ConnectorId>,
}

impl Terminal {
    /// Create an empty terminal from a port definition
    pub fn new(node: NodeId, kind: TerminalKind, definition: &PortDefinition) -> Self {
        Self {
            node,
            kind,
            name: definition.name.clone(),
            label: definition.label.clone(),
            datatypes: definition.extensions.clone(),
            // Fan-out is always allowed, the flag only matters for inputs
            multiple: kind == TerminalKind::Input && definition.multiple,
            connectors: Vec::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> TerminalKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn datatypes(&self) -> &[String] {
        &self.datatypes
    }

    pub fn multiple(&self) -> bool {
        self.multiple
    }

    /// Whether another connector may still be attached
    pub fn accepts_multiple_inputs(&self) -> bool {
        self.kind == TerminalKind::Output || self.multiple
    }

    pub fn connectors(&self) -> &[ConnectorId] {
        &self.connectors
    }

    pub fn is_connected(&self) -> bool {
        !self.connectors.is_empty()
    }

    /// Address of this terminal
    pub fn reference(&self) -> TerminalRef {
        TerminalRef {
            node: self.node,
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// Port definition equivalent to this terminal
    pub fn definition(&self) -> PortDefinition {
        PortDefinition {
            name: self.name.clone(),
            label: self.label.clone(),
            extensions: self.datatypes.clone(),
            multiple: self.multiple,
        }
    }

    pub(crate) fn set_node(&mut self, node: NodeId) {
        self.node = node;
    }

    pub(crate) fn set_datatypes(&mut self, datatypes: Vec<String>) {
        self.datatypes = datatypes;
    }

    /// Attach a connector
    pub fn connect(&mut self, connector: ConnectorId) {
        if !self.connectors.contains(&connector) {
            self.connectors.push(connector);
        }
    }

    /// Detach a connector; returns false if it was not attached
    pub fn disconnect(&mut self, connector: ConnectorId) -> bool {
        match self.connectors.iter().position(|c| *c == connector) {
            Some(index) => {
                self.connectors.remove(index);
                true
            }
            None => false,
        }
    }

    /// Snapshot of the attached connectors, for teardown
    ///
    /// The caller destroys each connector from the returned list, which
    /// detaches it from this terminal as it goes.
    pub fn destroy(&self) -> Vec<ConnectorId> {
        self.connectors.clone()
    }

    pub(crate) fn take_connectors(&mut self) -> Vec<ConnectorId> {
        std::mem::take(&mut self.connectors)
    }

    /// Whether this input terminal accepts a connector from `output`
    ///
    /// `producer_actions` are the post-job actions of the node owning
    /// `output`; change-datatype actions widen what it produces.
    pub fn can_accept(
        &self,
        output: &Terminal,
        producer_actions: &PostJobActions,
        datatypes: &DatatypeRegistry,
    ) -> bool {
        if self.kind != TerminalKind::Input || output.kind != TerminalKind::Output {
            return false;
        }
        if self.is_connected() && !self.multiple {
            return false;
        }
        if self.datatypes.iter().any(|t| t == WILDCARD_DATATYPE) {
            return true;
        }

        let produced = produced_datatypes(output, producer_actions);
        produced.iter().any(|candidate| {
            candidate == WILDCARD_DATATYPE
                || self
                    .datatypes
                    .iter()
                    .any(|accepted| datatypes.is_subtype(candidate, accepted))
        })
    }
}

/// Declared datatypes of an output plus any change-datatype targets
pub fn produced_datatypes(output: &Terminal, producer_actions: &PostJobActions) -> Vec<String> {
    let mut produced = output.datatypes.clone();
    for action in producer_actions.values() {
        if let Some(newtype) = action.new_datatype_for(&output.name) {
            produced.push(newtype.to_string());
        }
    }
    produced
}
