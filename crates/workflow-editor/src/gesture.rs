//! Pointer gestures delivered by the view layer
//!
//! The view reports drag starts, moves and drops; these methods turn them
//! into graph edits. A connector drag is backed by a dangling connector
//! that is always destroyed when the gesture ends, so a cancelled drag
//! never leaves a partial edge behind.

use crate::error::{EditorError, Result};
use crate::types::{ConnectorId, NodeId, Position, TerminalKind, TerminalRef};
use crate::workflow::Workflow;

/// A node being moved
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDrag {
    pub node: NodeId,
    /// Position when the drag began
    pub origin: Position,
}

/// A connector being dragged out of an output terminal
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorDrag {
    /// The dangling connector following the pointer
    pub connector: ConnectorId,
    pub source: TerminalRef,
}

impl Workflow {
    /// Start moving a node; the node becomes active
    pub fn begin_node_drag(&mut self, id: NodeId) -> Result<NodeDrag> {
        self.set_active_node(id)?;
        let origin = self
            .node(id)
            .map(|n| n.position)
            .ok_or(EditorError::NodeNotFound(id))?;
        Ok(NodeDrag { node: id, origin })
    }

    /// Move a dragged node by the total pointer offset since the drag began
    pub fn drag_node(&mut self, drag: &NodeDrag, dx: f64, dy: f64) -> Result<()> {
        self.set_node_position(drag.node, drag.origin.offset(dx, dy))
    }

    pub fn end_node_drag(&mut self, drag: NodeDrag) {
        if self.node(drag.node).is_some() {
            self.node_changed(drag.node);
        }
    }

    /// Start dragging a connector from a terminal
    ///
    /// From an output, a new dangling connector is created. From a
    /// connected input, its most recent connector is picked up and
    /// dragged from its source. An unconnected input yields `None`.
    pub fn begin_connector_drag(&mut self, terminal: &TerminalRef) -> Result<Option<ConnectorDrag>> {
        let picked = self
            .terminal(terminal)
            .ok_or_else(|| {
                EditorError::unknown_terminal(terminal.node, terminal.kind, &terminal.name)
            })?
            .connectors()
            .last()
            .copied();

        match terminal.kind {
            TerminalKind::Output => {
                self.flush_active_form();
                let connector = self.connect_terminals(Some(terminal.clone()), None)?;
                Ok(Some(ConnectorDrag {
                    connector,
                    source: terminal.clone(),
                }))
            }
            TerminalKind::Input => {
                let Some(connector) = picked else {
                    return Ok(None);
                };
                self.detach_end(connector, TerminalKind::Input);
                let source = self.connector(connector).and_then(|c| c.source.clone());
                match source {
                    Some(source) => Ok(Some(ConnectorDrag { connector, source })),
                    None => {
                        self.destroy_connector(connector);
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Whether dropping the drag on `target` would connect
    pub fn hover_connector_drag(&self, drag: &ConnectorDrag, target: Option<&TerminalRef>) -> bool {
        target.is_some_and(|input| self.can_accept(input, &drag.source))
    }

    /// Finish a connector drag
    ///
    /// The dangling connector is destroyed; a real connector is created
    /// only when dropped on an input that accepts the source.
    pub fn end_connector_drag(
        &mut self,
        drag: ConnectorDrag,
        target: Option<&TerminalRef>,
    ) -> Result<Option<ConnectorId>> {
        self.destroy_connector(drag.connector);
        let Some(input) = target else {
            log::debug!("Connector drag from {} cancelled", drag.source);
            return Ok(None);
        };
        if input.kind != TerminalKind::Input || self.terminal(input).is_none() {
            return Ok(None);
        }
        self.connect(&drag.source, input)
    }

    /// Reattach a dangling connector's missing end
    pub fn complete_connector(&mut self, id: ConnectorId, end: TerminalRef) -> Result<()> {
        self.attach_end(id, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::sample_registry;
    use crate::node::Node;
    use crate::types::{NodeKind, PortDefinition};

    fn graph() -> (Workflow, NodeId, NodeId, NodeId) {
        let mut workflow = Workflow::new("t", sample_registry());
        let a = workflow.add_node(
            Node::new(NodeKind::tool("a"), "a").with_outputs([PortDefinition::new("out1", ["bed"])]),
        );
        let b = workflow.add_node(
            Node::new(NodeKind::tool("b"), "b").with_inputs([PortDefinition::new("in1", ["tabular"])]),
        );
        let c = workflow.add_node(
            Node::new(NodeKind::tool("c"), "c").with_inputs([PortDefinition::new("in1", ["fasta"])]),
        );
        (workflow, a, b, c)
    }

    #[test]
    fn test_node_drag() {
        let (mut workflow, a, _, _) = graph();
        workflow.set_node_position(a, Position::new(10.0, 10.0)).unwrap();
        let drag = workflow.begin_node_drag(a).unwrap();
        assert_eq!(workflow.active_node(), Some(a));
        workflow.drag_node(&drag, 5.0, 3.0).unwrap();
        workflow.drag_node(&drag, 20.0, -4.0).unwrap();
        workflow.end_node_drag(drag);
        assert_eq!(workflow.node(a).unwrap().position, Position::new(6.0, 30.0));
    }

    #[test]
    fn test_connector_drag_drop_on_compatible_input() {
        let (mut workflow, a, b, _) = graph();
        let drag = workflow
            .begin_connector_drag(&TerminalRef::output(a, "out1"))
            .unwrap()
            .unwrap();
        assert!(workflow.connector(drag.connector).unwrap().is_dangling());

        let target = TerminalRef::input(b, "in1");
        assert!(workflow.hover_connector_drag(&drag, Some(&target)));
        let created = workflow.end_connector_drag(drag, Some(&target)).unwrap();

        assert!(created.is_some());
        assert_eq!(workflow.connectors().count(), 1);
        assert!(workflow.connectors().all(|c| !c.is_dangling()));
    }

    #[test]
    fn test_connector_drag_cancel_leaves_nothing() {
        let (mut workflow, a, _, c) = graph();
        let drag = workflow
            .begin_connector_drag(&TerminalRef::output(a, "out1"))
            .unwrap()
            .unwrap();
        let target = TerminalRef::input(c, "in1");
        assert!(!workflow.hover_connector_drag(&drag, Some(&target)));
        assert_eq!(workflow.end_connector_drag(drag, Some(&target)).unwrap(), None);

        assert_eq!(workflow.connectors().count(), 0);
        assert!(!workflow.node(a).unwrap().output("out1").unwrap().is_connected());
        assert!(!workflow.node(c).unwrap().input("in1").unwrap().is_connected());
    }

    #[test]
    fn test_pick_up_existing_connector() {
        let (mut workflow, a, b, _) = graph();
        let target = TerminalRef::input(b, "in1");
        workflow
            .connect(&TerminalRef::output(a, "out1"), &target)
            .unwrap()
            .unwrap();

        let drag = workflow.begin_connector_drag(&target).unwrap().unwrap();
        assert_eq!(drag.source, TerminalRef::output(a, "out1"));
        assert!(!workflow.node(b).unwrap().input("in1").unwrap().is_connected());

        workflow.end_connector_drag(drag, None).unwrap();
        assert_eq!(workflow.connectors().count(), 0);
    }

    #[test]
    fn test_unconnected_input_drag_is_none() {
        let (mut workflow, _, b, _) = graph();
        assert!(workflow
            .begin_connector_drag(&TerminalRef::input(b, "in1"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_complete_dangling_connector() {
        let (mut workflow, a, b, _) = graph();
        let id = workflow
            .connect_terminals(Some(TerminalRef::output(a, "out1")), None)
            .unwrap();
        workflow
            .complete_connector(id, TerminalRef::input(b, "in1"))
            .unwrap();
        assert!(!workflow.connector(id).unwrap().is_dangling());
        assert_eq!(workflow.successors(a), vec![b]);
    }

    #[test]
    fn test_complete_connector_refuses_attached_end() {
        let (mut workflow, a, b, c) = graph();
        let id = workflow
            .connect(&TerminalRef::output(a, "out1"), &TerminalRef::input(b, "in1"))
            .unwrap()
            .unwrap();

        let err = workflow
            .complete_connector(id, TerminalRef::input(c, "in1"))
            .unwrap_err();
        assert!(matches!(err, EditorError::ConnectorEndOccupied { connector, .. } if connector == id));
        assert_eq!(workflow.connector(id).unwrap().target, Some(TerminalRef::input(b, "in1")));
        assert!(!workflow.node(c).unwrap().input("in1").unwrap().is_connected());

        workflow.destroy_connector(id);
        assert!(!workflow.node(b).unwrap().input("in1").unwrap().is_connected());
        assert!(workflow.can_accept(&TerminalRef::input(b, "in1"), &TerminalRef::output(a, "out1")));
    }

    #[test]
    fn test_complete_connector_checks_compatibility() {
        let (mut workflow, a, b, c) = graph();
        let id = workflow
            .connect_terminals(Some(TerminalRef::output(a, "out1")), None)
            .unwrap();

        // bed is not a fasta
        let err = workflow
            .complete_connector(id, TerminalRef::input(c, "in1"))
            .unwrap_err();
        assert!(matches!(err, EditorError::IncompatibleConnection { .. }));
        assert!(workflow.connector(id).unwrap().is_dangling());
        assert!(!workflow.node(c).unwrap().input("in1").unwrap().is_connected());

        // single-connection input already taken
        workflow
            .connect(&TerminalRef::output(a, "out1"), &TerminalRef::input(b, "in1"))
            .unwrap()
            .unwrap();
        assert!(workflow
            .complete_connector(id, TerminalRef::input(b, "in1"))
            .is_err());
        assert_eq!(workflow.node(b).unwrap().input("in1").unwrap().connectors().len(), 1);
    }
}
