//! Keeping workflow outputs and hide actions in agreement
//!
//! An output is user-visible after a run unless a `HideDatasetAction`
//! suppresses it. Users mark outputs explicitly; [`Workflow::rectify_outputs`]
//! rewrites the hide actions so they always match those marks.
//!
//! Nodes that were never touched default to all outputs visible: once any
//! node opts into explicit marking, a tool node with no marks gets every
//! output marked before hide actions are synthesised.

use crate::form::FormView;
use crate::node::Node;
use crate::types::{NodeId, PostJobAction};
use crate::workflow::Workflow;

/// Whether any tool node has explicit outputs, and whether any has hide actions
fn scan_markers<'a>(nodes: impl Iterator<Item = &'a Node>) -> (bool, bool) {
    let mut explicit = false;
    let mut hidden = false;
    for node in nodes.filter(|n| n.is_tool()) {
        explicit |= node.has_explicit_outputs();
        hidden |= node.has_hide_actions();
    }
    (explicit, hidden)
}

/// Rewrite one tool node's hide actions; returns whether anything changed
fn rectify_node(node: &mut Node, explicit_outputs: bool) -> bool {
    let before_actions = node.post_job_actions().clone();
    let before_outputs = node.workflow_outputs().to_vec();

    node.post_job_actions_mut().retain(|_, action| !action.is_hide());

    if explicit_outputs {
        let names: Vec<String> = node.outputs().iter().map(|t| t.name().to_string()).collect();
        if !node.has_explicit_outputs() {
            node.restore_workflow_outputs(names.iter().cloned());
        }
        for name in names {
            if !node.is_workflow_output(&name) {
                node.add_post_job_action(PostJobAction::hide(name));
            }
        }
    }

    *node.post_job_actions() != before_actions || node.workflow_outputs() != before_outputs
}

impl Workflow {
    /// Bring every tool node's hide actions in line with its workflow outputs
    ///
    /// Returns the ids of the nodes that changed. Running it twice with no
    /// edit in between changes nothing the second time.
    pub fn rectify_outputs(&mut self) -> Vec<NodeId> {
        let (explicit, hidden) = scan_markers(self.nodes.values());
        if !explicit && !hidden {
            return Vec::new();
        }

        let mut changed = Vec::new();
        for node in self.nodes.values_mut().filter(|n| n.is_tool()) {
            if rectify_node(node, explicit) {
                changed.push(node.id());
            }
        }
        if !changed.is_empty() {
            log::debug!("Rectified outputs on {} node(s)", changed.len());
            self.has_changes = true;
        }

        if let Some(active) = self.active_node.filter(|id| changed.contains(id)) {
            if let Some(node) = self.nodes.get(&active) {
                self.show_form(FormView::for_node(node));
            }
        }
        changed
    }

    /// Upgrade a freshly loaded document to explicit-output semantics
    ///
    /// When any marker is present, every tool output that has no hide
    /// action of its own is marked as a workflow output.
    pub(crate) fn upgrade_legacy_outputs(&mut self) {
        let (explicit, hidden) = scan_markers(self.nodes.values());
        if !explicit && !hidden {
            return;
        }
        for node in self.nodes.values_mut().filter(|n| n.is_tool()) {
            let hidden_outputs: Vec<String> = node
                .post_job_actions()
                .values()
                .filter(|a| a.is_hide())
                .map(|a| a.output_name.clone())
                .collect();
            let mut marks = node.workflow_outputs().to_vec();
            for terminal in node.outputs() {
                let name = terminal.name();
                if !hidden_outputs.iter().any(|h| h == name) && !marks.iter().any(|m| m == name) {
                    marks.push(name.to_string());
                }
            }
            node.restore_workflow_outputs(marks);
        }
    }
}
