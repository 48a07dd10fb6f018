//! Seam to the external tool-form renderer
//!
//! The renderer shows the parameter form of the active node and reports
//! edits back through [`Workflow::update_node_data`]. Before focus moves
//! away from a node, the workflow asks the renderer to commit whatever is
//! still pending in the open form.
//!
//! [`Workflow::update_node_data`]: crate::workflow::Workflow::update_node_data

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::node::{Node, NodeData};
use crate::types::NodeId;

/// Payload pushed to the form renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormView {
    /// Node the form belongs to; None means nothing is selected
    pub node_id: Option<NodeId>,
    pub title: String,
    pub form_html: Option<String>,
    pub tooltip: Option<String>,
    pub tool_state: Option<serde_json::Value>,
    pub tool_errors: Option<serde_json::Value>,
    pub annotation: String,
    pub workflow_outputs: Vec<String>,
}

impl FormView {
    /// Neutral payload shown when no node is selected
    pub fn empty() -> Self {
        Self {
            title: "No node selected".to_string(),
            ..Default::default()
        }
    }

    pub fn for_node(node: &Node) -> Self {
        Self {
            node_id: Some(node.id()),
            title: node.name.clone(),
            form_html: node.form_html.clone(),
            tooltip: node.tooltip.clone(),
            tool_state: node.tool_state.clone(),
            tool_errors: node.tool_errors.clone(),
            annotation: node.annotation.clone(),
            workflow_outputs: node.workflow_outputs().to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node_id.is_none()
    }
}

/// External component that renders tool forms
pub trait FormRenderer: Send + Sync {
    /// Show the form for a node, or the neutral payload
    fn show_form(&self, view: FormView);

    /// Commit unsaved edits of the form open for `node`
    ///
    /// Returns the field data produced by submitting the form, if there
    /// was anything pending.
    fn flush_pending(&self, node: NodeId) -> Option<NodeData>;
}

/// Renderer that shows nothing and never has pending edits
pub struct NullFormRenderer;

impl FormRenderer for NullFormRenderer {
    fn show_form(&self, _view: FormView) {}

    fn flush_pending(&self, _node: NodeId) -> Option<NodeData> {
        None
    }
}

/// Renderer that records every shown form
///
/// Pending edits can be staged per node to exercise the
/// commit-before-switch path.
#[derive(Default)]
pub struct RecordingFormRenderer {
    shown: Mutex<Vec<FormView>>,
    pending: Mutex<HashMap<NodeId, NodeData>>,
}

impl RecordingFormRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage unsaved edits for a node's open form
    pub fn stage(&self, node: NodeId, data: NodeData) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(node, data);
        }
    }

    /// All forms shown so far
    pub fn shown(&self) -> Vec<FormView> {
        self.shown
            .lock()
            .map(|shown| shown.clone())
            .unwrap_or_default()
    }

    pub fn last_shown(&self) -> Option<FormView> {
        self.shown().pop()
    }
}

impl FormRenderer for RecordingFormRenderer {
    fn show_form(&self, view: FormView) {
        if let Ok(mut shown) = self.shown.lock() {
            shown.push(view);
        }
    }

    fn flush_pending(&self, node: NodeId) -> Option<NodeData> {
        self.pending.lock().ok()?.remove(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeKind;

    #[test]
    fn test_form_view_for_node() {
        let mut node = Node::new(NodeKind::tool("cat1"), "Concatenate");
        node.form_html = Some("<form/>".to_string());
        let view = FormView::for_node(&node);
        assert_eq!(view.node_id, Some(0));
        assert_eq!(view.title, "Concatenate");
        assert!(!view.is_empty());
        assert!(FormView::empty().is_empty());
    }

    #[test]
    fn test_recording_renderer_flushes_once() {
        let renderer = RecordingFormRenderer::new();
        renderer.stage(
            1,
            NodeData {
                tool_state: Some(serde_json::json!({"x": 1})),
                ..Default::default()
            },
        );
        assert!(renderer.flush_pending(1).is_some());
        assert!(renderer.flush_pending(1).is_none());
        assert!(renderer.flush_pending(2).is_none());
    }
}
