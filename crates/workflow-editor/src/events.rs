//! Change notifications for the view layer
//!
//! The graph model holds no rendering handles. Every mutation is
//! published as an [`EditorEvent`]; a renderer subscribes through an
//! [`EventSink`] and owns all visual geometry itself.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectorId, NodeId, Position, TerminalRef};

/// Trait for receiving editor events
///
/// This abstracts over the transport (channel, callback into a UI
/// toolkit, recorder in tests).
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: EditorEvent) -> Result<(), EventError>;
}

/// Error when delivering an event fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted by the workflow as the graph changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditorEvent {
    /// A node was registered
    #[serde(rename_all = "camelCase")]
    NodeAdded { node_id: NodeId },

    /// A node was deregistered
    #[serde(rename_all = "camelCase")]
    NodeRemoved { node_id: NodeId },

    /// A node moved on the canvas
    #[serde(rename_all = "camelCase")]
    NodeMoved { node_id: NodeId, position: Position },

    /// A node's state, errors or connections changed
    #[serde(rename_all = "camelCase")]
    NodeChanged { node_id: NodeId },

    /// A node's ports were rebuilt after a refresh
    #[serde(rename_all = "camelCase")]
    TerminalsReplaced { node_id: NodeId },

    /// A connector was created (possibly dangling during a drag)
    #[serde(rename_all = "camelCase")]
    ConnectorAdded {
        connector_id: ConnectorId,
        source: Option<TerminalRef>,
        target: Option<TerminalRef>,
    },

    /// A connector was destroyed
    #[serde(rename_all = "camelCase")]
    ConnectorRemoved { connector_id: ConnectorId },

    /// The focused node changed (None: nothing selected)
    #[serde(rename_all = "camelCase")]
    ActiveNodeChanged { node_id: Option<NodeId> },

    /// Automatic layout assigned new positions
    #[serde(rename_all = "camelCase")]
    LayoutApplied { levels: usize },

    /// A document was loaded into the workflow
    #[serde(rename_all = "camelCase")]
    WorkflowLoaded { node_count: usize },
}

/// A no-op event sink that discards all events
///
/// Useful for testing or when no view is attached.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: EditorEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<EditorEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<EditorEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: EditorEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError::channel_closed())?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(EditorEvent::NodeAdded { node_id: 3 }).unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            EditorEvent::NodeAdded { node_id } => assert_eq!(*node_id, 3),
            _ => panic!("Expected NodeAdded event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_event_sink() {
        let sink = NullEventSink;
        // Should not panic
        sink.send(EditorEvent::ActiveNodeChanged { node_id: None }).unwrap();
    }

    #[test]
    fn test_event_serialization() {
        let event = EditorEvent::NodeMoved {
            node_id: 1,
            position: Position::new(30.0, 80.0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "nodeMoved");
        assert_eq!(json["nodeId"], 1);
        assert_eq!(json["position"]["left"], 80.0);
    }
}
