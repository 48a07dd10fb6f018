//! Workflow Editor - graph model for a visual pipeline editor
//!
//! Users place tool nodes on a canvas, wire typed outputs to typed
//! inputs, mark which outputs are user-visible, and save the result as a
//! flat document. This crate is the model behind such an editor:
//!
//! - Typed terminals with datatype-hierarchy compatibility checks
//! - Connectors kept in an arena owned by the [`Workflow`]
//! - Workflow-output marks kept in agreement with hide actions
//! - A flat document format that round-trips through load and save
//! - Layered topological layout
//!
//! # Architecture
//!
//! The model holds no rendering handles. A view layer subscribes through
//! an [`EventSink`], delivers pointer gestures, and renders tool forms
//! through a [`FormRenderer`]. Persistence is an outer adapter behind
//! [`WorkflowPersistence`].
//!
//! # Example
//!
//! ```ignore
//! use workflow_editor::{DatatypeRegistry, LayoutEngine, Workflow, WorkflowDocument};
//!
//! let datatypes = DatatypeRegistry::from_json(&datatypes_json)?;
//! let document = WorkflowDocument::from_json(&stored_json)?;
//! let mut workflow = Workflow::from_document(&document, datatypes)?;
//! workflow.layout_auto(&LayoutEngine::default())?;
//! let to_save = workflow.prepare_save();
//! ```

pub mod builder;
pub mod config;
pub mod connector;
pub mod datatypes;
pub mod document;
pub mod error;
pub mod events;
pub mod form;
pub mod gesture;
pub mod layout;
pub mod node;
pub mod outputs;
pub mod store;
pub mod terminal;
pub mod types;
pub mod validation;
pub mod workflow;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use config::{EditorConfig, LayoutConfig, NodeSizeConfig};
pub use connector::Connector;
pub use datatypes::{DatatypeRegistry, DatatypeTable};
pub use document::{ConnectionRecord, InputConnections, StepRecord, WorkflowDocument};
pub use error::{EditorError, Result};
pub use events::{EditorEvent, EventSink, NullEventSink, VecEventSink};
pub use form::{FormRenderer, FormView, NullFormRenderer, RecordingFormRenderer};
pub use gesture::{ConnectorDrag, NodeDrag};
pub use layout::{topological_levels, EstimatedNodeSize, Layout, LayoutEngine, NodeMeasure};
pub use node::{Node, NodeData};
pub use store::{DocumentMetadata, DocumentStore, WorkflowPersistence};
pub use terminal::Terminal;
pub use types::{
    ConnectorId, NodeId, NodeKind, PortDefinition, Position, PostJobAction, PostJobActionKey,
    Size, TerminalKind, TerminalRef,
};
pub use validation::{validate_workflow, ValidationError};
pub use workflow::Workflow;
