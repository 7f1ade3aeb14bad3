//! Core abstractions for the study-material workflow engine
//!
//! This crate provides the shared state record, the node trait, the graph
//! declaration and the error taxonomy. It has no scheduling logic.

pub mod content;
mod error;
pub mod events;
mod node;
mod state;
mod workflow;

pub use error::{
    GraphDefinitionError, NodeError, NodeExecutionError, NodeOutcome, RunError, RunReport,
    RunTimeoutError,
};
pub use events::*;
pub use node::{Node, NodeContext};
pub use state::{
    FieldValue, LearningState, SharedState, StateField, StateUpdate, StudentProfile,
    TaskDescription,
};
pub use workflow::{is_sentinel, Edge, NodeSpec, WorkflowGraph, ENTRY, EXIT};
