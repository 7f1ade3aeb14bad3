//! Workflow execution runtime
//!
//! This crate compiles declared workflow graphs into execution plans and
//! runs them, dispatching independent nodes concurrently.

mod executor;
mod planner;
mod runtime;

pub use executor::WorkflowExecutor;
pub use planner::{ExecutionPlan, PlannedNode};
pub use runtime::{RuntimeConfig, WorkflowRuntime};
