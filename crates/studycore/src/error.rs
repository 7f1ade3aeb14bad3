use crate::{ExecutionId, LearningState, StateField};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Malformed workflow graph, detected before any node runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphDefinitionError {
    #[error("Node declared twice: {0}")]
    DuplicateNode(String),

    #[error("Node name '{0}' is reserved for a sentinel")]
    ReservedName(String),

    #[error("Edge {from} -> {to} references undeclared node '{missing}'")]
    UnknownNode {
        from: String,
        to: String,
        missing: String,
    },

    #[error("Invalid sentinel edge {from} -> {to}")]
    SentinelMisuse { from: String, to: String },

    #[error("Cyclic dependency detected at node '{node}'")]
    Cycle { node: String },

    #[error("Node '{0}' is unreachable from entry")]
    Unreachable(String),

    #[error("Exit is unreachable from node '{0}'")]
    DeadEnd(String),

    #[error("Field '{field}' is owned by both '{first}' and '{second}'")]
    FieldOwnedTwice {
        field: StateField,
        first: String,
        second: String,
    },
}

/// Failure raised by a node's unit of work.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Completion provider error: {0}")]
    Provider(String),

    #[error("Malformed structured output: {0}")]
    MalformedOutput(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Update writes field '{0}' which the node does not own")]
    UndeclaredField(StateField),

    #[error("Field '{0}' was already written in this run")]
    FieldAlreadyWritten(StateField),

    #[error("Node task panicked: {0}")]
    Panicked(String),
}

/// A node failure tagged with the node that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Node '{node}' failed: {cause}")]
pub struct NodeExecutionError {
    pub node: String,
    #[source]
    pub cause: NodeError,
}

impl NodeExecutionError {
    pub fn new(node: impl Into<String>, cause: NodeError) -> Self {
        Self {
            node: node.into(),
            cause,
        }
    }
}

/// The run deadline expired before every node finished.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Run exceeded its {}ms deadline (completed: [{}], in flight: [{}])",
    .deadline.as_millis(), .completed.join(", "), .in_flight.join(", "))]
pub struct RunTimeoutError {
    pub deadline: Duration,
    pub completed: Vec<String>,
    pub in_flight: Vec<String>,
}

/// Terminal outcome of a single node within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NodeOutcome {
    Completed { duration_ms: u64 },
    Failed { error: String },
    InFlight,
    /// Never dispatched: a predecessor failed or the deadline expired first.
    Skipped,
}

impl NodeOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, NodeOutcome::Completed { .. })
    }
}

/// What a failed run leaves behind: every successfully merged field plus
/// the outcome of each node.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub execution_id: ExecutionId,
    pub state: LearningState,
    pub outcomes: BTreeMap<String, NodeOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_completed())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Error surfaced to the caller of a workflow run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Graph definition error: {0}")]
    Definition(#[from] GraphDefinitionError),

    #[error("{} node(s) failed: {}", .failures.len(), failed_names(.failures))]
    NodesFailed {
        failures: Vec<NodeExecutionError>,
        report: Box<RunReport>,
    },

    #[error("{error}{}", failed_suffix(.failures))]
    TimedOut {
        error: RunTimeoutError,
        /// Nodes that had already failed when the deadline passed
        failures: Vec<NodeExecutionError>,
        report: Box<RunReport>,
    },
}

impl RunError {
    /// Partial results of the run; `None` when the graph never compiled.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunError::Definition(_) => None,
            RunError::NodesFailed { report, .. } | RunError::TimedOut { report, .. } => {
                Some(report)
            }
        }
    }

    pub fn into_report(self) -> Option<RunReport> {
        match self {
            RunError::Definition(_) => None,
            RunError::NodesFailed { report, .. } | RunError::TimedOut { report, .. } => {
                Some(*report)
            }
        }
    }

    pub fn failures(&self) -> &[NodeExecutionError] {
        match self {
            RunError::NodesFailed { failures, .. } | RunError::TimedOut { failures, .. } => {
                failures
            }
            RunError::Definition(_) => &[],
        }
    }
}

fn failed_names(failures: &[NodeExecutionError]) -> String {
    failures
        .iter()
        .map(|f| f.node.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn failed_suffix(failures: &[NodeExecutionError]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!("; failed before the deadline: {}", failed_names(failures))
    }
}
