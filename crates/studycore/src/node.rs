use crate::{events::EventEmitter, ExecutionId, LearningState, NodeError, StateField, StateUpdate};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Core trait that all executable nodes implement
#[async_trait]
pub trait Node: Send + Sync {
    /// Type identifier used in logs and listings (e.g. "generate.quiz")
    fn node_type(&self) -> &str;

    /// Result fields this node writes. No two nodes of a graph may share one.
    fn owned_fields(&self) -> &[StateField];

    /// Read the state snapshot and produce a partial update.
    async fn execute(&self, ctx: NodeContext) -> Result<StateUpdate, NodeError>;
}

/// Execution context passed to each node
#[derive(Clone)]
pub struct NodeContext {
    pub execution_id: ExecutionId,

    /// Name the node was declared under in the graph
    pub node_name: String,

    /// State as of dispatch; every predecessor's update is already merged
    pub state: Arc<LearningState>,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Cancelled when the run deadline expires. Observing it is optional.
    pub cancellation: CancellationToken,
}

impl NodeContext {
    pub fn new(
        execution_id: ExecutionId,
        node_name: impl Into<String>,
        state: Arc<LearningState>,
        events: EventEmitter,
    ) -> Self {
        Self {
            execution_id,
            node_name: node_name.into(),
            state,
            events,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}
