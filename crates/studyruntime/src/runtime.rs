use crate::{ExecutionPlan, WorkflowExecutor};
use std::sync::Arc;
use std::time::Duration;
use studycore::{
    EventBus, ExecutionEvent, GraphDefinitionError, LearningState, RunError, WorkflowGraph,
};

/// Main entry point for running workflows
pub struct WorkflowRuntime {
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
}

impl WorkflowRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let executor = WorkflowExecutor::new(config.max_parallel_nodes)
            .with_deadline(config.run_deadline);

        Self {
            executor: Arc::new(executor),
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
        }
    }

    /// Validate a graph without running it
    pub fn compile(&self, graph: &WorkflowGraph) -> Result<ExecutionPlan, GraphDefinitionError> {
        ExecutionPlan::compile(graph)
    }

    /// Compile `graph` and run it against `initial_state`.
    ///
    /// Returns once the run is terminal. A graph that fails to compile is
    /// rejected before any node is invoked.
    pub async fn execute(
        &self,
        graph: &WorkflowGraph,
        initial_state: LearningState,
    ) -> Result<LearningState, RunError> {
        let plan = self.compile(graph)?;
        self.execute_plan(&plan, initial_state).await
    }

    /// Run an already compiled plan; plans may be reused across runs.
    pub async fn execute_plan(
        &self,
        plan: &ExecutionPlan,
        initial_state: LearningState,
    ) -> Result<LearningState, RunError> {
        self.executor
            .execute(plan, &self.event_bus, initial_state)
            .await
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }
}

impl Default for WorkflowRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_parallel_nodes: usize,
    pub event_buffer_size: usize,
    /// Per-run deadline; `None` lets runs take as long as their nodes do
    pub run_deadline: Option<Duration>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            event_buffer_size: 1000,
            run_deadline: None,
        }
    }
}
