use crate::planner::ExecutionPlan;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use studycore::{
    EventBus, ExecutionEvent, ExecutionId, LearningState, NodeContext, NodeError,
    NodeExecutionError, NodeOutcome, RunError, RunReport, RunStatus, RunTimeoutError,
    SharedState,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Executes compiled plans, running independent ready nodes concurrently
pub struct WorkflowExecutor {
    max_parallel: usize,
    deadline: Option<Duration>,
}

impl WorkflowExecutor {
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            deadline: None,
        }
    }

    /// Stop dispatching and fail the run once `deadline` has elapsed.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run `plan` against `initial_state` until every node has completed or
    /// the run has failed.
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        event_bus: &EventBus,
        initial_state: LearningState,
    ) -> Result<LearningState, RunError> {
        let execution_id = ExecutionId::new_v4();
        let start_time = Instant::now();

        tracing::info!(
            "Starting run {} of '{}' for learning space {}",
            execution_id,
            plan.name(),
            initial_state.learning_space_id
        );

        event_bus.emit(ExecutionEvent::RunStarted {
            execution_id,
            workflow: plan.name().to_string(),
            learning_space_id: initial_state.learning_space_id,
            timestamp: Utc::now(),
        });

        let result = self
            .execute_dag(plan, event_bus, execution_id, initial_state)
            .await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let status = if result.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        tracing::info!("Run {} finished {:?} in {}ms", execution_id, status, duration_ms);

        event_bus.emit(ExecutionEvent::RunCompleted {
            execution_id,
            status,
            duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    async fn execute_dag(
        &self,
        plan: &ExecutionPlan,
        event_bus: &EventBus,
        execution_id: ExecutionId,
        initial_state: LearningState,
    ) -> Result<LearningState, RunError> {
        let state = SharedState::new(initial_state);
        let cancellation = CancellationToken::new();
        let deadline_at = self.deadline.map(|d| Instant::now() + d);

        let nodes = plan.nodes();
        let mut remaining: Vec<usize> = nodes.iter().map(|n| n.predecessors.len()).collect();
        let mut ready: VecDeque<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(idx, _)| idx)
            .collect();
        let mut outcomes: BTreeMap<String, NodeOutcome> = nodes
            .iter()
            .map(|n| (n.name.clone(), NodeOutcome::Skipped))
            .collect();
        let mut failures = Vec::new();
        let mut running = FuturesUnordered::new();
        let mut status = RunStatus::Pending;

        loop {
            if deadline_at.is_some_and(|at| Instant::now() >= at) {
                cancellation.cancel();
                return Err(self
                    .timed_out(plan, &state, execution_id, outcomes, failures)
                    .await);
            }

            // Dispatch ready nodes up to the parallel limit
            while running.len() < self.max_parallel {
                let Some(idx) = ready.pop_front() else {
                    break;
                };
                let planned = &nodes[idx];

                let ctx = NodeContext::new(
                    execution_id,
                    planned.name.clone(),
                    state.snapshot().await,
                    event_bus.create_emitter(execution_id, &planned.name),
                )
                .with_cancellation(cancellation.child_token());

                event_bus.emit(ExecutionEvent::NodeStarted {
                    execution_id,
                    node: planned.name.clone(),
                    node_type: planned.node.node_type().to_string(),
                    timestamp: Utc::now(),
                });
                tracing::debug!("Dispatching node {}", planned.name);

                if status == RunStatus::Pending {
                    status = RunStatus::Running;
                    tracing::debug!("Run {} is {:?}", execution_id, status);
                }
                outcomes.insert(planned.name.clone(), NodeOutcome::InFlight);

                let node = planned.node.clone();
                let handle = tokio::spawn(async move {
                    let start = Instant::now();
                    let result = node.execute(ctx).await;
                    (result, start.elapsed().as_millis() as u64)
                });
                running.push(async move { (idx, handle.await) });
            }

            // Nothing running and nothing ready: every reachable node is done
            if running.is_empty() {
                break;
            }

            let finished = match deadline_at {
                Some(at) => {
                    tokio::select! {
                        finished = running.next() => finished,
                        _ = tokio::time::sleep_until(at) => continue,
                    }
                }
                None => running.next().await,
            };
            let Some((idx, joined)) = finished else {
                break;
            };
            let planned = &nodes[idx];

            let result = match joined {
                Ok((Ok(update), duration_ms)) => state
                    .merge(planned.node.owned_fields(), update)
                    .await
                    .map(|fields| (fields, duration_ms)),
                Ok((Err(e), _)) => Err(e),
                Err(e) if e.is_panic() => Err(NodeError::Panicked(e.to_string())),
                Err(e) => Err(NodeError::ExecutionFailed(e.to_string())),
            };

            match result {
                Ok((fields, duration_ms)) => {
                    tracing::info!("Node {} completed in {}ms", planned.name, duration_ms);

                    event_bus.emit(ExecutionEvent::NodeCompleted {
                        execution_id,
                        node: planned.name.clone(),
                        fields,
                        duration_ms,
                        timestamp: Utc::now(),
                    });
                    outcomes.insert(planned.name.clone(), NodeOutcome::Completed { duration_ms });

                    for successor in &planned.successors {
                        if let Some(s) = plan.position(successor) {
                            remaining[s] -= 1;
                            if remaining[s] == 0 {
                                ready.push_back(s);
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Node {} failed: {}", planned.name, e);

                    event_bus.emit(ExecutionEvent::NodeFailed {
                        execution_id,
                        node: planned.name.clone(),
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    outcomes.insert(
                        planned.name.clone(),
                        NodeOutcome::Failed {
                            error: e.to_string(),
                        },
                    );

                    // Independent siblings keep running; successors stay blocked
                    failures.push(NodeExecutionError::new(planned.name.clone(), e));
                }
            }
        }

        if failures.is_empty() {
            return Ok(state.to_state().await);
        }

        for (name, outcome) in &outcomes {
            if *outcome == NodeOutcome::Skipped {
                tracing::warn!("Node {} was not attempted", name);
            }
        }

        Err(RunError::NodesFailed {
            failures,
            report: Box::new(RunReport {
                execution_id,
                state: state.to_state().await,
                outcomes,
            }),
        })
    }

    async fn timed_out(
        &self,
        plan: &ExecutionPlan,
        state: &SharedState,
        execution_id: ExecutionId,
        outcomes: BTreeMap<String, NodeOutcome>,
        failures: Vec<NodeExecutionError>,
    ) -> RunError {
        let with_outcome = |wanted: fn(&NodeOutcome) -> bool| -> Vec<String> {
            plan.order()
                .filter(|name| outcomes.get(*name).is_some_and(wanted))
                .map(String::from)
                .collect()
        };
        let error = RunTimeoutError {
            deadline: self.deadline.unwrap_or_default(),
            completed: with_outcome(NodeOutcome::is_completed),
            in_flight: with_outcome(|o| *o == NodeOutcome::InFlight),
        };

        tracing::warn!("Run {}: {}", execution_id, error);

        RunError::TimedOut {
            error,
            failures,
            report: Box::new(RunReport {
                execution_id,
                state: state.to_state().await,
                outcomes,
            }),
        }
    }
}
