use crate::persistence::PersistenceService;
use crate::provider::CompletionProvider;
use crate::{MindmapNode, NarrationNode, QuizNode, RecommendationNode, SummaryNode};
use std::sync::Arc;
use studycore::{WorkflowGraph, ENTRY, EXIT};

pub const WORKFLOW_NAME: &str = "study_material";

pub const SUMMARY_NODE: &str = "node_summary_notes";
pub const QUIZ_NODE: &str = "node_quiz";
pub const RECOMMENDATIONS_NODE: &str = "node_recommendations";
pub const MINDMAP_NODE: &str = "node_mindmap";
pub const NARRATION_NODE: &str = "node_audio_overview";

/// Nodes that build on the summary and run side by side.
pub const BRANCH_NODES: [&str; 4] = [QUIZ_NODE, RECOMMENDATIONS_NODE, MINDMAP_NODE, NARRATION_NODE];

/// Summary first, then quiz, recommendations, mind map and narration in parallel.
pub fn study_workflow(
    provider: Arc<dyn CompletionProvider>,
    persistence: Arc<dyn PersistenceService>,
) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new(WORKFLOW_NAME);
    graph
        .add_node(
            SUMMARY_NODE,
            Arc::new(SummaryNode::new(provider.clone(), persistence.clone())),
        )
        .add_node(
            QUIZ_NODE,
            Arc::new(QuizNode::new(provider.clone(), persistence.clone())),
        )
        .add_node(
            RECOMMENDATIONS_NODE,
            Arc::new(RecommendationNode::new(provider.clone(), persistence.clone())),
        )
        .add_node(
            MINDMAP_NODE,
            Arc::new(MindmapNode::new(provider.clone(), persistence.clone())),
        )
        .add_node(
            NARRATION_NODE,
            Arc::new(NarrationNode::new(provider, persistence)),
        )
        .add_edge(ENTRY, SUMMARY_NODE);

    for branch in BRANCH_NODES {
        graph.add_edge(SUMMARY_NODE, branch).add_edge(branch, EXIT);
    }
    graph
}
