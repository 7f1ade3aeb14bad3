//! Study material nodes
//!
//! Generation nodes for the study workflow plus the collaborators they
//! talk to: a completion provider and a persistence service.

mod gemini;
mod mindmap;
mod narration;
mod persistence;
mod provider;
mod quiz;
mod recommendation;
pub mod schema;
mod summary;
mod workflow;

pub use gemini::{GeminiProvider, DEFAULT_MODEL};
pub use mindmap::{MindmapNode, MINDMAP_KEY};
pub use narration::NarrationNode;
pub use persistence::{InMemoryPersistence, PersistenceError, PersistenceService, RestPersistence};
pub use provider::{
    CompletionProvider, OutputSchema, ProfileParams, PromptPart, PromptSpec, ProviderError,
};
pub use quiz::QuizNode;
pub use recommendation::RecommendationNode;
pub use summary::SummaryNode;
pub use workflow::{
    study_workflow, BRANCH_NODES, MINDMAP_NODE, NARRATION_NODE, QUIZ_NODE, RECOMMENDATIONS_NODE,
    SUMMARY_NODE, WORKFLOW_NAME,
};
