use crate::persistence::{persist_field, PersistenceService};
use crate::provider::{decode, CompletionProvider, PromptSpec};
use crate::schema;
use crate::summary::summary_input;
use async_trait::async_trait;
use std::sync::Arc;
use studycore::content::MindMap;
use studycore::{FieldValue, Node, NodeContext, NodeError, StateField, StateUpdate};

const INSTRUCTIONS: &str = "You are a helpful academic tutor.
Use the context below to create a mind map that clearly explains the core concepts and key ideas.

Student Profile:
- Class Level: {grade_level}
- Language: {language}
- Pronouns: {presentation}

1. Adapt your language and complexity based on the student's profile provided.
2. Give every node a short id and a label, connect them with edges and name the central node.";

/// The `mindmap` column holds a rendered image url, so the structure
/// lives in its own column.
pub const MINDMAP_KEY: &str = "mindmap_structure";

/// Concept diagram of the summary, centred on the topic.
pub struct MindmapNode {
    provider: Arc<dyn CompletionProvider>,
    persistence: Arc<dyn PersistenceService>,
}

impl MindmapNode {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        persistence: Arc<dyn PersistenceService>,
    ) -> Self {
        Self {
            provider,
            persistence,
        }
    }
}

#[async_trait]
impl Node for MindmapNode {
    fn node_type(&self) -> &str {
        "generate.mindmap"
    }

    fn owned_fields(&self) -> &[StateField] {
        &[StateField::Mindmap]
    }

    async fn execute(&self, ctx: NodeContext) -> Result<StateUpdate, NodeError> {
        let prompt =
            PromptSpec::new(INSTRUCTIONS, &ctx.state.profile).with_text(summary_input(&ctx.state)?);

        let schema = schema::mindmap();
        let raw = self.provider.generate(&prompt, &schema).await?;
        let map: MindMap = decode(&schema, raw)?;
        validate(&map)?;
        ctx.events.info(format!(
            "Mind map with {} nodes and {} edges",
            map.nodes.len(),
            map.edges.len()
        ));

        persist_field(
            self.persistence.as_ref(),
            ctx.state.learning_space_id,
            MINDMAP_KEY,
            &map,
        )
        .await?;

        Ok(FieldValue::Mindmap(map).into())
    }
}

/// The central node and every edge endpoint must be declared nodes.
fn validate(map: &MindMap) -> Result<(), NodeError> {
    if map.find_node(&map.central_node).is_none() {
        return Err(NodeError::MalformedOutput(format!(
            "mindmap: central node '{}' is not declared",
            map.central_node
        )));
    }
    for edge in &map.edges {
        for end in [&edge.source, &edge.target] {
            if map.find_node(end).is_none() {
                return Err(NodeError::MalformedOutput(format!(
                    "mindmap: edge {} -> {} references unknown node '{}'",
                    edge.source, edge.target, end
                )));
            }
        }
    }
    Ok(())
}
