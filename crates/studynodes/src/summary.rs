use crate::persistence::{persist_field, PersistenceService};
use crate::provider::{decode, CompletionProvider, PromptSpec};
use crate::schema;
use async_trait::async_trait;
use std::sync::Arc;
use studycore::content::SummaryNote;
use studycore::{FieldValue, LearningState, Node, NodeContext, NodeError, StateField, StateUpdate};

const INSTRUCTIONS: &str = "You are an expert academic tutor. Create personalized educational content following these guidelines:

Student Profile:
- Class Level: {grade_level}
- Language: {language}
- Pronouns: {presentation}

Content Requirements:
1. Use the audio/image/pdf if provided by the user to generate concise summary notes
2. Use bullet points and simple language appropriate for {grade_level}
3. Include practical examples and analogies
4. Make it engaging and easy to understand
5. Provide content in {language} only";

/// Summary notes for the topic, optionally grounded on a reference document.
pub struct SummaryNode {
    provider: Arc<dyn CompletionProvider>,
    persistence: Arc<dyn PersistenceService>,
}

impl SummaryNode {
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
impl Node for SummaryNode {
    fn node_type(&self) -> &str {
        "generate.summary_notes"
    }

    fn owned_fields(&self) -> &[StateField] {
        &[StateField::SummaryNotes]
    }

    async fn execute(&self, ctx: NodeContext) -> Result<StateUpdate, NodeError> {
        let state = &ctx.state;
        let topic = state.task.topic.trim();
        if topic.is_empty() {
            return Err(NodeError::MissingInput("task.topic".into()));
        }

        let mut prompt =
            PromptSpec::new(INSTRUCTIONS, &state.profile).with_text(format!("Topic: {}", topic));
        if let Some(url) = state.task.reference_document() {
            ctx.events.info(format!("Reading reference document {}", url));
            prompt = prompt.with_file(url);
        }

        let schema = schema::summary();
        let raw = self.provider.generate(&prompt, &schema).await?;
        let note: SummaryNote = decode(&schema, raw)?;
        if note.summary.trim().is_empty() {
            return Err(NodeError::MalformedOutput("summary_notes: empty summary".into()));
        }
        ctx.events.info(format!("Summary drafted: {}", note.title));

        persist_field(
            self.persistence.as_ref(),
            state.learning_space_id,
            "summary_notes",
            &note,
        )
        .await?;

        Ok(FieldValue::SummaryNotes(note).into())
    }
}

/// Summary text that downstream nodes build on.
pub(crate) fn summary_input(state: &LearningState) -> Result<String, NodeError> {
    let note = state
        .summary_notes()
        .ok_or_else(|| NodeError::MissingInput("summary_notes".into()))?;
    Ok(format!("Topic Summary: {}\n\n{}", note.title, note.summary))
}
