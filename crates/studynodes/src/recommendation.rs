use crate::persistence::{persist_field, PersistenceService};
use crate::provider::{decode, CompletionProvider, PromptSpec};
use crate::schema::{self, MAX_RECOMMENDATIONS};
use crate::summary::summary_input;
use async_trait::async_trait;
use std::sync::Arc;
use studycore::content::RecommendationList;
use studycore::{FieldValue, Node, NodeContext, NodeError, StateField, StateUpdate};

const INSTRUCTIONS: &str = "You are a helpful academic tutor. Use these instructions to create a recommendation list based on the notes provided by the user:

Student Profile:
- Class Level: {grade_level}
- Language: {language}
- Pronouns: {presentation}

1. The recommendations should include all the resources needed to learn the topic.
2. Create up to 10 quality recommendations mixing books, online lectures, articles etc.
3. Adapt your language and complexity to the student's profile, add a contextual description and a url when one is available.";

/// Ranked list of further study resources.
pub struct RecommendationNode {
    provider: Arc<dyn CompletionProvider>,
    persistence: Arc<dyn PersistenceService>,
}

impl RecommendationNode {
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
impl Node for RecommendationNode {
    fn node_type(&self) -> &str {
        "generate.recommendations"
    }

    fn owned_fields(&self) -> &[StateField] {
        &[StateField::Recommendations]
    }

    async fn execute(&self, ctx: NodeContext) -> Result<StateUpdate, NodeError> {
        let prompt =
            PromptSpec::new(INSTRUCTIONS, &ctx.state.profile).with_text(summary_input(&ctx.state)?);

        let schema = schema::recommendations();
        let raw = self.provider.generate(&prompt, &schema).await?;
        let mut list: RecommendationList = decode(&schema, raw)?;

        if list.recommendations.len() > MAX_RECOMMENDATIONS {
            ctx.events.warn(format!(
                "Keeping the first {} of {} recommendations",
                MAX_RECOMMENDATIONS,
                list.recommendations.len()
            ));
            list.recommendations.truncate(MAX_RECOMMENDATIONS);
        }
        for item in &mut list.recommendations {
            item.url = clean_url(item.url.take());
        }

        persist_field(
            self.persistence.as_ref(),
            ctx.state.learning_space_id,
            "recommendations",
            &list,
        )
        .await?;

        Ok(FieldValue::Recommendations(list).into())
    }
}

/// Models write placeholders like "NULL" when no source exists.
fn clean_url(url: Option<String>) -> Option<String> {
    let url = url?.trim().to_string();
    match url.to_ascii_lowercase().as_str() {
        "" | "null" | "none" | "n/a" => None,
        _ => Some(url),
    }
}
