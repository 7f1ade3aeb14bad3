use crate::persistence::{persist_field, PersistenceService};
use crate::provider::{decode, CompletionProvider, PromptSpec};
use crate::schema::{self, NARRATION_CHAR_BUDGET};
use crate::summary::summary_input;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use studycore::{FieldValue, Node, NodeContext, NodeError, StateField, StateUpdate};

const INSTRUCTIONS: &str = "You are the host of an educational audio overview.
Write a single-narrator script that walks the listener through the notes provided by the user.

Student Profile:
- Class Level: {grade_level}
- Language: {language}
- Pronouns: {presentation}

1. Speak directly to the student in a warm, conversational tone.
2. Cover every key idea of the notes in a logical order and close with a short recap.
3. Write plain prose only: no headings, no lists, no stage directions.
4. Keep the script under 3000 characters.";

const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Deserialize)]
struct Episode {
    topic: String,
    script: String,
}

/// Spoken-style audio overview of the summary.
pub struct NarrationNode {
    provider: Arc<dyn CompletionProvider>,
    persistence: Arc<dyn PersistenceService>,
}

impl NarrationNode {
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
impl Node for NarrationNode {
    fn node_type(&self) -> &str {
        "generate.narration"
    }

    fn owned_fields(&self) -> &[StateField] {
        &[StateField::PodcastScript]
    }

    async fn execute(&self, ctx: NodeContext) -> Result<StateUpdate, NodeError> {
        let prompt = PromptSpec::new(INSTRUCTIONS, &ctx.state.profile)
            .with_text(summary_input(&ctx.state)?)
            .with_temperature(TEMPERATURE);

        let schema = schema::narration();
        let raw = self.provider.generate(&prompt, &schema).await?;
        let episode: Episode = decode(&schema, raw)?;

        let cleaned = clean_script(&episode.script);
        if cleaned.is_empty() {
            return Err(NodeError::MalformedOutput("podcast_script: empty script".into()));
        }
        let script = fit_budget(&cleaned, NARRATION_CHAR_BUDGET);
        ctx.events.info(format!("Narration ready: {}", episode.topic));
        if script.len() < cleaned.len() {
            ctx.events.warn(format!(
                "Script trimmed from {} to {} characters",
                cleaned.chars().count(),
                script.chars().count()
            ));
        }

        persist_field(
            self.persistence.as_ref(),
            ctx.state.learning_space_id,
            "audio_script",
            &script,
        )
        .await?;

        Ok(FieldValue::PodcastScript(script).into())
    }
}

/// Drop line breaks and stray backslashes so the text reads as one passage.
fn clean_script(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\n' | '\r' => out.push(' '),
            '\\' => {}
            c => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut to at most `budget` characters, preferring the last sentence end.
fn fit_budget(script: &str, budget: usize) -> String {
    let end = match script.char_indices().nth(budget) {
        Some((byte, _)) => byte,
        None => return script.to_string(),
    };
    let head = &script[..end];
    match head.rfind(['.', '!', '?']) {
        Some(pos) if pos > 0 => head[..=pos].to_string(),
        _ => head.trim_end().to_string(),
    }
}
