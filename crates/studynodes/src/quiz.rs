use crate::persistence::{persist_field, PersistenceService};
use crate::provider::{decode, CompletionProvider, PromptSpec};
use crate::schema::{self, QUIZ_QUESTION_COUNT};
use crate::summary::summary_input;
use async_trait::async_trait;
use std::sync::Arc;
use studycore::content::Quiz;
use studycore::{FieldValue, Node, NodeContext, NodeError, StateField, StateUpdate};

const INSTRUCTIONS: &str = "You are a helpful academic tutor. Use these instructions to create a quiz on the notes provided by the user:

Student Profile:
- Class Level: {grade_level}
- Language: {language}
- Pronouns: {presentation}

1. Questions should be in MCQ format with 4 options each.
2. Create 10 quality questions which test fundamentals and analytical thinking of the user.
3. Adapt your language and complexity based on the student's profile provided.
4. Include the correct answer, a hint and an explanation with each question.";

/// Ten-question multiple-choice quiz built from the summary notes.
pub struct QuizNode {
    provider: Arc<dyn CompletionProvider>,
    persistence: Arc<dyn PersistenceService>,
}

impl QuizNode {
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
impl Node for QuizNode {
    fn node_type(&self) -> &str {
        "generate.quiz"
    }

    fn owned_fields(&self) -> &[StateField] {
        &[StateField::Quiz]
    }

    async fn execute(&self, ctx: NodeContext) -> Result<StateUpdate, NodeError> {
        let prompt =
            PromptSpec::new(INSTRUCTIONS, &ctx.state.profile).with_text(summary_input(&ctx.state)?);

        let schema = schema::quiz();
        let raw = self.provider.generate(&prompt, &schema).await?;
        let quiz = normalize(decode(&schema, raw)?)?;
        ctx.events.info(format!("Quiz ready: {}", quiz.title));

        persist_field(
            self.persistence.as_ref(),
            ctx.state.learning_space_id,
            "quiz",
            &quiz,
        )
        .await?;

        Ok(FieldValue::Quiz(quiz).into())
    }
}

/// Enforce the question count and canonicalise answer letters.
fn normalize(mut quiz: Quiz) -> Result<Quiz, NodeError> {
    if quiz.questions.len() != QUIZ_QUESTION_COUNT {
        return Err(NodeError::MalformedOutput(format!(
            "quiz: expected {} questions, got {}",
            QUIZ_QUESTION_COUNT,
            quiz.questions.len()
        )));
    }

    for (i, question) in quiz.questions.iter_mut().enumerate() {
        let answer = question.correct_answer.trim().to_ascii_uppercase();
        if !matches!(answer.as_str(), "A" | "B" | "C" | "D") {
            return Err(NodeError::MalformedOutput(format!(
                "quiz: question {} has answer '{}'",
                i + 1,
                question.correct_answer
            )));
        }
        question.correct_answer = answer;
    }

    Ok(quiz)
}
