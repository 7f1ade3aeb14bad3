use crate::content::{MindMap, Quiz, RecommendationList, SummaryNote};
use crate::NodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Learner parameters every prompt is personalised with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentProfile {
    /// e.g. "english", "hindi"
    pub language: String,
    /// e.g. "class 6", "undergrad"
    pub grade_level: String,
    /// Preferred pronouns / presentation
    #[serde(default)]
    pub presentation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescription {
    pub topic: String,
    #[serde(default)]
    pub file_url: Option<String>,
}

impl TaskDescription {
    /// Reference document locator, ignoring blank values.
    pub fn reference_document(&self) -> Option<&str> {
        self.file_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Result fields of [`LearningState`]. Each one is owned by exactly one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    SummaryNotes,
    Quiz,
    Recommendations,
    Mindmap,
    PodcastScript,
}

impl StateField {
    pub const ALL: [StateField; 5] = [
        StateField::SummaryNotes,
        StateField::Quiz,
        StateField::Recommendations,
        StateField::Mindmap,
        StateField::PodcastScript,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateField::SummaryNotes => "summary_notes",
            StateField::Quiz => "quiz",
            StateField::Recommendations => "recommendations",
            StateField::Mindmap => "mindmap",
            StateField::PodcastScript => "podcast_script",
        }
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value for one result field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    SummaryNotes(SummaryNote),
    Quiz(Quiz),
    Recommendations(RecommendationList),
    Mindmap(MindMap),
    PodcastScript(String),
}

impl FieldValue {
    pub fn field(&self) -> StateField {
        match self {
            FieldValue::SummaryNotes(_) => StateField::SummaryNotes,
            FieldValue::Quiz(_) => StateField::Quiz,
            FieldValue::Recommendations(_) => StateField::Recommendations,
            FieldValue::Mindmap(_) => StateField::Mindmap,
            FieldValue::PodcastScript(_) => StateField::PodcastScript,
        }
    }
}

/// Partial update returned by a node: only the fields it is responsible for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    values: Vec<FieldValue>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, value: FieldValue) -> Self {
        self.values.push(value);
        self
    }

    pub fn fields(&self) -> Vec<StateField> {
        self.values.iter().map(FieldValue::field).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }
}

impl From<FieldValue> for StateUpdate {
    fn from(value: FieldValue) -> Self {
        StateUpdate::new().with(value)
    }
}

/// Shared record for one workflow run.
///
/// Input fields are public and fixed before the run starts. Result fields
/// can only be written through [`LearningState::merge`], once each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearningState {
    pub learning_space_id: i64,
    pub profile: StudentProfile,
    pub task: TaskDescription,
    summary_notes: Option<SummaryNote>,
    quiz: Option<Quiz>,
    recommendations: Option<RecommendationList>,
    mindmap: Option<MindMap>,
    podcast_script: Option<String>,
}

impl LearningState {
    pub fn new(learning_space_id: i64, profile: StudentProfile, task: TaskDescription) -> Self {
        Self {
            learning_space_id,
            profile,
            task,
            summary_notes: None,
            quiz: None,
            recommendations: None,
            mindmap: None,
            podcast_script: None,
        }
    }

    pub fn summary_notes(&self) -> Option<&SummaryNote> {
        self.summary_notes.as_ref()
    }

    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    pub fn recommendations(&self) -> Option<&RecommendationList> {
        self.recommendations.as_ref()
    }

    pub fn mindmap(&self) -> Option<&MindMap> {
        self.mindmap.as_ref()
    }

    pub fn podcast_script(&self) -> Option<&str> {
        self.podcast_script.as_deref()
    }

    pub fn is_set(&self, field: StateField) -> bool {
        match field {
            StateField::SummaryNotes => self.summary_notes.is_some(),
            StateField::Quiz => self.quiz.is_some(),
            StateField::Recommendations => self.recommendations.is_some(),
            StateField::Mindmap => self.mindmap.is_some(),
            StateField::PodcastScript => self.podcast_script.is_some(),
        }
    }

    pub fn written_fields(&self) -> Vec<StateField> {
        StateField::ALL
            .into_iter()
            .filter(|field| self.is_set(*field))
            .collect()
    }

    /// Merge a partial update produced by a node owning `owned`.
    ///
    /// The whole update is validated before anything is written, so a
    /// rejected update leaves the state untouched.
    pub fn merge(
        &mut self,
        owned: &[StateField],
        update: StateUpdate,
    ) -> Result<Vec<StateField>, NodeError> {
        let fields = update.fields();
        for (i, field) in fields.iter().enumerate() {
            if !owned.contains(field) {
                return Err(NodeError::UndeclaredField(*field));
            }
            if self.is_set(*field) || fields[..i].contains(field) {
                return Err(NodeError::FieldAlreadyWritten(*field));
            }
        }

        for value in update.values {
            match value {
                FieldValue::SummaryNotes(v) => self.summary_notes = Some(v),
                FieldValue::Quiz(v) => self.quiz = Some(v),
                FieldValue::Recommendations(v) => self.recommendations = Some(v),
                FieldValue::Mindmap(v) => self.mindmap = Some(v),
                FieldValue::PodcastScript(v) => self.podcast_script = Some(v),
            }
        }

        Ok(fields)
    }
}

/// Synchronized container holding the state of one run.
///
/// Merges take the write lock so they are atomic with respect to each
/// other; nodes read an immutable snapshot taken at dispatch.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<RwLock<LearningState>>,
}

impl SharedState {
    pub fn new(state: LearningState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub async fn snapshot(&self) -> Arc<LearningState> {
        Arc::new(self.inner.read().await.clone())
    }

    pub async fn merge(
        &self,
        owned: &[StateField],
        update: StateUpdate,
    ) -> Result<Vec<StateField>, NodeError> {
        let merged = self.inner.write().await.merge(owned, update)?;
        tracing::debug!("Merged fields {:?}", merged);
        Ok(merged)
    }

    /// Current contents, cloned.
    pub async fn to_state(&self) -> LearningState {
        self.inner.read().await.clone()
    }
}
