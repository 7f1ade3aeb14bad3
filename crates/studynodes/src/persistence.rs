//! Persistence service interface and implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use studycore::{LearningState, NodeError, StudentProfile, TaskDescription};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("store rejected update ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("could not encode record: {0}")]
    Encoding(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

impl From<PersistenceError> for NodeError {
    fn from(e: PersistenceError) -> Self {
        NodeError::Persistence(e.to_string())
    }
}

/// Durable store for generated results, keyed by learning space id
#[async_trait]
pub trait PersistenceService: Send + Sync {
    /// Merge `fields` into the stored record; other fields are left as is.
    async fn update_record(
        &self,
        record_id: i64,
        fields: Map<String, Value>,
    ) -> Result<(), PersistenceError>;
}

/// Persist a single field of a record.
pub(crate) async fn persist_field<T: Serialize>(
    service: &dyn PersistenceService,
    record_id: i64,
    key: &str,
    value: &T,
) -> Result<(), NodeError> {
    let encoded = serde_json::to_value(value)
        .map_err(|e| PersistenceError::Encoding(e.to_string()))?;
    let mut fields = Map::new();
    fields.insert(key.to_string(), encoded);

    service.update_record(record_id, fields).await?;
    tracing::debug!("Persisted {} for record {}", key, record_id);
    Ok(())
}

/// PostgREST-style store (e.g. Supabase) updated with `PATCH`.
pub struct RestPersistence {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestPersistence {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: "learning_space".to_string(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn record_url(&self, record_id: i64) -> String {
        format!("{}/rest/v1/{}?id=eq.{}", self.base_url, self.table, record_id)
    }

    fn profile_url(&self, user_id: &str) -> String {
        format!(
            "{}/rest/v1/student_profile?user_id=eq.{}&select=grade_level,language,gender",
            self.base_url, user_id
        )
    }

    /// Build the initial state of a run from the stored learning space and
    /// its owner's student profile.
    pub async fn load_state(&self, record_id: i64) -> Result<LearningState, PersistenceError> {
        let url = format!("{}&select=topic,pdf_source,user_id", self.record_url(record_id));
        let space = self
            .select::<LearningSpaceRow>(&url)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PersistenceError::NotFound(format!("{} {}", self.table, record_id)))?;

        let profile = match &space.user_id {
            Some(user_id) => self
                .select::<ProfileRow>(&self.profile_url(user_id))
                .await?
                .into_iter()
                .next(),
            None => None,
        };
        if profile.is_none() {
            tracing::warn!("No student profile for learning space {}, using defaults", record_id);
        }

        Ok(initial_state(record_id, space, profile))
    }

    async fn select<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Vec<T>, PersistenceError> {
        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| PersistenceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Rejected { status, message });
        }

        response
            .json()
            .await
            .map_err(|e| PersistenceError::Request(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct LearningSpaceRow {
    topic: Option<String>,
    pdf_source: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileRow {
    grade_level: Option<String>,
    language: Option<String>,
    gender: Option<String>,
}

/// Blank profile values are left blank; prompts substitute the defaults.
fn initial_state(record_id: i64, space: LearningSpaceRow, profile: Option<ProfileRow>) -> LearningState {
    let profile = profile.unwrap_or_default();
    LearningState::new(
        record_id,
        StudentProfile {
            language: profile.language.unwrap_or_default(),
            grade_level: profile.grade_level.unwrap_or_default(),
            presentation: profile.gender.filter(|g| !g.trim().is_empty()),
        },
        TaskDescription {
            topic: space.topic.unwrap_or_default(),
            file_url: space.pdf_source,
        },
    )
}

#[async_trait]
impl PersistenceService for RestPersistence {
    async fn update_record(
        &self,
        record_id: i64,
        fields: Map<String, Value>,
    ) -> Result<(), PersistenceError> {
        let response = self
            .client
            .patch(self.record_url(record_id))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=minimal")
            .json(&fields)
            .send()
            .await
            .map_err(|e| PersistenceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(PersistenceError::Rejected { status, message });
        }

        Ok(())
    }
}

/// Process-local store, used for dry runs and tests.
#[derive(Default)]
pub struct InMemoryPersistence {
    records: Mutex<HashMap<i64, Map<String, Value>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, record_id: i64) -> Option<Map<String, Value>> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(&record_id).cloned())
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn update_record(
        &self,
        record_id: i64,
        fields: Map<String, Value>,
    ) -> Result<(), PersistenceError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| PersistenceError::Request(e.to_string()))?;
        records.entry(record_id).or_default().extend(fields);
        Ok(())
    }
}
