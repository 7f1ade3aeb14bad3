//! Completion provider interface consumed by the generation nodes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use studycore::{NodeError, StudentProfile};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The call succeeded but the body did not hold the requested structure.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl From<ProviderError> for NodeError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::MalformedResponse(msg) => NodeError::MalformedOutput(msg),
            other => NodeError::Provider(other.to_string()),
        }
    }
}

/// Profile parameters with blank values replaced by defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileParams {
    pub grade_level: String,
    pub language: String,
    pub presentation: String,
}

impl ProfileParams {
    pub fn from_profile(profile: &StudentProfile) -> Self {
        fn or_default(value: &str, default: &str) -> String {
            let value = value.trim();
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        }

        Self {
            grade_level: or_default(&profile.grade_level, "general"),
            language: or_default(&profile.language, "English"),
            presentation: profile.presentation.clone().unwrap_or_default(),
        }
    }

    /// Substitute `{grade_level}`, `{language}` and `{presentation}`.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{grade_level}", &self.grade_level)
            .replace("{language}", &self.language)
            .replace("{presentation}", &self.presentation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptPart {
    Text(String),
    /// Reference document the provider should read (pdf, image or audio).
    FileUrl(String),
}

/// Everything a provider needs to produce one structured result.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSpec {
    /// Role instructions, profile already substituted
    pub instructions: String,
    pub profile: ProfileParams,
    pub content: Vec<PromptPart>,
    pub temperature: Option<f32>,
}

impl PromptSpec {
    pub fn new(template: &str, profile: &StudentProfile) -> Self {
        let profile = ProfileParams::from_profile(profile);
        Self {
            instructions: profile.render(template),
            profile,
            content: Vec::new(),
            temperature: None,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.push(PromptPart::Text(text.into()));
        self
    }

    pub fn with_file(mut self, url: impl Into<String>) -> Self {
        self.content.push(PromptPart::FileUrl(url.into()));
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Shape the provider must return, as a JSON schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub schema: serde_json::Value,
}

/// Schema-constrained completion backend
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &PromptSpec,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value, ProviderError>;
}

/// Deserialize a provider result into the node's output type.
pub(crate) fn decode<T: DeserializeOwned>(
    schema: &OutputSchema,
    raw: serde_json::Value,
) -> Result<T, NodeError> {
    serde_json::from_value(raw)
        .map_err(|e| NodeError::MalformedOutput(format!("{}: {}", schema.name, e)))
}
