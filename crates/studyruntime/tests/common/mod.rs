#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use studycore::content::{
    MindMap, MindMapNode, Quiz, RecommendationList, SummaryNote,
};
use studycore::{
    FieldValue, LearningState, Node, NodeContext, NodeError, StateField, StateUpdate,
    StudentProfile, TaskDescription,
};
use tokio::sync::Barrier;

/// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn initial_state() -> LearningState {
    LearningState::new(
        42,
        StudentProfile {
            language: "english".into(),
            grade_level: "class 8".into(),
            presentation: Some("she/her".into()),
        },
        TaskDescription {
            topic: "The water cycle".into(),
            file_url: None,
        },
    )
}

pub fn value_for(field: StateField) -> FieldValue {
    match field {
        StateField::SummaryNotes => FieldValue::SummaryNotes(SummaryNote {
            title: "The water cycle".into(),
            summary: "- evaporation\n- condensation".into(),
        }),
        StateField::Quiz => FieldValue::Quiz(Quiz {
            title: "Water cycle quiz".into(),
            questions: Vec::new(),
        }),
        StateField::Recommendations => FieldValue::Recommendations(RecommendationList {
            recommendations: Vec::new(),
        }),
        StateField::Mindmap => FieldValue::Mindmap(MindMap {
            nodes: vec![MindMapNode {
                id: "root".into(),
                label: "Water cycle".into(),
                fillcolor: None,
            }],
            edges: Vec::new(),
            central_node: "root".into(),
        }),
        StateField::PodcastScript => FieldValue::PodcastScript("Welcome back!".into()),
    }
}

/// What a node saw when it started.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Started { node: String, visible: Vec<StateField> },
    Finished { node: String },
}

#[derive(Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<Entry>>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Journal {
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn started(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Started { node, .. } => Some(node),
                _ => None,
            })
            .collect()
    }

    pub fn finished(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Finished { node } => Some(node),
                _ => None,
            })
            .collect()
    }

    pub fn visible_to(&self, node: &str) -> Option<Vec<StateField>> {
        self.entries().into_iter().find_map(|e| match e {
            Entry::Started { node: n, visible } if n == node => Some(visible),
            _ => None,
        })
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn push(&self, entry: Entry) {
        self.entries.lock().unwrap().push(entry);
    }
}

/// Configurable stand-in node that records every invocation.
pub struct ScriptedNode {
    fields: Vec<StateField>,
    writes: Vec<StateField>,
    delay: Duration,
    failure: Option<NodeError>,
    panics: bool,
    barrier: Option<Arc<Barrier>>,
    journal: Journal,
}

impl ScriptedNode {
    /// Owns and writes `fields`.
    pub fn new(journal: &Journal, fields: &[StateField]) -> Self {
        Self {
            fields: fields.to_vec(),
            writes: fields.to_vec(),
            delay: Duration::ZERO,
            failure: None,
            panics: false,
            barrier: None,
            journal: journal.clone(),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, error: NodeError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Write fields other than the declared ones.
    pub fn writing(mut self, fields: &[StateField]) -> Self {
        self.writes = fields.to_vec();
        self
    }

    /// Wait for every holder of `barrier` before finishing.
    pub fn meeting(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn arc(self) -> Arc<dyn Node> {
        Arc::new(self)
    }
}

#[async_trait]
impl Node for ScriptedNode {
    fn node_type(&self) -> &str {
        "test.scripted"
    }

    fn owned_fields(&self) -> &[StateField] {
        &self.fields
    }

    async fn execute(&self, ctx: NodeContext) -> Result<StateUpdate, NodeError> {
        self.journal.push(Entry::Started {
            node: ctx.node_name.clone(),
            visible: ctx.state.written_fields(),
        });
        let now = self.journal.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.journal.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.journal.push(Entry::Finished {
            node: ctx.node_name.clone(),
        });

        if self.panics {
            panic!("scripted panic in {}", ctx.node_name);
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        Ok(self
            .writes
            .iter()
            .fold(StateUpdate::new(), |update, field| update.with(value_for(*field))))
    }
}
