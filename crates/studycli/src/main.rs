use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use studycore::{
    ExecutionEvent, LearningState, Node, NodeEvent, NodeOutcome, RunStatus, StudentProfile,
    TaskDescription, WorkflowGraph,
};
use studynodes::{
    study_workflow, GeminiProvider, InMemoryPersistence, PersistenceService, RestPersistence,
    DEFAULT_MODEL,
};
use studyruntime::{ExecutionPlan, RuntimeConfig, WorkflowRuntime};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "studyflow")]
#[command(about = "Generate study material for a learning space", long_about = None)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the study workflow for one learning space
    Run(RunArgs),

    /// Compile the study workflow and print its execution levels
    Validate,

    /// List the workflow's nodes
    Nodes,

    /// Write an example request file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "request.json")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Request file written by `init`; replaces the individual request flags
    #[arg(short, long)]
    request: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    learning_space_id: i64,

    /// Topic to study
    #[arg(short, long)]
    topic: Option<String>,

    /// Reference document (pdf, image or audio) to ground the summary on
    #[arg(long)]
    file_url: Option<String>,

    #[arg(long, default_value = "English")]
    language: String,

    #[arg(long, default_value = "general")]
    grade_level: String,

    /// Pronouns used when addressing the student
    #[arg(long)]
    presentation: Option<String>,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "STUDYFLOW_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    supabase_key: Option<String>,

    /// Abort the run after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    #[arg(long, default_value_t = 10)]
    max_parallel: usize,

    /// Keep results in memory instead of writing them to the store
    #[arg(long)]
    dry_run: bool,

    /// Load topic, reference document and student profile for
    /// --learning-space-id from the store
    #[arg(long, conflicts_with_all = ["request", "topic"])]
    from_store: bool,
}

/// Request file layout shared by `init` and `run --request`.
#[derive(Serialize, Deserialize)]
struct StudyRequest {
    learning_space_id: i64,
    profile: StudentProfile,
    task: TaskDescription,
}

impl RunArgs {
    fn study_request(&self) -> Result<StudyRequest> {
        if let Some(path) = &self.request {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()));
        }

        let Some(topic) = self.topic.clone() else {
            bail!("either --request or --topic is required");
        };
        Ok(StudyRequest {
            learning_space_id: self.learning_space_id,
            profile: StudentProfile {
                language: self.language.clone(),
                grade_level: self.grade_level.clone(),
                presentation: self.presentation.clone(),
            },
            task: TaskDescription {
                topic,
                file_url: self.file_url.clone(),
            },
        })
    }

    async fn initial_state(&self) -> Result<LearningState> {
        if self.from_store {
            let state = self
                .rest_store()?
                .load_state(self.learning_space_id)
                .await
                .with_context(|| format!("loading learning space {}", self.learning_space_id))?;
            return Ok(state);
        }
        let request = self.study_request()?;
        Ok(LearningState::new(
            request.learning_space_id,
            request.profile,
            request.task,
        ))
    }

    fn rest_store(&self) -> Result<RestPersistence> {
        match (&self.supabase_url, &self.supabase_key) {
            (Some(url), Some(key)) => Ok(RestPersistence::new(url, key)),
            _ => bail!("SUPABASE_URL and SUPABASE_KEY are required to reach the store (or pass --dry-run)"),
        }
    }

    fn persistence(&self) -> Result<Arc<dyn PersistenceService>> {
        if self.dry_run {
            return Ok(Arc::new(InMemoryPersistence::new()));
        }
        Ok(Arc::new(self.rest_store()?))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    match cli.command {
        Commands::Run(args) => run_workflow(args).await,
        Commands::Validate => validate_workflow(),
        Commands::Nodes => {
            list_nodes();
            Ok(())
        }
        Commands::Init { output } => create_example_request(output),
    }
}

async fn run_workflow(args: RunArgs) -> Result<()> {
    let state = args.initial_state().await?;
    let provider = Arc::new(GeminiProvider::new(args.api_key.clone()).with_model(args.model.clone()));
    let graph = study_workflow(provider, args.persistence()?);

    let runtime = WorkflowRuntime::with_config(RuntimeConfig {
        max_parallel_nodes: args.max_parallel,
        run_deadline: args.deadline_ms.map(Duration::from_millis),
        ..RuntimeConfig::default()
    });

    tracing::debug!(
        "max_parallel={} deadline_ms={:?} model={}",
        args.max_parallel,
        args.deadline_ms,
        args.model
    );

    println!("🚀 Study workflow for learning space {}", state.learning_space_id);
    println!("   Topic: {}", state.task.topic);
    if args.dry_run {
        println!("   Dry run: results stay in memory");
    }
    println!();

    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let done = matches!(event, ExecutionEvent::RunCompleted { .. });
            print_event(event);
            if done {
                break;
            }
        }
    });

    let result = runtime.execute(&graph, state).await;

    // Let the listener drain before printing the summary.
    let _ = tokio::time::timeout(Duration::from_millis(200), event_task).await;
    println!();

    match result {
        Ok(state) => {
            println!("📤 Results:");
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        Err(err) => {
            if let Some(report) = err.report() {
                println!("📊 Node outcomes ({}):", report.execution_id);
                for (node, outcome) in &report.outcomes {
                    println!("   {:<22} {}", node, describe(outcome));
                }
                println!();
                println!("📤 Partial results:");
                println!("{}", serde_json::to_string_pretty(&report.state)?);
            }
            Err(err.into())
        }
    }
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::RunStarted { workflow, .. } => {
            println!("▶️  Run of '{}' started", workflow);
        }
        ExecutionEvent::NodeStarted {
            node, node_type, ..
        } => {
            println!("  ⚡ Starting node: {} ({})", node, node_type);
        }
        ExecutionEvent::NodeCompleted {
            node,
            fields,
            duration_ms,
            ..
        } => {
            let fields: Vec<&str> = fields.iter().map(|f| f.as_str()).collect();
            println!(
                "  ✅ Node {} wrote [{}] in {}ms",
                node,
                fields.join(", "),
                duration_ms
            );
        }
        ExecutionEvent::NodeFailed { node, error, .. } => {
            println!("  ❌ Node {} failed: {}", node, error);
        }
        ExecutionEvent::NodeEvent { node, event, .. } => match event {
            NodeEvent::Info { message } => println!("     ℹ️  [{}] {}", node, message),
            NodeEvent::Warning { message } => println!("     ⚠️  [{}] {}", node, message),
            NodeEvent::Progress { percent, message } => match message {
                Some(msg) => println!("     📊 [{}] {}% - {}", node, percent, msg),
                None => println!("     📊 [{}] {}%", node, percent),
            },
        },
        ExecutionEvent::RunCompleted {
            status, duration_ms, ..
        } => match status {
            RunStatus::Completed => println!("✨ Run completed in {}ms", duration_ms),
            _ => println!("💥 Run ended {:?} after {}ms", status, duration_ms),
        },
    }
}

fn describe(outcome: &NodeOutcome) -> String {
    match outcome {
        NodeOutcome::Completed { duration_ms } => format!("completed in {}ms", duration_ms),
        NodeOutcome::Failed { error } => format!("failed: {}", error),
        NodeOutcome::InFlight => "still running at the deadline".to_string(),
        NodeOutcome::Skipped => "skipped".to_string(),
    }
}

/// The study workflow wired to inert collaborators, for inspection only.
fn offline_workflow() -> WorkflowGraph {
    study_workflow(
        Arc::new(GeminiProvider::new(String::new())),
        Arc::new(InMemoryPersistence::new()),
    )
}

fn validate_workflow() -> Result<()> {
    let graph = offline_workflow();
    println!("🔍 Validating workflow: {}", graph.name);

    let plan = ExecutionPlan::compile(&graph)?;
    println!("✅ Workflow is valid: {} nodes", plan.len());
    for (depth, level) in plan.levels().iter().enumerate() {
        println!("   Level {}: {}", depth, level.join(", "));
    }
    Ok(())
}

fn list_nodes() {
    let graph = offline_workflow();
    println!("📦 Nodes of '{}':", graph.name);
    println!();
    for spec in &graph.nodes {
        let fields: Vec<&str> = spec.node.owned_fields().iter().map(|f| f.as_str()).collect();
        println!("  • {} ({})", spec.name, spec.node.node_type());
        println!("    writes: {}", fields.join(", "));
    }
}

fn create_example_request(output: PathBuf) -> Result<()> {
    let request = StudyRequest {
        learning_space_id: 1,
        profile: StudentProfile {
            language: "English".to_string(),
            grade_level: "class 8".to_string(),
            presentation: Some("they/them".to_string()),
        },
        task: TaskDescription {
            topic: "The water cycle".to_string(),
            file_url: None,
        },
    };

    let json = serde_json::to_string_pretty(&request)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example request: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  studyflow run --request {} --dry-run", output.display());
    Ok(())
}
