// crates/flowcli/src/main.rs

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use flowcore::context::MessageLevel;
use flowcore::{EdgeSchema, ExecutionEvent, NodeSchema, Status, WorkflowSchema};
use flowruntime::{FlowRuntime, JoinPolicy, NodeRegistry, RuntimeConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data as JSON object
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Print the full execution report as JSON
        #[arg(long)]
        report: bool,

        #[command(flatten)]
        runtime: RuntimeArgs,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[derive(Args)]
struct RuntimeArgs {
    /// Runtime configuration JSON file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of nodes running at once
    #[arg(long)]
    max_parallel: Option<usize>,

    /// How join nodes wait for their predecessors (wait-all, first-arrival)
    #[arg(long)]
    join_policy: Option<JoinPolicy>,

    /// Per-node timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl RuntimeArgs {
    fn load(&self) -> Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => RuntimeConfig::default(),
        };
        if let Some(max_parallel) = self.max_parallel {
            config.max_parallel_nodes = max_parallel;
        }
        if let Some(join_policy) = self.join_policy {
            config.join_policy = join_policy;
        }
        if self.timeout_ms.is_some() {
            config.node_timeout_ms = self.timeout_ms;
        }
        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    flownodes::register_all(&mut registry);
    registry
}

fn load_schema(file: &Path) -> Result<WorkflowSchema> {
    WorkflowSchema::from_file(file).with_context(|| format!("loading workflow {}", file.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
            report,
            runtime,
        } => {
            init_tracing(verbose);
            run_workflow(&file, input, report, runtime.load()?).await?;
        }

        Commands::Validate { file } => {
            init_tracing(false);
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

async fn run_workflow(
    file: &Path,
    input: Option<String>,
    print_report: bool,
    config: RuntimeConfig,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());
    tracing::debug!("Runtime config: {:?}", config);

    let schema = load_schema(file)?;
    println!("   Nodes: {}", schema.nodes.len());
    println!("   Edges: {}", schema.edges.len());
    println!();

    let inputs: HashMap<String, Value> = match input {
        Some(input_str) => match serde_json::from_str::<Value>(&input_str)? {
            Value::Object(obj) => obj.into_iter().collect(),
            _ => return Err(anyhow::anyhow!("Input must be a JSON object")),
        },
        None => HashMap::new(),
    };

    let runtime = FlowRuntime::with_registry(Arc::new(registry()), config);

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted { .. } => {
                    println!("▶️  Workflow started");
                }
                ExecutionEvent::NodeStarted { node_id, node_type, .. } => {
                    println!("  ⚡ Starting node: {} ({})", node_id, node_type);
                }
                ExecutionEvent::NodeCompleted {
                    node_id,
                    branch,
                    duration_ms,
                    ..
                } => match branch {
                    Some(branch) => println!(
                        "  ✅ Node {} completed in {}ms, branch '{}'",
                        node_id, duration_ms, branch
                    ),
                    None => println!("  ✅ Node {} completed in {}ms", node_id, duration_ms),
                },
                ExecutionEvent::NodeFailed { node_id, error, .. } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                ExecutionEvent::NodeSkipped { node_id, .. } => {
                    println!("  ⏭️  Node {} skipped", node_id);
                }
                ExecutionEvent::Message {
                    level,
                    node_id,
                    message,
                    ..
                } => {
                    let scope = node_id.unwrap_or_else(|| "workflow".to_string());
                    match level {
                        MessageLevel::Warn => println!("     ⚠️  [{}] {}", scope, message),
                        MessageLevel::Error => println!("     🛑 [{}] {}", scope, message),
                        _ => println!("     ℹ️  [{}] {}", scope, message),
                    }
                }
                ExecutionEvent::WorkflowCompleted {
                    status,
                    duration_ms,
                    ..
                } => match status {
                    Status::Succeeded => {
                        println!("✨ Workflow completed successfully in {}ms", duration_ms)
                    }
                    Status::Canceled => println!("🛑 Workflow canceled after {}ms", duration_ms),
                    _ => println!("💥 Workflow failed after {}ms", duration_ms),
                },
            }
        }
    });

    let task = runtime.invoke(&schema, inputs)?;
    let context = task.context().clone();
    let outcome = task.wait().await;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    let report = context.report();
    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", report.id);
    println!("   Status: {:?}", report.workflow_status.status);

    if print_report {
        println!();
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let outputs = outcome?;
    if !outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }

    Ok(())
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let schema = load_schema(file)?;
    let runtime = FlowRuntime::with_registry(Arc::new(registry()), RuntimeConfig::default());
    let document = runtime.validate(&schema)?;

    println!("✅ Workflow is valid:");
    println!("   Nodes: {}", document.nodes().count());
    println!("   Edges: {}", document.edges().count());
    println!("   Order: {}", document.topological_order()?.join(" → "));

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = registry();
    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
            for port in &metadata.inputs {
                let marker = if port.required { "*" } else { " " };
                println!("      {} {}: {}", marker, port.name, port.description);
            }
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut schema = WorkflowSchema::new();

    let start = schema.add_node(
        NodeSchema::new("start_0", "start")
            .with_position(100.0, 100.0)
            .with_data(json!({
                "title": "Start",
                "outputs": {
                    "type": "object",
                    "properties": { "score": { "type": "number" } }
                }
            })),
    );
    let condition = schema.add_node(
        NodeSchema::new("condition_0", "condition")
            .with_position(300.0, 100.0)
            .with_data(json!({
                "title": "Passed?",
                "conditions": [
                    {
                        "key": "pass",
                        "value": {
                            "left": { "type": "ref", "content": ["start_0", "score"] },
                            "operator": "gte",
                            "right": { "type": "constant", "content": 60 }
                        }
                    },
                    {
                        "key": "fail",
                        "value": {
                            "left": { "type": "ref", "content": ["start_0", "score"] },
                            "operator": "lt",
                            "right": { "type": "constant", "content": 60 }
                        }
                    }
                ]
            })),
    );
    let end = schema.add_node(
        NodeSchema::new("end_0", "end")
            .with_position(500.0, 100.0)
            .with_data(json!({
                "title": "End",
                "inputsValues": {
                    "summary": { "type": "template", "content": "score was {{start_0.score}}" }
                }
            })),
    );

    schema.connect(EdgeSchema::new(&start, &condition));
    schema.connect(EdgeSchema::new(&condition, &end).from_port("pass"));
    schema.connect(EdgeSchema::new(&condition, &end).from_port("fail"));

    let json = serde_json::to_string_pretty(&schema)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  flow run --file {} --input '{{\"score\": 72}}'", output.display());

    Ok(())
}
