//! reweave CLI: replay a recorded workflow DAG against an OpenAI-compatible
//! inference backend under a chosen scheduling policy, or compare policies.
//!
//! Flow: env config + logging, load and print the DAG, health-check the
//! backend (fatal before execution), run one policy or `--compare`, save
//! result documents and the comparison report, print client statistics.

mod logging;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use reweave::{
    render_structure, statistics, ChatCompletionsClient, InferenceClient, MetricsCollector,
    SchedulerConfig, SchedulingPolicy, WorkflowDag, WorkflowExecutionResult, WorkflowScheduler,
};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/v1";
const DEFAULT_API_KEY: &str = "sk-local-demo";
const DEFAULT_MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";

#[derive(Parser, Debug)]
#[command(name = "reweave")]
#[command(about = "Replay recorded multi-agent workflow DAGs with DAG-aware scheduling")]
struct Args {
    /// Path to the workflow DAG JSON file
    #[arg(long, value_name = "PATH")]
    dag: PathBuf,

    /// Inference server base URL (default: REWEAVE_BASE_URL or http://127.0.0.1:8000/v1)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Model name on the server (default: REWEAVE_MODEL or Llama-3.1-8B-Instruct)
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// Scheduling policy: sequential, dependency_aware, parallel
    #[arg(long, value_name = "POLICY", default_value = "dependency_aware")]
    policy: String,

    /// Maximum parallel nodes within a batch
    #[arg(long, value_name = "N", default_value_t = 4)]
    max_parallel: usize,

    /// Maximum tokens per node
    #[arg(long, value_name = "N", default_value_t = 512)]
    max_tokens: u32,

    /// Sampling temperature
    #[arg(long, value_name = "T", default_value_t = 0.7)]
    temperature: f32,

    /// Disable tool calling
    #[arg(long)]
    disable_tools: bool,

    /// Output directory for result and report files
    #[arg(long, value_name = "DIR", default_value = "results")]
    output_dir: PathBuf,

    /// Run sequential and dependency_aware and compare them
    #[arg(long)]
    compare: bool,
}

fn resolve_base_url(args: &Args) -> String {
    args.base_url
        .clone()
        .or_else(|| std::env::var("REWEAVE_BASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

fn resolve_api_key() -> String {
    std::env::var("REWEAVE_API_KEY").unwrap_or_else(|_| DEFAULT_API_KEY.to_string())
}

fn resolve_model(args: &Args) -> String {
    args.model
        .clone()
        .or_else(|| std::env::var("REWEAVE_MODEL").ok())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

fn banner(title: &str) {
    println!("\n{}", "=".repeat(70));
    println!("{title}");
    println!("{}", "=".repeat(70));
}

/// File stem timestamp, e.g. 20260801_143005.
fn file_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn scheduler_config(args: &Args, policy: SchedulingPolicy) -> SchedulerConfig {
    SchedulerConfig {
        policy,
        max_parallel: args.max_parallel,
        enable_tools: !args.disable_tools,
        max_tokens: args.max_tokens,
        temperature: args.temperature,
        ..SchedulerConfig::default()
    }
}

/// Runs one policy with a fresh scheduler and saves the result document.
async fn run_policy(
    args: &Args,
    dag: &Arc<WorkflowDag>,
    client: &Arc<ChatCompletionsClient>,
    policy: SchedulingPolicy,
) -> Result<WorkflowExecutionResult, Box<dyn std::error::Error>> {
    banner(&format!("RUNNING WITH POLICY: {policy}"));

    let config = scheduler_config(args, policy);
    let mut scheduler = WorkflowScheduler::new(
        Arc::clone(dag),
        Arc::clone(client) as Arc<dyn InferenceClient>,
        config,
    )?;
    let result = scheduler.execute().await;

    println!(
        "  Nodes executed: {}/{}  Batches: {}  Tokens: {}  Time: {:.0}ms  Success: {}",
        result.nodes_executed,
        result.total_nodes,
        result.total_batches,
        result.total_tokens,
        result.total_time_ms,
        result.success
    );
    if let Some(ref error) = result.error {
        println!("  Error: {error}");
    }

    let file = args.output_dir.join(format!(
        "{}_{}_{}.json",
        result.task_id,
        policy,
        file_timestamp()
    ));
    result.write_json(&file)?;
    println!("  Results saved to: {}", file.display());
    Ok(result)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config::load_and_apply("reweave", None).ok();
    logging::init()?;

    let args = Args::parse();
    let policy = SchedulingPolicy::from_str(&args.policy).unwrap_or_else(|error| {
        eprintln!("reweave: {error}");
        std::process::exit(2);
    });
    std::fs::create_dir_all(&args.output_dir)?;

    banner("LOADING DAG");
    println!("DAG file: {}", args.dag.display());
    let dag = match WorkflowDag::from_path(&args.dag) {
        Ok(dag) => Arc::new(dag),
        Err(error) => {
            eprintln!("reweave: failed to load DAG: {error}");
            std::process::exit(1);
        }
    };
    println!("{}", render_structure(&dag)?);

    banner("DAG STATISTICS");
    let stats = statistics(&dag)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let base_url = resolve_base_url(&args);
    let model = resolve_model(&args);
    banner("INITIALIZING INFERENCE CLIENT");
    println!("Server URL: {base_url}");
    println!("Model: {model}");
    let client = Arc::new(ChatCompletionsClient::new(
        &base_url,
        resolve_api_key(),
        &model,
    ));

    println!("\nChecking backend health...");
    if !client.check_health().await {
        eprintln!("reweave: backend is not responding at {base_url}");
        eprintln!("Start an OpenAI-compatible server first, e.g.:");
        eprintln!("  docker run --rm -it --gpus all -p 8000:8000 --ipc=host \\");
        eprintln!("    vllm/vllm-openai:latest --model {model}");
        std::process::exit(1);
    }
    println!("Backend is healthy");

    let models = client.list_models().await;
    if !models.is_empty() {
        println!("\nAvailable models on server:");
        for id in &models {
            println!("  - {id}");
        }
    }

    if args.compare {
        let mut collector = MetricsCollector::new();
        for policy in [SchedulingPolicy::Sequential, SchedulingPolicy::DependencyAware] {
            let result = run_policy(&args, &dag, &client, policy).await?;
            collector.add_result(&policy.to_string(), result);
        }

        banner("GENERATING COMPARISON REPORT");
        let report = collector.generate_report();
        println!("{report}");

        let report_file = args.output_dir.join(format!(
            "{}_comparison_{}.txt",
            dag.metadata.task_id_or_unknown(),
            file_timestamp()
        ));
        std::fs::write(&report_file, &report)?;
        println!("Comparison report saved to: {}", report_file.display());
    } else {
        run_policy(&args, &dag, &client, policy).await?;
    }

    banner("CLIENT STATISTICS");
    println!("{}", serde_json::to_string_pretty(&client.statistics())?);

    banner("EXECUTION COMPLETE");
    Ok(())
}
