mod logging;
mod runtime_info;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use edgetide_engine::config::parser;
use edgetide_engine::runner::DEFAULT_MAX_BATCH_SIZE;
use edgetide_engine::{Pipeline, PipelineRunner};
use edgetide_sdk::StageRegistry;
use edgetide_state::SqliteStateBackend;
use runtime_info::RuntimeInfo;

#[derive(Parser)]
#[command(
    name = "edgetide",
    version,
    about = "Edge data-collection engine for record pipelines"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline until it finishes, fails, or is interrupted
    Run {
        /// Path to the pipeline JSON file
        pipeline: PathBuf,
        /// Data directory (engine id, state database)
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Runtime parameters as a JSON object, e.g. '{"pollInterval": 30}'
        #[arg(long)]
        runtime_parameters: Option<String>,
        /// Records-per-cycle ceiling handed to the origin
        #[arg(long, default_value_t = DEFAULT_MAX_BATCH_SIZE)]
        max_batch_size: usize,
    },
    /// Validate a pipeline configuration without running it
    Validate {
        /// Path to the pipeline JSON file
        pipeline: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            pipeline,
            data_dir,
            runtime_parameters,
            max_batch_size,
        } => run(&pipeline, &data_dir, runtime_parameters.as_deref(), max_batch_size),
        Commands::Validate { pipeline } => validate(&pipeline),
    }
}

fn registry_with_builtins() -> Arc<StageRegistry> {
    let mut registry = StageRegistry::new();
    edgetide_stages::register_builtins(&mut registry);
    Arc::new(registry)
}

fn parse_runtime_parameters(raw: Option<&str>) -> Result<HashMap<String, serde_json::Value>> {
    match raw {
        Some(raw) => {
            serde_json::from_str(raw).context("Runtime parameters must be a JSON object")
        }
        None => Ok(HashMap::new()),
    }
}

fn run(
    pipeline_path: &PathBuf,
    data_dir: &PathBuf,
    runtime_parameters: Option<&str>,
    max_batch_size: usize,
) -> Result<()> {
    let runtime = RuntimeInfo::create(data_dir)?;
    tracing::info!(engine_id = runtime.id, "Edgetide starting");

    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;
    let parameters = parse_runtime_parameters(runtime_parameters)?;
    let registry = registry_with_builtins();
    let backend = Arc::new(SqliteStateBackend::open(&runtime.state_db_path())?);

    let mut runner = PipelineRunner::new(config, registry, backend)?;
    runner.set_max_batch_size(max_batch_size);
    runner.start(parameters)?;
    tracing::info!(pipeline = runner.pipeline_id().as_str(), "Pipeline started");

    wait_for_exit(&runner)?;
    let final_state = runner.join();

    println!(
        "Pipeline '{}' ended with status {}",
        final_state.pipeline_id, final_state.status
    );
    if !final_state.message.is_empty() {
        println!("  {}", final_state.message);
    }
    Ok(())
}

/// Block until the pipeline reaches a terminal state or Ctrl-C arrives;
/// on Ctrl-C, request a graceful stop and wait for it to complete.
fn wait_for_exit(runner: &PipelineRunner) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start signal runtime")?;
    rt.block_on(async {
        loop {
            if runner.status().status.is_terminal() {
                return;
            }
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupt received, stopping pipeline");
                    if let Err(e) = runner.stop() {
                        tracing::warn!("Stop request rejected: {e}");
                        return;
                    }
                }
                () = tokio::time::sleep(Duration::from_millis(200)) => {}
            }
        }
    });
    Ok(())
}

fn validate(pipeline_path: &PathBuf) -> Result<()> {
    let config = parser::parse_pipeline(pipeline_path)
        .with_context(|| format!("Failed to parse pipeline: {}", pipeline_path.display()))?;
    let registry = registry_with_builtins();
    Pipeline::build(&config, &registry, &HashMap::new())?;
    println!("Pipeline '{}' is valid.", config.pipeline_id);
    Ok(())
}
