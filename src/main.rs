//! # Agent Sequence Runner
//!
//! Command-line front end for `rig-sequencer`.
//!
//! - `run`: read an event file, execute the sequence it names and print the
//!   `{statusCode, body}` response
//! - `graph`: print the compiled sequence as a Mermaid diagram
//!
//! ## Quick Start
//! ```bash
//! export OPENAI_API_KEY=...
//! cargo run -- run --event events/test_event.json
//! cargo run -- graph test-seq
//! ```

// =============================================================================
// MODULE DECLARATIONS
// =============================================================================
/// Configuration management
mod config;

/// In-process demo tools
mod tools;

// =============================================================================
// IMPORTS
// =============================================================================
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rig_sequencer::{
    handle_with_cancellation, AgentComposer, HandlerDeps, SequenceRunnerPayload, StaticToolTransport,
    ToolRegistry, WorkflowCompiler,
};

use crate::config::Config;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "agent-sequence-runner",
    version = "0.1.0",
    about = "Runs declarative tool/agent sequences",
    long_about = r#"
Agent Sequence Runner

Executes a sequence declared in a catalogue file (or the built-in demo
catalogue). Each step either calls a tool or runs an LLM agent; results are
merged into a shared state that is printed at the end.

EXAMPLES:
  # Run the demo sequence with the in-process demo tools
  agent-sequence-runner run --event events/test_event.json

  # Use your own catalogue
  agent-sequence-runner run --event event.json --catalog sequences.yaml

  # Inspect the compiled graph
  agent-sequence-runner graph test-seq
"#
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Catalogue file (overrides SEQUENCE_CATALOG)
    #[arg(short = 'c', long = "catalog", global = true, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute the sequence described by an event file
    Run {
        /// JSON event: sequence_id, client_id, product_id, initial_state
        #[arg(short = 'e', long = "event", value_name = "FILE")]
        event: PathBuf,

        /// Do not serve the in-process demo tools
        #[arg(long = "no-demo-tools", default_value = "false")]
        no_demo_tools: bool,
    },

    /// Print a sequence as a Mermaid flowchart
    Graph {
        /// Sequence id in the catalogue
        #[arg(value_name = "SEQUENCE_ID")]
        sequence_id: String,
    },
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let config = Config::from_env()?.with_catalog(args.catalog.clone());

    match args.command {
        Command::Run { event, no_demo_tools } => {
            let config = config.with_demo_tools(!no_demo_tools);
            config.validate()?;
            run(&config, &event).await
        }
        Command::Graph { sequence_id } => {
            config.validate()?;
            graph(&config, &sequence_id).await
        }
    }
}

async fn run(config: &Config, event_path: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(event_path)
        .await
        .with_context(|| format!("Failed to read event file {}", event_path.display()))?;
    let payload: SequenceRunnerPayload =
        serde_json::from_str(&raw).context("Event file is not a valid sequence payload")?;

    info!(
        sequence_id = %payload.sequence_id,
        client_id = %payload.client_id,
        catalog = ?config.runner.catalog_path,
        "Running sequence"
    );

    let transport = if config.demo_tools {
        tools::demo_transport().await
    } else {
        StaticToolTransport::default()
    };
    let deps = HandlerDeps::new(
        config.runner.config_loader().await?,
        Arc::new(transport),
        Arc::new(config.runner.agent_runtime()),
    );

    // Ctrl-C은 다음 스텝 경계에서 실행을 멈춥니다
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling after the current step");
            watcher.cancel();
        }
    });

    let response = handle_with_cancellation(payload, &deps, &cancel).await;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.is_success() {
        anyhow::bail!("Sequence failed with status {}", response.status_code);
    }
    info!("Sequence completed successfully");
    Ok(())
}

async fn graph(config: &Config, sequence_id: &str) -> Result<()> {
    let loader = config.runner.config_loader().await?;
    let sequence = loader.load_sequence(sequence_id).await?;
    let agents = loader.load_all_agents().await?;

    // 노드 실행 없이 그래프 구조만 필요하므로 빈 도구 레지스트리로 충분합니다
    let composer = AgentComposer::new(
        Arc::new(agents),
        Arc::new(serde_json::Map::new()),
        Arc::new(config.runner.agent_runtime()),
    );
    let compiled = WorkflowCompiler::new(Arc::new(composer)).compile(&sequence, Arc::new(ToolRegistry::new()))?;

    println!("{}", compiled.to_mermaid());
    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
/// `RUST_LOG` wins when set; otherwise `--verbose` picks debug over info.
fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
