//! Tuneline CLI - command-line interface for the fine-tuning pipeline
//!
//! `tuneline-cli` runs the whole transform → fine-tune → infer → evaluate
//! pipeline locally, runs single stages against explicit inputs, and compiles
//! the stage graph for an external orchestrator.

mod commands;
mod config;
mod output;

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tuneline_core::ConfigOverrides;

use commands::{compile, evaluate, infer, init_config, list, run, train, transform};

/// Tuneline - fine-tune, evaluate and package a conversational adapter
#[derive(Parser, Debug)]
#[command(
    name = "tuneline-cli",
    author,
    version,
    about = "Tuneline - LoRA fine-tuning pipeline",
    long_about = "Tuneline turns a tabular dataset into chat conversations, \
                  fine-tunes a LoRA adapter on them,\n\
                  generates predictions for the held-out split and scores them."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Pipeline configuration file (defaults to ./tuneline.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Flags that override the configuration file.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct OverrideArgs {
    /// Dataset CSV location (gs://bucket/key, file:///abs or a path)
    #[arg(long)]
    source: Option<String>,

    /// Mirror stage outputs under this location
    #[arg(long)]
    dest: Option<String>,

    /// Seed for splitting, template choice and training
    #[arg(long)]
    seed: Option<u64>,

    /// Test examples to run inference on (negative for all)
    #[arg(long, allow_negative_numbers = true)]
    max_samples: Option<i64>,

    /// Prediction endpoint URL; switches inference to the endpoint backend
    #[arg(long)]
    endpoint: Option<String>,

    /// Directory holding one subdirectory per run
    #[arg(long)]
    runs_root: Option<PathBuf>,
}

impl OverrideArgs {
    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            source_uri: self.source.clone(),
            destination_uri: self.dest.clone(),
            seed: self.seed,
            max_samples: self.max_samples,
            endpoint_url: self.endpoint.clone(),
            runs_root: self.runs_root.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every stage in order under a new run id
    Run {
        #[command(flatten)]
        overrides: OverrideArgs,

        /// Use this run id instead of a generated one
        #[arg(long)]
        run_id: Option<String>,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load, format and split the dataset
    Transform {
        #[command(flatten)]
        overrides: OverrideArgs,

        #[arg(long)]
        run_id: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Fine-tune an adapter on a training JSONL file
    Train {
        /// Conversation JSONL produced by `transform`
        #[arg(long)]
        train: PathBuf,

        #[command(flatten)]
        overrides: OverrideArgs,

        #[arg(long)]
        run_id: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Generate predictions for a test JSONL file
    Infer {
        /// Conversation JSONL produced by `transform`
        #[arg(long)]
        test: PathBuf,

        /// Adapter directory or `trained:<run_id>`
        #[arg(long)]
        model: String,

        #[command(flatten)]
        overrides: OverrideArgs,

        #[arg(long)]
        run_id: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Score a predictions CSV
    Evaluate {
        /// `predictions.csv` produced by `infer`
        #[arg(long)]
        predictions: PathBuf,

        #[command(flatten)]
        overrides: OverrideArgs,

        #[arg(long)]
        run_id: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Validate the stage graph and emit the orchestrator document
    Compile {
        /// Write the JSON document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the graph as a tree instead of JSON
        #[arg(long)]
        ascii: bool,
    },

    /// List fine-tuned adapters under the runs root
    List {
        #[arg(long)]
        runs_root: Option<PathBuf>,

        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Target file
        #[arg(default_value = "tuneline.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = args.config.as_deref();
    match args.command {
        Command::Run { overrides, run_id, json } => {
            run::execute(config_path, &overrides, run_id, json).await
        }
        Command::Transform { overrides, run_id, json } => {
            transform::execute(config_path, &overrides, run_id, json).await
        }
        Command::Train { train, overrides, run_id, json } => {
            train::execute(config_path, &overrides, train, run_id, json).await
        }
        Command::Infer { test, model, overrides, run_id, json } => {
            infer::execute(config_path, &overrides, test, &model, run_id, json).await
        }
        Command::Evaluate { predictions, overrides, run_id, json } => {
            evaluate::execute(config_path, &overrides, predictions, run_id, json).await
        }
        Command::Compile { output, ascii } => compile::execute(config_path, output, ascii).await,
        Command::List { runs_root, json } => list::execute(config_path, runs_root, json).await,
        Command::InitConfig { path, force } => init_config::execute(&path, force).await,
    }
}
