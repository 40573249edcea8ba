//! Tripwire CLI - run the input-safety gate from the command line.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tripwire::config::GateConfig;
use tripwire::context::DEFAULT_TRACE_ID;
use tripwire::sanitize::{DEFAULT_MAX_CHARS, Sanitizer};
use tripwire::{GuardrailMode, Pipeline, PipelineOutcome};

const EXIT_TRIPPED: u8 = 2;
const EXIT_REJECTED: u8 = 3;

/// Tripwire - input-safety gate for LLM agents
#[derive(Parser, Debug)]
#[command(name = "tripwire")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Gate a query and, if it passes, answer it with the protected agent
    Run {
        /// The user query
        query: String,

        /// Topic the conversation is restricted to
        #[arg(short, long)]
        topic: String,

        /// Trace id used to correlate every oracle call of this run
        #[arg(long, default_value = DEFAULT_TRACE_ID)]
        trace_id: String,

        /// JSON configuration file
        #[arg(short, long, env = "TRIPWIRE_CONFIG")]
        config: Option<PathBuf>,

        /// Start the agent call alongside the guardrails
        #[arg(long)]
        parallel: bool,
    },

    /// Sanitize text offline and print the result
    Sanitize {
        /// Text to clean
        text: String,

        /// Reject disallowed characters instead of dropping them
        #[arg(long)]
        strict: bool,

        /// Maximum cleaned length in characters
        #[arg(long, default_value_t = DEFAULT_MAX_CHARS)]
        max_chars: usize,
    },

    /// List the available guardrails
    Guardrails {
        /// JSON configuration file with custom guardrails
        #[arg(short, long, env = "TRIPWIRE_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tripwire=debug,tripwire_cli=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tripwire=warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<GateConfig> {
    let config = match path {
        Some(path) => GateConfig::load(path)?,
        None => GateConfig::default(),
    };
    Ok(config)
}

async fn run(
    query: &str,
    topic: &str,
    trace_id: &str,
    config: Option<&Path>,
    parallel: bool,
) -> anyhow::Result<ExitCode> {
    let mut config = load_config(config)?;
    if parallel {
        config.mode = GuardrailMode::Parallel;
    }
    let oracle = Arc::new(config.oracle.build_oracle()?);
    let pipeline = Pipeline::from_config(&config, oracle);

    let report = pipeline.run_detailed(query, topic, trace_id).await?;
    tracing::info!(trace_id = %report.trace_id, metrics = %report.metrics, "run finished");

    let code = match report.outcome {
        PipelineOutcome::Completed { response } => {
            println!("{response}");
            ExitCode::SUCCESS
        }
        tripped @ PipelineOutcome::GuardrailTripped { .. } => {
            eprintln!("{tripped}");
            ExitCode::from(EXIT_TRIPPED)
        }
        rejected @ PipelineOutcome::SanitizationRejected { .. } => {
            eprintln!("{rejected}");
            ExitCode::from(EXIT_REJECTED)
        }
    };
    Ok(code)
}

fn sanitize(text: &str, strict: bool, max_chars: usize) -> ExitCode {
    match Sanitizer::new(max_chars).strict(strict).sanitize(text) {
        Ok(cleaned) => {
            println!("{cleaned}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Input rejected: {e}");
            ExitCode::from(EXIT_REJECTED)
        }
    }
}

fn list_guardrails(config: Option<&Path>) -> anyhow::Result<ExitCode> {
    let config = load_config(config)?;
    let registry = config.registry();
    for spec in registry.iter() {
        let marker = if config.guardrails.contains(&spec.identifier) {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<12} {:<28} {:?}", spec.identifier, spec.name, spec.kind);
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Run {
            query,
            topic,
            trace_id,
            config,
            parallel,
        } => run(&query, &topic, &trace_id, config.as_deref(), parallel).await,
        Command::Sanitize {
            text,
            strict,
            max_chars,
        } => Ok(sanitize(&text, strict, max_chars)),
        Command::Guardrails { config } => list_guardrails(config.as_deref()),
    }
}
