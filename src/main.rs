//! Preprocessing Engine - Command Line Entry Point
//!
//! Runs an item pipeline described in a TOML file over the file's test
//! inputs and prints what each step produced.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use preproc_rs::{
    config::PipelineFile,
    pipeline::{ExecutionContext, FailureAction, PipelineOutput},
};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "preproc-rs")]
#[command(about = "Item value preprocessing engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline definition over its test inputs
    Test {
        /// Pipeline definition (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Also write logs to this file
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,preproc_rs=debug"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let name = path
                .file_name()
                .with_context(|| format!("invalid log file path {}", path.display()))?;
            let appender = tracing_appender::rolling::never(dir.unwrap_or(std::path::Path::new(".")), name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

fn print_output(index: usize, output: &PipelineOutput, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string(&serde_json::json!({
            "input": index,
            "value": output.value,
            "steps": output
                .results
                .iter()
                .map(|r| serde_json::json!({
                    "value": r.value,
                    "action": r.action,
                    "error": r.value_before_override,
                }))
                .collect::<Vec<_>>(),
        }))?;
        println!("{}", text);
        return Ok(());
    }

    println!("input #{}", index + 1);
    for (i, result) in output.results.iter().enumerate() {
        match (&result.action, &result.value_before_override) {
            (Some(action), Some(raw)) if *action != FailureAction::Default => {
                println!("  {}. {} ({}: {})", i + 1, result.value.type_desc(), action, raw);
            }
            _ => println!("  {}. {}: {}", i + 1, result.value.type_desc(), result.value),
        }
    }
    println!("  => {}: {}", output.value.type_desc(), output.value);
    Ok(())
}

fn run_test(config: PathBuf, json: bool) -> Result<()> {
    let file = PipelineFile::load(&config)?;
    let inputs = file.inputs;
    let mut pipeline = file.item.into_pipeline()?;
    let mut ctx = ExecutionContext::new(file.engine);

    tracing::info!(
        item_id = pipeline.item_id(),
        steps = pipeline.steps().len(),
        inputs = inputs.len(),
        "running pipeline from {}",
        config.display()
    );

    for (index, input) in inputs.iter().enumerate() {
        let value = input.to_value()?;
        let timestamp = input.timestamp();
        let cache = pipeline.parse_cache(&value);

        let output = ctx.run(&mut pipeline, cache.as_ref(), &value, timestamp);
        print_output(index, &output, json)?;

        if let Some(cache) = cache {
            cache.release();
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Test {
            config,
            log_file,
            json,
        } => {
            let _guard = init_logging(log_file.as_ref())?;
            run_test(config, json)
        }
    }
}
