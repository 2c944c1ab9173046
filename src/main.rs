use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod dataset;
mod error;
mod invoker;
mod metrics;
mod models;
mod output;
mod pipeline;
mod runner;
mod template;
mod trace;

use crate::config::Config;
use crate::dataset::DatasetStore;
use crate::invoker::build_invoker;
use crate::metrics::metrics_from_names;
use crate::output::OutputFormat;
use crate::pipeline::RatingPipeline;
use crate::runner::EvaluationRunner;
use crate::template::TemplateStore;
use crate::trace::{LogSink, Tracer};

/// Movie rating evaluation CLI - run the two-step rating chain over a dataset and score the results
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML run file
    run_file: PathBuf,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain")]
    output: OutputFormat,

    /// Verbose output - include per-call trace spans in the log
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = Config::from_file(&args.run_file)?;

    let mut templates = TemplateStore::builtin();
    for template in config.templates.clone() {
        templates.register(template);
    }

    let mut datasets = DatasetStore::new();
    let dataset = datasets.get_or_create(&config.dataset_name);
    dataset.insert(config.items.clone(), config.insert_mode);

    let tracer = Tracer::new(Arc::new(LogSink::new()));
    let invoker = build_invoker(&config, tracer.clone());

    let pipeline = RatingPipeline::new(&templates, invoker, tracer.clone())
        .context("Failed to construct rating pipeline")?;
    let metrics = metrics_from_names(&config.metrics)
        .context("Failed to resolve metrics from the run file")?;

    let runner = EvaluationRunner::new(
        pipeline,
        metrics,
        config.experiment_name.clone(),
        config.description.clone(),
    );
    let report = runner.run(dataset).await;

    tracer.flush();

    if let Some(path) = &config.storage_path {
        output::store_report(&report, path)?;
    }
    output::print_results(&report, args.output);

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}
