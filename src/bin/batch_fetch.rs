//! batch-fetch — run a configured batch of rate-limited HTTP requests.
//!
//! Usage:
//!   batch-fetch run --config <file> [--limit N] [--audit-log <csv>] [--label <name>]
//!   batch-fetch check --config <file>

use anyhow::{bail, Context};
use batch_fetch::audit::CsvAuditLog;
use batch_fetch::batch::{chunk_count, NoopSink};
use batch_fetch::source::load_items;
use batch_fetch::RunConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "batch-fetch", version, about = "Rate-limited batch HTTP requests with chunked persistence")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Load items, dispatch them chunk by chunk and write results to disk
    Run(RunArgs),
    /// Validate the config and item source without sending any request
    Check(ConfigArg),
}

#[derive(Debug, Args)]
struct ConfigArg {
    /// YAML run configuration
    #[arg(short, long, env = "BATCH_FETCH_CONFIG")]
    config: PathBuf,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArg,

    /// Only process the first N items (trial run)
    #[arg(long)]
    limit: Option<usize>,

    /// Append per-batch success/failure counts to this CSV (overrides `audit_log`)
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Override the config's label
    #[arg(long)]
    label: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Check(args) => cmd_check(args).await,
    }
}

async fn load_config(arg: &ConfigArg) -> anyhow::Result<RunConfig> {
    RunConfig::load(&arg.config)
        .await
        .with_context(|| format!("loading {}", arg.config.display()))
}

async fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(&args.config).await?;
    if let Some(label) = args.label {
        cfg.label = label;
    }
    let Some(source) = cfg.source.as_ref() else {
        bail!("config has no `source` section; nothing to run");
    };

    let mut items = load_items(source)?;
    if let Some(limit) = args.limit {
        items.truncate(limit);
    }

    let runner = cfg.runner_builder()?.build()?;
    info!(
        label = %cfg.label,
        items = items.len(),
        batches = chunk_count(items.len(), cfg.chunk_size),
        output_dir = %cfg.output_dir.display(),
        "Running batch"
    );

    let summary = match args.audit_log.or_else(|| cfg.audit_log.clone()) {
        Some(path) => {
            let mut audit = CsvAuditLog::new(path, cfg.label.clone());
            runner.run(items, &mut audit).await?
        }
        None => runner.run(items, &mut NoopSink).await?,
    };

    println!(
        "{} batches, {} records: {} succeeded, {} failed",
        summary.batches, summary.records, summary.succeeded, summary.failed
    );
    for file in &summary.files {
        println!("  {}", file.display());
    }
    Ok(())
}

async fn cmd_check(args: ConfigArg) -> anyhow::Result<()> {
    let cfg = load_config(&args).await?;
    println!("Config: {}", args.config.display());
    println!("  label:        {}", cfg.label);
    println!("  request:      {} {}", cfg.method, cfg.url_template);
    println!("  rate limit:   {}/s", cfg.rate_limit);
    println!("  chunk size:   {}", cfg.chunk_size);

    // Fails early on a missing key or an unrenderable header.
    let api_key = cfg.resolve_api_key()?;
    let headers = cfg.header_map(api_key.as_deref())?;
    println!("  headers:      {}", headers.len());

    match &cfg.source {
        Some(source) => {
            let items = load_items(source)?;
            let url = batch_fetch::utils::Template::parse(cfg.url_template.as_str())?;
            let unrenderable = items.iter().filter(|i| url.render(i).is_err()).count();
            println!(
                "  items:        {} ({} batches, {} with missing URL fields)",
                items.len(),
                chunk_count(items.len(), cfg.chunk_size),
                unrenderable
            );
        }
        None => println!("  items:        no source configured"),
    }
    println!("OK");
    Ok(())
}
