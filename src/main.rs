// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tetra::{
    config::Configuration,
    constants::DEFAULT_CONFIG_FILE,
    metrics::gather_metrics,
    provider::HttpAdapterFactory,
    reconciler::{reconcile, DomainStatus, ReconcileOptions, ReconcileReport},
};
use tracing::{debug, info};

/// Declarative layered DNS record synchronization.
#[derive(Debug, Parser)]
#[command(name = "tetra", version, about)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Only reconcile this domain (repeatable)
    #[arg(short = 'd', long = "domain", value_name = "DOMAIN")]
    domains: Vec<String>,

    /// Plan and print operations without applying them
    #[arg(short = 'D', long)]
    dry_run: bool,

    /// Rewrite owned records even when they already match
    #[arg(short, long)]
    force: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Write Prometheus metrics in text format to this file after the run
    #[arg(long, value_name = "PATH")]
    metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Completions { shell }) = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "tetra", &mut std::io::stdout());
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("tetra-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

fn init_logging(verbose: bool) {
    // RUST_LOG wins unless --verbose is given; RUST_LOG_FORMAT=json switches to JSON lines.
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    init_logging(cli.verbose);
    info!(config = %cli.config.display(), "Starting Tetra");

    let config = Configuration::load(&cli.config).await?;

    let options = ReconcileOptions {
        dry_run: cli.dry_run,
        force: cli.force,
        domains: cli.domains.clone(),
    };
    let report = reconcile(&config, &HttpAdapterFactory::default(), &options).await;
    print_report(&report);

    if let Some(path) = &cli.metrics_file {
        let text = gather_metrics().context("Failed to encode metrics")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        debug!(path = %path.display(), "Metrics written");
    }

    let failed = report
        .domains
        .iter()
        .filter(|domain| domain.status.is_failure())
        .count();
    if failed > 0 {
        bail!("{failed} of {} domain(s) failed", report.domains.len());
    }
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    print!("{}", render_report(report));
}

fn render_report(report: &ReconcileReport) -> String {
    let mut out = String::new();
    for domain in &report.domains {
        out.push_str(&format!("{domain}\n"));
        if domain.status == DomainStatus::Planned {
            for operation in &domain.planned {
                out.push_str(&format!("  {operation}\n"));
            }
        }
        for operation in &domain.applied {
            out.push_str(&format!("  applied: {operation}\n"));
        }
        if let Some(failed) = &domain.failed {
            out.push_str(&format!("  failed: {} ({})\n", failed.operation, failed.error));
        }
        for operation in &domain.abandoned {
            out.push_str(&format!("  abandoned: {operation}\n"));
        }
    }
    out
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
