// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;
pub mod config;
mod error;
mod kubernetes;
mod output;
pub mod progress;
mod scan;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::prelude::*;

use cli::{Args, Command};
use config::Config;
use kubernetes::K8sClient;
use output::OutputSink;
use progress::{create_progress_handle, create_spinner, track};
use scan::classify::Rules;
use scan::{ScanOptions, discover, handle_interrupts, run_scan};

/// Exit status after a second interrupt (128 + SIGINT)
const FORCED_EXIT_CODE: i32 = 130;

/// Initialize logging with file output and optional stderr
fn init_logging(verbose: bool) {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::fmt::format::FmtSpan;

    let log_dir = config::base_dir()
        .map(|p| p.join("log"))
        .unwrap_or_else(|_| std::path::PathBuf::from("."));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {}", e);
        return;
    }

    // 10MB per file, up to 5 files, also rotated daily
    let log_path = log_dir.join("check-conditions.log");
    let condition = RollingConditionBase::new()
        .daily()
        .max_size(10 * 1024 * 1024);

    let file_appender = match RollingFileAppenderBase::new(log_path, condition, 5) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {}", e);
            return;
        }
    };

    let (non_blocking, _guard) = file_appender.get_non_blocking_appender();
    // Leak the guard to keep the background writer alive
    std::mem::forget(_guard);

    let filter = if verbose {
        "check_conditions=debug"
    } else {
        "check_conditions=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    if verbose {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::NONE);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(stderr_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Warning: a rustls crypto provider was already installed");
    }

    let args = Args::parse();
    init_logging(args.verbose);

    match args.command.unwrap_or_default() {
        Command::All => run_all(&args).await,
    }
}

async fn run_all(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let rules = Arc::new(Rules::from_config(&config));
    let options = ScanOptions {
        workers: config.worker_count(args.workers.map(|w| w as usize)),
        verbose: args.verbose,
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let forced =
                handle_interrupts(cancel, || async { tokio::signal::ctrl_c().await.is_ok() }).await;
            if forced {
                std::process::exit(FORCED_EXIT_CODE);
            }
        });
    }

    let sink = Arc::new(OutputSink::stdout());
    let progress = create_progress_handle();
    let mut progress_rx = progress.subscribe();
    let spinner = create_spinner("Connecting to Kubernetes...");

    let connect = K8sClient::connect(args.context.as_deref(), &progress);
    let client = match track(connect, &spinner, &mut progress_rx, &cancel).await {
        Some(Ok(client)) => Arc::new(client),
        Some(Err(e)) => {
            spinner.finish_and_clear();
            return Err(e).context("Cannot connect to the cluster");
        }
        None => {
            spinner.finish_and_clear();
            sink.line("Scan interrupted before connecting to the cluster");
            return Ok(());
        }
    };
    info!(context = %client.context(), workers = options.workers, "Connected");

    let catalog = track(discover(&*client), &spinner, &mut progress_rx, &cancel).await;
    // Report lines start right after discovery
    spinner.finish_and_clear();
    let catalog = match catalog {
        Some(result) => result.context("Cannot discover resource types")?,
        None => {
            sink.line("Scan interrupted before resource types were discovered");
            return Ok(());
        }
    };

    let report = run_scan(client, catalog, rules, sink, options, cancel).await;
    info!(
        discovered = report.discovered,
        not_checked = report.not_enqueued,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Done"
    );
    Ok(())
}
