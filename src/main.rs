// src/main.rs

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use vulnvision::logging::initialize_logging;
use vulnvision::{ReportFormat, ScanConfig, ScanError, Scanner};

/// VulnVision - passive web exposure scanner
#[derive(Parser)]
#[command(name = "vulnvision", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan one or more targets concurrently and print each result
    Scan {
        /// Hostnames or http(s) URLs
        #[arg(required = true)]
        targets: Vec<String>,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (json or text)
        #[arg(short, long, default_value = "json")]
        format: ReportFormat,
    },
    /// Scan a single target and write its report
    Report {
        /// Hostname or http(s) URL
        target: String,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (json or text)
        #[arg(short, long, default_value = "json")]
        format: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// Logging is set up before the runtime spawns its workers, so the local UTC
// offset can still be read.
fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let log_path = initialize_logging()?;

    let cli = Cli::parse();
    info!(log = %log_path.display(), "VulnVision starting.");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("failed to start the async runtime")?
        .block_on(run(cli))
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let ok = match cli.command {
        Commands::Scan { targets, config, format } => {
            let scanner = build_scanner(config.as_deref())?;
            run_scans(&scanner, &targets, format).await
        }
        Commands::Report { target, config, format, output } => {
            let scanner = build_scanner(config.as_deref())?;
            run_report(&scanner, &target, format, output.as_deref()).await?
        }
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn build_scanner(config: Option<&Path>) -> Result<Scanner> {
    let config = match config {
        Some(path) => ScanConfig::load(path),
        None => ScanConfig::from_env(),
    }
    .wrap_err("failed to load configuration")?;
    Scanner::new(config).wrap_err("failed to build scanner")
}

/// All targets share one scanner, so they share its cache and rate limit.
async fn run_scans(scanner: &Scanner, targets: &[String], format: ReportFormat) -> bool {
    let renderer = format.renderer();
    let outcomes = join_all(targets.iter().map(|t| scanner.report(t, renderer.as_ref()))).await;

    let mut ok = true;
    for (target, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            Ok(document) => println!("{document}"),
            Err(e) => {
                ok = false;
                print_error(target, &e);
            }
        }
    }
    ok
}

async fn run_report(scanner: &Scanner, target: &str, format: ReportFormat, output: Option<&Path>) -> Result<bool> {
    let document = match scanner.report(target, format.renderer().as_ref()).await {
        Ok(document) => document,
        Err(e) => {
            print_error(target, &e);
            return Ok(false);
        }
    };

    match output {
        Some(path) => {
            std::fs::write(path, &document)
                .wrap_err_with(|| format!("failed to write report to {}", path.display()))?;
            info!(path = %path.display(), "Report written.");
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{document}"),
    }
    Ok(true)
}

/// Errors go to stderr as the same `{code, message}` mapping a client would see.
fn print_error(target: &str, err: &ScanError) {
    if err.is_user_error() {
        warn!(target = %target, code = err.code(), error = %err, "Target rejected.");
    } else {
        error!(target = %target, code = err.code(), error = %err, "Scan failed.");
    }
    match serde_json::to_string(&err.to_body()) {
        Ok(body) => eprintln!("{body}"),
        Err(_) => eprintln!("{}: {err}", err.code()),
    }
}
