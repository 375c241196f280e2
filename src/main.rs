use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod alerts;
mod compile;
mod config;
mod deviation;
mod error;
mod ingest;
mod models;
mod quality;
mod report;

use compile::Compiler;
use config::MonitoringConfig;
use error::CompileError;
use report::ReportMode;

#[derive(Parser)]
#[command(name = "landscape-health-alerts")]
#[command(about = "Monthly landscape health alerts from satellite indicator exports", long_about = None)]
struct Cli {
    /// Zone and threshold configuration
    #[arg(long, global = true, default_value = "config/zones.json")]
    config: PathBuf,
    /// Indicator catalog
    #[arg(long, global = true, default_value = "config/indicators.json")]
    indicators: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the monthly dataset from indicator exports
    Process {
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
        #[arg(long, default_value = "gee/exports")]
        exports_dir: PathBuf,
        #[arg(long, default_value = "data/monthly")]
        out_dir: PathBuf,
    },
    /// Render a text report from a compiled monthly dataset
    Report {
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
        #[arg(long, value_enum, default_value_t = ReportMode::Full)]
        mode: ReportMode,
        #[arg(long, default_value = "data/monthly")]
        data_dir: PathBuf,
        #[arg(long, default_value = "reports/monthly")]
        out_dir: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = MonitoringConfig::load(&cli.config, &cli.indicators)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Process {
            year,
            month,
            exports_dir,
            out_dir,
        } => {
            let compiler = Compiler::new(config, exports_dir, out_dir);
            match compiler.run(year, month) {
                Ok((dataset, path)) => {
                    println!(
                        "Processing complete: {} alerts ({} HIGH), written to {}.",
                        dataset.alerts.len(),
                        dataset.high_alert_count(),
                        path.display()
                    );
                }
                Err(err @ CompileError::NoDatasets { .. }) => {
                    println!("Processing failed: no datasets found.");
                    return Err(err.into());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Report {
            year,
            month,
            mode,
            data_dir,
            out_dir,
        } => {
            let dataset = compile::load_dataset(&data_dir, year, month)?;
            let content = report::build_report(mode, &dataset, &config);
            let path = report::save_report(&out_dir, mode, year, month, &content)?;
            println!("Report written to {}.", path.display());
        }
    }

    Ok(())
}
