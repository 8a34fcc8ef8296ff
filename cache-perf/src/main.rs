use std::panic;

use clap::Parser;
use tracing::{error, info};

use token_cache_perf::benchmarks::{PerfReport, ReportFormat, write_report};
use token_cache_perf::logging::setup_tracing;
use token_cache_perf::{Cli, load_config, run_benchmark};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(2);
        }
    };

    // Logging goes to stderr; stdout carries only the report
    if let Err(e) = setup_tracing(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    panic::set_hook(Box::new(|panic_info| {
        error!(?panic_info, "FATAL: Panic occurred");
        std::process::exit(1);
    }));

    info!(environment = ?config.environment, "Token cache benchmark starting");

    if let Err(e) = run(&config).await {
        error!(error = %e, "Benchmark failed");
        std::process::exit(1);
    }
}

async fn run(config: &token_cache_perf::AppConfig) -> anyhow::Result<()> {
    let format: ReportFormat = config.report.format.parse()?;
    let stats = run_benchmark(config).await?;
    let report = PerfReport::from_stats(&stats)?;

    let stdout = std::io::stdout();
    write_report(&report, format, &mut stdout.lock())?;

    info!(run_id = %report.run_id, "Benchmark complete");
    Ok(())
}
