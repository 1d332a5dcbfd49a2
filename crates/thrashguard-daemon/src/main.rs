use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thrashguard_core::{
    FaultSampler, FaultScanner, ProcfsSource, TerminationSignals, VmstatSampler, VERSION,
};
use thrashguard_daemon::{build_controller, supervise, Config};
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// thrashguard - memory thrashing guard daemon
///
/// Freezes the process causing a major page-fault storm and resumes it once
/// the storm has passed
#[derive(Parser, Debug)]
#[command(name = "thrashguard-daemon")]
#[command(version = VERSION)]
#[command(about = "thrashguard daemon - memory thrashing guard", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/thrashguard/config.toml")]
    config: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the guard until SIGINT/SIGTERM
    Run,

    /// Sample twice and report what would be frozen, without sending signals
    Check,

    /// Generate default configuration file
    GenerateConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, loaded_from_file) = load_config(&cli.config)?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    let log_guard = init_logging(&config)?;

    info!("thrashguard daemon v{} starting...", VERSION);
    if loaded_from_file {
        info!("Configuration loaded from: {:?}", cli.config);
    } else {
        warn!("Configuration file not found: {:?}, using defaults", cli.config);
    }

    match cli.command {
        Some(Commands::Run) | None => {
            let code = run_guard(config).await?;
            // process::exit skips destructors, flush the file writer first
            drop(log_guard);
            std::process::exit(code);
        }
        Some(Commands::Check) => run_check(config).await?,
        Some(Commands::GenerateConfig { output }) => generate_config(&output)?,
    }

    Ok(())
}

/// Run the control loop, drain on exit, return the process exit code
async fn run_guard(config: Config) -> Result<i32> {
    info!(
        "Interval: {}s, fault threshold: {}, refresh threshold: {}, pop ratio: {}",
        config.monitoring.interval_secs,
        config.thresholds.fault_threshold,
        config.thresholds.scan_refresh_threshold,
        config.freeze.unfreeze_pop_ratio
    );
    info!("Whitelist: {}", config.freeze.whitelist.join(", "));

    // Register before the first freeze so an early signal still drains
    let mut signals = TerminationSignals::register()?;

    let controller = build_controller(&config)
        .map_err(|e| anyhow::anyhow!("Cannot start thrashing guard: {}", e))?;

    let (exit, report) = supervise(controller, signals.recv()).await;

    info!(
        "Stopped ({:?}), {} processes unfrozen, {} failed",
        exit,
        report.resumed.len(),
        report.failed.len()
    );

    Ok(if exit.is_success() { 0 } else { 1 })
}

/// Two samples one interval apart, plus the process that would be frozen
async fn run_check(config: Config) -> Result<()> {
    let controller_config = config.controller_config();
    let sampler = VmstatSampler::with_path(&config.paths.vmstat);
    let mut scanner = FaultScanner::new(
        ProcfsSource::with_root(&config.paths.proc_root),
        controller_config.whitelist.clone(),
    );

    let before = sampler.sample()?;
    scanner.scan()?;

    info!("Sampling for {:?}...", controller_config.interval);
    sleep(controller_config.interval).await;

    let after = sampler.sample()?;
    let candidate = scanner.scan()?;
    let delta = after.saturating_sub(before);

    info!("=== Thrashing Check ===");
    info!("pgmajfault: {} -> {} ({} in one interval)", before, after, delta);

    if delta > controller_config.fault_threshold {
        warn!("Above threshold {}", controller_config.fault_threshold);
    } else {
        info!("Below threshold {}", controller_config.fault_threshold);
    }

    match candidate {
        Some(c) => info!(
            "Would freeze: PID {} ({}), {} major faults",
            c.pid, c.comm, c.delta
        ),
        None => info!("No freeze candidate"),
    }

    Ok(())
}

/// Generate default configuration file
fn generate_config(output: &Path) -> Result<()> {
    info!("Generating default configuration file: {:?}", output);

    Config::default()
        .save_to_file(output)
        .map_err(|e| anyhow::anyhow!("Failed to save configuration file: {}", e))?;

    info!("Configuration file generated successfully");
    Ok(())
}

/// Load configuration from file or use defaults
fn load_config(path: &Path) -> Result<(Config, bool)> {
    if path.exists() {
        let config = Config::load_from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load configuration file: {}", e))?;
        Ok((config, true))
    } else {
        Ok((Config::default(), false))
    }
}

/// Initialize logging with stdout and daily-rotated file output
fn init_logging(config: &Config) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.logging.log_dir)?;

    let file_appender =
        tracing_appender::rolling::daily(&config.logging.log_dir, &config.logging.file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .init();

    info!("Logging initialized: {:?}", config.log_path());

    Ok(guard)
}
