use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::collections::HashSet;
use std::time::Duration;
use thrashguard_core::{FaultSampler, FaultScanner, ProcfsSource, VmstatSampler, VERSION};

#[derive(Parser)]
#[command(name = "thrashguard")]
#[command(author = "thrashguard contributors")]
#[command(version = VERSION)]
#[command(about = "Memory thrashing inspector - CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the major-fault counter and the processes with most major faults
    Status {
        /// Number of processes to list
        #[arg(short, long, default_value_t = 10)]
        top: usize,
    },

    /// Print major faults per interval and who is causing them (never freezes anything)
    Watch {
        /// Sampling interval, e.g. "2s" or "500ms"
        #[arg(short, long, default_value = "2s", value_parser = humantime::parse_duration)]
        interval: Duration,

        /// Faults per interval to highlight
        #[arg(short, long, default_value_t = 5)]
        threshold: u64,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Status { top }) => {
            println!("{}", "=== thrashguard Status ===".green().bold());
            show_status(top)
        }
        Some(Commands::Watch {
            interval,
            threshold,
        }) => {
            println!("{}", "=== thrashguard Watch Mode ===".green().bold());
            println!(
                "Interval {}, threshold {}. Press Ctrl+C to exit...\n",
                humantime::format_duration(interval),
                threshold
            );
            watch_mode(interval, threshold)
        }
        Some(Commands::Version) => {
            println!("thrashguard v{}", VERSION);
            println!("Memory thrashing guard");
            Ok(())
        }
        None => {
            println!("{}", "=== thrashguard Status ===".green().bold());
            show_status(10)
        }
    };

    if let Err(e) = result {
        eprintln!("{}", format!("❌ {}", e).red());
        std::process::exit(1);
    }
}

fn show_status(top: usize) -> Result<()> {
    let sampler = VmstatSampler::new();
    let scanner = FaultScanner::new(ProcfsSource::new(), HashSet::new());

    let count = sampler.sample()?;
    println!("\n  pgmajfault: {}", count.to_string().cyan());

    let processes = scanner.top(top)?;
    let faulting: Vec<_> = processes.into_iter().filter(|p| p.majflt > 0).collect();

    if faulting.is_empty() {
        println!("\n{}", "✅ No process has major faults".green());
    } else {
        println!("\n{} {}", "🔍 Top major-fault processes:".cyan(), faulting.len());
        for proc in faulting {
            println!(
                "  PID: {:>7}  majflt: {:>10}  {}",
                proc.pid, proc.majflt, proc.comm
            );
        }
    }

    println!();
    Ok(())
}

fn watch_mode(interval: Duration, threshold: u64) -> Result<()> {
    let sampler = VmstatSampler::new();
    let mut scanner = FaultScanner::new(ProcfsSource::new(), HashSet::new());

    let mut last = sampler.sample()?;
    scanner.scan()?;

    loop {
        std::thread::sleep(interval);

        let current = sampler.sample()?;
        let delta = current.saturating_sub(last);
        last = current;

        if delta > threshold {
            let blame = match scanner.scan()? {
                Some(c) => format!("PID {} ({}, +{})", c.pid, c.comm, c.delta),
                None => "no candidate".to_string(),
            };
            println!(
                "{} {:>6} major faults  {}",
                "🔥".red(),
                delta.to_string().red().bold(),
                blame
            );
        } else {
            // Keep per-process history current between spikes
            scanner.scan()?;
            let status = if delta == 0 {
                "quiet".green()
            } else {
                "below threshold".yellow()
            };
            println!("✅ {:>6} major faults  {}", delta, status);
        }
    }
}
