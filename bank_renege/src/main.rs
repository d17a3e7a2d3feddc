use std::path::PathBuf;

use anyhow::Context;
use bank_renege::{BankConfig, QueueStats, replicate, simulate};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Bank counter simulation with impatient customers
#[derive(Parser, Debug)]
#[command(name = "bank_renege", version)]
struct Cli {
    /// TOML file with scenario parameters; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    customers: Option<usize>,

    /// Mean time between arrivals
    #[arg(long)]
    interval: Option<f64>,

    /// Clerks at the counter
    #[arg(long)]
    capacity: Option<usize>,

    /// Mean service time
    #[arg(long)]
    service_time: Option<f64>,

    #[arg(long)]
    min_patience: Option<f64>,

    #[arg(long)]
    max_patience: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Run this many seeded replications in parallel and print pooled stats
    #[arg(long)]
    replications: Option<usize>,

    /// Worker threads for replications
    #[arg(long)]
    threads: Option<usize>,
}

impl Cli {
    fn bank_config(&self) -> anyhow::Result<BankConfig> {
        let mut config = match &self.config {
            Some(path) => BankConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => BankConfig::default(),
        };
        if let Some(customers) = self.customers {
            config.customers = customers;
        }
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(service_time) = self.service_time {
            config.service_time = service_time;
        }
        if let Some(min_patience) = self.min_patience {
            config.min_patience = min_patience;
        }
        if let Some(max_patience) = self.max_patience {
            config.max_patience = max_patience;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate()?;
        Ok(config)
    }
}

fn print_stats(stats: &QueueStats) {
    println!(
        "{:<12} {:>8} {:>8} {:>10} {:>12}",
        "Arrivals", "Served", "Reneged", "Mean wait", "Served frac"
    );
    println!("{:-<12} {:->8} {:->8} {:->10} {:->12}", "", "", "", "", "");
    println!(
        "{:<12} {:>8} {:>8} {:>10} {:>12}",
        stats.arrivals,
        stats.served,
        stats.reneged,
        stats
            .mean_wait()
            .map_or("-".to_string(), |w| format!("{:.3}", w)),
        stats
            .served_fraction()
            .map_or("-".to_string(), |f| format!("{:.3}", f)),
    );
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.bank_config()?;

    println!("*** Bank Renege ***");

    match cli.replications {
        Some(count) => {
            let replications = replicate(&config, count, cli.threads)?;
            for (i, run) in replications.runs.iter().enumerate() {
                if let Err(e) = run {
                    eprintln!("Replication {} (seed {}) failed: {}", i, config.seed.wrapping_add(i as u64), e);
                }
            }
            println!(
                "\n{} replications, seeds {}..{}, {} failed\n",
                count,
                config.seed,
                config.seed.wrapping_add(count as u64),
                replications.failures()
            );
            print_stats(&replications.pooled());
        }
        None => {
            let report = simulate(&config)?;
            for line in report.journal.lines() {
                println!("{}", line);
            }
            println!();
            print_stats(&report.stats);
        }
    }

    Ok(())
}
