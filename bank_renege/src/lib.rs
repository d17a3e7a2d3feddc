//! Bank counter with reneging customers.
//!
//! Customers arrive at a counter with limited capacity, wait with limited
//! patience, and are either served or give up. The scenario is a thin client
//! of the `des` engine: one `Source` process spawns `Customer` processes, all
//! drawing from one seeded RNG held in the environment state.

use des::parallel::{ParallelRunner, ScenarioError};
use des::{Environment, RunSummary, SimError};
use rand_distr::Exp;
use thiserror::Error;

pub mod config;
pub mod customer;
pub mod journal;
pub mod stats;

pub use config::{BankConfig, ConfigError};
pub use customer::{BankState, Customer, CustomerProfile, Source};
pub use journal::{Journal, Label, Record};
pub use stats::QueueStats;

#[derive(Debug, Error)]
pub enum BankError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("simulation aborted: {0}")]
    Sim(#[from] SimError),
}

/// A validated configuration with its distributions ready to sample
#[derive(Debug, Clone)]
pub struct Scenario {
    config: BankConfig,
    interval: Exp<f64>,
    profile: CustomerProfile,
}

impl Scenario {
    pub fn new(config: BankConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let interval = Exp::new(1.0 / config.interval)
            .map_err(|e| ConfigError::Invalid(format!("interval: {e}")))?;
        let service = Exp::new(1.0 / config.service_time)
            .map_err(|e| ConfigError::Invalid(format!("service_time: {e}")))?;
        let profile = CustomerProfile {
            min_patience: config.min_patience,
            max_patience: config.max_patience,
            service,
        };
        Ok(Scenario {
            config,
            interval,
            profile,
        })
    }

    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    /// Fresh environment with the counter and the source, seeded with `seed`
    pub fn environment(&self, seed: u64) -> des::Result<Environment<BankState>> {
        let mut env = Environment::new(BankState::new(seed));
        let counter = env.add_resource(self.config.capacity)?;
        env.spawn(Source::new(
            self.config.customers,
            counter,
            self.interval,
            self.profile,
        ));
        Ok(env)
    }
}

/// Outcome of one complete run
#[derive(Debug, Clone)]
pub struct Report {
    pub journal: Journal,
    pub stats: QueueStats,
    pub summary: RunSummary,
}

/// Run the configured scenario to completion
pub fn simulate(config: &BankConfig) -> Result<Report, BankError> {
    let scenario = Scenario::new(config.clone())?;
    let mut env = scenario.environment(config.seed)?;
    let summary = env.run()?;
    let journal = env.into_state().into_journal();
    let stats = QueueStats::from_journal(&journal);
    Ok(Report {
        journal,
        stats,
        summary,
    })
}

/// Results of independent runs seeded `seed`, `seed + 1`, ...
#[derive(Debug, Clone)]
pub struct Replications {
    pub runs: Vec<Result<QueueStats, ScenarioError>>,
}

impl Replications {
    /// Statistics of the successful runs pooled together
    pub fn pooled(&self) -> QueueStats {
        let mut pooled = QueueStats::default();
        for stats in self.runs.iter().flatten() {
            pooled.merge(stats);
        }
        pooled
    }

    pub fn failures(&self) -> usize {
        self.runs.iter().filter(|run| run.is_err()).count()
    }
}

/// Run `count` replications in parallel
pub fn replicate(
    config: &BankConfig,
    count: usize,
    threads: Option<usize>,
) -> Result<Replications, ConfigError> {
    let scenario = Scenario::new(config.clone())?;
    let base_seed = config.seed;
    let mut runner = ParallelRunner::new(count, |scenario_id| {
        scenario.environment(base_seed.wrapping_add(scenario_id as u64))
    });
    if let Some(n) = threads {
        runner = runner.num_threads(n);
    }
    let runs = runner
        .run()
        .into_iter()
        .map(|run| run.map(|state| QueueStats::from_journal(state.journal())))
        .collect();
    Ok(Replications { runs })
}
