//! Parallel execution of independent simulation replications
//!
//! Each replication gets its own `Environment`, built and run on a rayon
//! worker thread. Environments share nothing, so results only depend on what
//! the builder does with the scenario id.
//!
//! # Example: 8 seeded replications
//!
//! ```rust
//! use des::Environment;
//! use des::parallel::{ParallelRunner, simple_progress_reporter};
//!
//! let results = ParallelRunner::new(8, |scenario_id| {
//!     // The scenario id doubles as the seed or parameter index.
//!     let mut env = Environment::new(scenario_id);
//!     env.timeout(scenario_id as f64)?;
//!     Ok(env)
//! })
//! .progress(simple_progress_reporter(4))
//! .num_threads(2)
//! .run();
//!
//! for (id, result) in results.iter().enumerate() {
//!     match result {
//!         Ok(state) => assert_eq!(*state, id),
//!         Err(e) => eprintln!("Scenario {} failed: {}", id, e),
//!     }
//! }
//! ```
//!
//! # Determinism
//!
//! Results are deterministic when:
//! 1. The builder derives everything random from `scenario_id`
//! 2. Processes draw from a seeded RNG held in the environment state
//! 3. No mutable state is shared across scenarios
//!
//! Running the same scenarios twice produces identical results regardless of
//! execution order or thread count.
//!
//! # Error Handling
//!
//! Engine errors end only their own scenario and come back as
//! `ScenarioError::Sim`. Panics are caught and returned as
//! `ScenarioError::Panicked`; other scenarios continue normally.

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::Time;
use crate::error::{Result, SimError};
use crate::scheduler::Environment;

/// Why a replication produced no state
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("scenario panicked: {0}")]
    Panicked(String),
}

/// Runs many environments in parallel and collects their final states
///
/// Generic over:
/// - `S`: environment state, returned once the run completes
/// - `F`: builder, `Fn(scenario_id) -> Result<Environment<S>>`
pub struct ParallelRunner<S, F>
where
    F: Fn(usize) -> Result<Environment<S>> + Send + Sync,
    S: Send,
{
    num_scenarios: usize,
    builder: F,
    num_threads: Option<usize>,
    horizon: Option<Time>,
    progress_callback: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
    _state: PhantomData<fn() -> S>,
}

impl<S, F> ParallelRunner<S, F>
where
    F: Fn(usize) -> Result<Environment<S>> + Send + Sync,
    S: Send,
{
    /// Create a new parallel runner
    ///
    /// * `num_scenarios` - Number of independent scenarios to run
    /// * `builder` - Closure that creates a fresh environment for a scenario id
    pub fn new(num_scenarios: usize, builder: F) -> Self {
        ParallelRunner {
            num_scenarios,
            builder,
            num_threads: None,
            horizon: None,
            progress_callback: None,
            _state: PhantomData,
        }
    }

    /// Set number of threads (defaults to rayon's global pool)
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Stop every scenario at `t` instead of running it dry
    pub fn horizon(mut self, t: Time) -> Self {
        self.horizon = Some(t);
        self
    }

    /// Set progress callback, called with `(completed, total)` after each
    /// scenario
    pub fn progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Execute all scenarios and return results in scenario id order
    pub fn run(self) -> Vec<std::result::Result<S, ScenarioError>> {
        let progress_counter = Arc::new(AtomicUsize::new(0));

        let pool = self.num_threads.and_then(|n| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| warn!(error = %e, "falling back to the global rayon pool"))
                .ok()
        });

        let execute = || {
            (0..self.num_scenarios)
                .into_par_iter()
                .map(|scenario_id| {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| -> Result<S> {
                        let mut env = (self.builder)(scenario_id)?;
                        match self.horizon {
                            Some(t) => env.run_until(t)?,
                            None => env.run()?,
                        };
                        Ok(env.into_state())
                    }));

                    let completed = progress_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(completed, self.num_scenarios);
                    }

                    match result {
                        Ok(outcome) => outcome.map_err(ScenarioError::Sim),
                        Err(panic) => Err(ScenarioError::Panicked(panic_message(panic))),
                    }
                })
                .collect()
        };

        if let Some(pool) = pool {
            pool.install(execute)
        } else {
            execute()
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run scenarios in parallel to completion
///
/// For thread count, horizon, or progress reporting use `ParallelRunner`.
pub fn run_parallel<S, F>(
    num_scenarios: usize,
    builder: F,
) -> Vec<std::result::Result<S, ScenarioError>>
where
    F: Fn(usize) -> Result<Environment<S>> + Send + Sync,
    S: Send,
{
    ParallelRunner::new(num_scenarios, builder).run()
}

/// Run scenarios in batches of at most `batch_size` to bound peak memory
pub fn run_batched<S, F>(
    num_scenarios: usize,
    batch_size: usize,
    builder: F,
) -> Vec<std::result::Result<S, ScenarioError>>
where
    F: Fn(usize) -> Result<Environment<S>> + Send + Sync,
    S: Send,
{
    let mut all_results = Vec::with_capacity(num_scenarios);

    for batch_start in (0..num_scenarios).step_by(batch_size.max(1)) {
        let batch_end = (batch_start + batch_size.max(1)).min(num_scenarios);
        let batch_results = run_parallel(batch_end - batch_start, |local_id| {
            builder(batch_start + local_id)
        });
        all_results.extend(batch_results);
    }

    all_results
}

/// Progress callback printing every `interval` completed scenarios
pub fn simple_progress_reporter(interval: usize) -> impl Fn(usize, usize) + Send + Sync {
    let interval = interval.max(1);
    move |completed, total| {
        if completed % interval == 0 || completed == total {
            println!("  Completed {}/{} scenarios", completed, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(scenario_id: usize) -> Result<Environment<usize>> {
        let mut env = Environment::new(scenario_id);
        env.timeout(scenario_id as f64)?;
        Ok(env)
    }

    #[test]
    fn test_parallel_basic() {
        let results = run_parallel(10, counter);

        assert_eq!(results.len(), 10);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap(), &i);
        }
    }

    #[test]
    fn test_parallel_determinism() {
        let run1 = run_parallel(20, counter);
        let run2 = run_parallel(20, counter);

        assert_eq!(run1, run2);
    }

    #[test]
    fn test_parallel_panic_isolation() {
        let results = run_parallel(10, |scenario_id| {
            if scenario_id == 5 {
                panic!("Test panic");
            }
            counter(scenario_id)
        });

        assert_eq!(results.len(), 10);
        assert_eq!(results[5], Err(ScenarioError::Panicked("Test panic".to_string())));
        for (i, result) in results.iter().enumerate() {
            if i != 5 {
                assert!(result.is_ok());
            }
        }
    }

    #[test]
    fn test_engine_error_is_reported() {
        let results = run_parallel(3, |scenario_id| {
            let mut env = Environment::new(scenario_id);
            if scenario_id == 1 {
                env.add_resource(0)?;
            }
            Ok(env)
        });

        assert_eq!(results[1], Err(ScenarioError::Sim(SimError::InvalidCapacity(0))));
        assert!(results[0].is_ok());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_parallel_progress_callback() {
        use std::sync::Mutex;
        let completed = Arc::new(Mutex::new(0));
        let completed_clone = completed.clone();

        ParallelRunner::new(5, counter)
            .progress(move |count, _total| {
                let mut seen = completed_clone.lock().unwrap();
                *seen = (*seen).max(count);
            })
            .run();

        assert_eq!(*completed.lock().unwrap(), 5);
    }

    #[test]
    fn test_parallel_custom_threads_and_horizon() {
        let results = ParallelRunner::new(8, |scenario_id| {
            let mut env = Environment::new(0.0);
            env.timeout(scenario_id as f64)?;
            Ok(env)
        })
        .num_threads(2)
        .horizon(100.0)
        .run();

        assert_eq!(results.len(), 8);
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn test_batched_execution() {
        let results = run_batched(50, 10, counter);

        assert_eq!(results.len(), 50);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap(), &i);
        }
    }

    #[test]
    fn test_simple_progress_reporter() {
        let reporter = simple_progress_reporter(10);
        reporter(10, 100);
        reporter(100, 100);
    }

    #[test]
    fn test_empty_scenarios() {
        let results = run_parallel(0, counter);
        assert_eq!(results.len(), 0);
    }
}
