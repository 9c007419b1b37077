//! Trial Runner
//!
//! TigerStyle: Independent Monte Carlo trials with bounded parallelism.
//!
//! Each trial builds its own drive tree from a stream forked off the master
//! seed, steps it hour by hour until it fails, and reports the hour count.
//! Trials share nothing; the only synchronization is collecting every result
//! before the report is returned.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::task::JoinSet;

use crate::config::ConfigError;
use crate::drive::Drive;
use crate::rng::DeterministicRng;
use crate::stats::{summarize_censored, Statistics, StatsError};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Default number of trials per input
pub const TRIALS_COUNT_DEFAULT: usize = 1000;

/// Fallback parallelism when the host cannot report it
pub const TRIALS_CONCURRENCY_FALLBACK: usize = 4;

// =============================================================================
// Types
// =============================================================================

/// Configuration for one batch of trials.
///
/// TigerStyle:
/// - Seed logged for reproducibility
/// - All limits explicit
#[derive(Debug, Clone, Copy)]
pub struct TrialConfig {
    /// Number of trials to run
    trials: usize,
    /// Master seed; every trial forks its stream from it
    seed: u64,
    /// Maximum trials in flight
    concurrency: usize,
    /// Hours after which a surviving trial is cut off
    hours_max: Option<u64>,
}

impl TrialConfig {
    /// Create a config running `trials` trials from `seed`.
    ///
    /// # Panics
    /// Panics if `trials` is zero.
    #[must_use]
    pub fn new(trials: usize, seed: u64) -> Self {
        // Precondition
        assert!(trials > 0, "trials must be positive");

        Self {
            trials,
            seed,
            concurrency: default_concurrency(),
            hours_max: None,
        }
    }

    /// Limit the number of trials in flight.
    ///
    /// # Panics
    /// Panics if `concurrency` is zero.
    #[must_use]
    pub fn with_concurrency(self, concurrency: usize) -> Self {
        // Precondition
        assert!(concurrency > 0, "concurrency must be positive");

        Self {
            concurrency,
            ..self
        }
    }

    /// Cut off trials that have not failed after `hours_max` hours.
    ///
    /// # Panics
    /// Panics if `hours_max` is zero.
    #[must_use]
    pub fn with_hours_max(self, hours_max: u64) -> Self {
        // Precondition
        assert!(hours_max > 0, "hours_max must be positive");

        Self {
            hours_max: Some(hours_max),
            ..self
        }
    }

    /// Number of trials.
    #[must_use]
    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Master seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Maximum trials in flight.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Per-trial hour budget, if any.
    #[must_use]
    pub fn hours_max(&self) -> Option<u64> {
        self.hours_max
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(TRIALS_CONCURRENCY_FALLBACK)
}

/// How a single trial ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    /// The drive failed after this many hours
    Failed { hours: u64 },
    /// The drive was still alive when the hour budget ran out
    Survived { hours: u64 },
}

/// Results of a batch of trials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialReport {
    /// Hours to failure, in completion order
    pub samples: Vec<u64>,
    /// Trials cut off by the hour budget
    pub censored: usize,
    /// Hour budget the batch ran with
    pub hours_max: Option<u64>,
}

impl TrialReport {
    /// Total trials run.
    #[must_use]
    pub fn trials(&self) -> usize {
        self.samples.len() + self.censored
    }

    /// Summarize every trial, counting censored ones as alive up to the budget.
    ///
    /// # Errors
    /// Returns `StatsError::NoSamples` for an empty report.
    pub fn statistics(&self) -> Result<Statistics, StatsError> {
        summarize_censored(&self.samples, self.censored, self.hours_max)
    }
}

// =============================================================================
// Stepping
// =============================================================================

/// Step `drive` until it fails or `hours_max` hours pass.
pub fn run_trial(drive: &mut dyn Drive, hours_max: Option<u64>) -> TrialOutcome {
    let mut hours: u64 = 0;
    while !drive.status().is_failed() {
        if hours_max.is_some_and(|max| hours >= max) {
            return TrialOutcome::Survived { hours };
        }
        hours += 1;
        drive.step();
    }
    TrialOutcome::Failed { hours }
}

// =============================================================================
// Trial Runner
// =============================================================================

/// Runs batches of independent trials.
#[derive(Debug, Clone, Copy)]
pub struct TrialRunner {
    config: TrialConfig,
}

impl TrialRunner {
    /// Create a runner for the given config.
    #[must_use]
    pub fn new(config: TrialConfig) -> Self {
        Self { config }
    }

    /// Get the config.
    #[must_use]
    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// Run every trial, building each drive tree with `build`.
    ///
    /// `build` receives a stream owned by that trial alone. Trials run on the
    /// blocking pool with at most `concurrency` in flight.
    ///
    /// # Errors
    /// Returns the first build error or task failure. No further trials are
    /// launched, and trials already in flight are waited for and discarded.
    pub async fn run<F>(&self, build: F) -> Result<TrialReport, TrialError>
    where
        F: Fn(&mut DeterministicRng) -> Result<Box<dyn Drive>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        let trials = self.config.trials;
        let hours_max = self.config.hours_max;
        let build = Arc::new(build);
        let mut master = DeterministicRng::new(self.config.seed);
        let mut tasks = JoinSet::new();
        let mut report = TrialReport {
            samples: Vec::with_capacity(trials),
            censored: 0,
            hours_max,
        };

        tracing::debug!(
            trials,
            seed = self.config.seed,
            concurrency = self.config.concurrency,
            "Starting trials"
        );

        let mut launched = 0;
        while launched < trials || !tasks.is_empty() {
            while launched < trials && tasks.len() < self.config.concurrency {
                let mut rng = master.fork();
                let build = Arc::clone(&build);
                tasks.spawn_blocking(move || -> Result<TrialOutcome, ConfigError> {
                    let mut drive = build(&mut rng)?;
                    Ok(run_trial(drive.as_mut(), hours_max))
                });
                launched += 1;
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            let outcome = match joined.map_err(TrialError::from) {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => return Err(drain(&mut tasks, e.into()).await),
                Err(e) => return Err(drain(&mut tasks, e).await),
            };
            match outcome {
                TrialOutcome::Failed { hours } => {
                    tracing::trace!(hours, "Trial failed");
                    report.samples.push(hours);
                }
                TrialOutcome::Survived { hours } => {
                    tracing::trace!(hours, "Trial survived hour budget");
                    report.censored += 1;
                }
            }
        }

        // Postcondition
        assert_eq!(report.trials(), trials, "every trial must be reported");

        if report.censored > 0 {
            tracing::warn!(
                censored = report.censored,
                hours_max = ?hours_max,
                "Some trials did not fail within the hour budget"
            );
        }

        Ok(report)
    }
}

/// Wait out in-flight trials after `error`; blocking tasks cannot be cancelled.
async fn drain(
    tasks: &mut JoinSet<Result<TrialOutcome, ConfigError>>,
    error: TrialError,
) -> TrialError {
    tracing::debug!(in_flight = tasks.len(), error = %error, "Draining trials");
    while tasks.join_next().await.is_some() {}
    error
}

// =============================================================================
// Errors
// =============================================================================

/// Trial execution errors
#[derive(Debug, thiserror::Error)]
pub enum TrialError {
    #[error("failed to build drive: {0}")]
    Build(#[from] ConfigError),

    #[error("trial task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// =============================================================================
// Tests
// =============================================================================
