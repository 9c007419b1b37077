//! Statistics
//!
//! TigerStyle: Summaries over time-to-failure samples.
//!
//! All figures are permutation-invariant: samples are sorted before the
//! survival sweep, so the order trials complete in never matters.
//!
//! Trials cut off by an hour budget are right-censored: they count as alive
//! for every year boundary at or below the budget, and survival past the
//! budget is unknown. Their hours enter the mean at the budget, which makes
//! the mean a lower bound.

use serde::Serialize;

use crate::drive::hard_disk::HOURS_PER_YEAR;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Number of yearly survival rates reported
pub const SURVIVAL_YEARS_COUNT: u32 = 10;

// =============================================================================
// Types
// =============================================================================

/// Fraction of trials still alive at a year boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearSurvival {
    /// Year number, starting at 1
    pub year: u32,
    /// Fraction of trials alive at year * 8760 hours; `None` past the hour budget
    pub rate: Option<f64>,
}

/// Summary of a batch of trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// Number of trials, failed and censored
    pub trials: usize,
    /// Trials still alive when the hour budget ran out
    pub censored: usize,
    /// Hour budget the censored trials were cut off at
    pub hours_max: Option<u64>,
    /// Arithmetic mean, in hours; a lower bound when `censored > 0`
    pub mean_hours: f64,
    /// Population standard deviation, in hours
    pub stddev_hours: f64,
    /// Shortest trial
    pub min_hours: u64,
    /// Longest trial
    pub max_hours: u64,
    /// Survival rate for years 1 through 10
    pub survival: Vec<YearSurvival>,
}

// =============================================================================
// Summaries
// =============================================================================

/// Summarize time-to-failure samples where every trial failed.
///
/// # Errors
/// Returns `StatsError::NoSamples` if `samples` is empty.
pub fn summarize(samples: &[u64]) -> Result<Statistics, StatsError> {
    summarize_censored(samples, 0, None)
}

/// Summarize failed trials plus `censored` trials cut off at `hours_max`.
///
/// # Errors
/// Returns `StatsError::NoSamples` if there are no trials at all, or
/// `StatsError::MissingBudget` if trials were censored without a budget.
pub fn summarize_censored(
    samples: &[u64],
    censored: usize,
    hours_max: Option<u64>,
) -> Result<Statistics, StatsError> {
    let trials = samples.len() + censored;
    if trials == 0 {
        return Err(StatsError::NoSamples);
    }
    let horizon = match (censored, hours_max) {
        (0, _) => None,
        (_, Some(hours_max)) => Some(hours_max),
        (_, None) => return Err(StatsError::MissingBudget { censored }),
    };

    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let n = trials as f64;

    // Censored trials enter the moments at the budget.
    let censored_hours = horizon.unwrap_or(0) as f64;
    let censored_count = censored as f64;
    let mean = (sorted.iter().map(|&s| s as f64).sum::<f64>()
        + censored_hours * censored_count)
        / n;
    let variance = (sorted
        .iter()
        .map(|&s| (s as f64 - mean).powi(2))
        .sum::<f64>()
        + (censored_hours - mean).powi(2) * censored_count)
        / n;

    let mut below = 0;
    let survival = (1..=SURVIVAL_YEARS_COUNT)
        .map(|year| {
            let threshold = u64::from(year) * HOURS_PER_YEAR;
            let rate = if horizon.is_some_and(|h| threshold > h) {
                None
            } else {
                while below < sorted.len() && sorted[below] < threshold {
                    below += 1;
                }
                Some((sorted.len() - below + censored) as f64 / n)
            };
            YearSurvival { year, rate }
        })
        .collect();

    let min_hours = match (sorted.first(), horizon) {
        (Some(&first), Some(h)) => first.min(h),
        (Some(&first), None) => first,
        (None, h) => h.unwrap_or(0),
    };
    let max_hours = match (sorted.last(), horizon) {
        (Some(&last), Some(h)) => last.max(h),
        (Some(&last), None) => last,
        (None, h) => h.unwrap_or(0),
    };

    // Postcondition
    assert!(min_hours <= max_hours, "min must not exceed max");

    Ok(Statistics {
        trials,
        censored,
        hours_max: horizon,
        mean_hours: mean,
        stddev_hours: variance.sqrt(),
        min_hours,
        max_hours,
        survival,
    })
}

impl Statistics {
    /// Survival rate for `year`, if reported and known.
    #[must_use]
    pub fn survival_rate(&self, year: u32) -> Option<f64> {
        self.survival
            .iter()
            .find(|s| s.year == year)
            .and_then(|s| s.rate)
    }

    /// Whether the mean only bounds the true mean from below.
    #[must_use]
    pub fn mean_is_lower_bound(&self) -> bool {
        self.censored > 0
    }
}

impl std::fmt::Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Results of {} iterations:", self.trials)?;
        if let Some(hours_max) = self.hours_max {
            writeln!(
                f,
                "  censored: {} trials alive at {} hours",
                self.censored, hours_max
            )?;
            writeln!(f, "  mean: >= {:.6}", self.mean_hours)?;
        } else {
            writeln!(f, "  mean: {:.6}", self.mean_hours)?;
        }
        writeln!(f, "  stddev: {:.6}", self.stddev_hours)?;
        for s in &self.survival {
            match s.rate {
                Some(rate) => writeln!(f, "  {} year survival rate: {:.6}", s.year, rate)?,
                None => writeln!(f, "  {} year survival rate: unknown", s.year)?,
            }
        }
        Ok(())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Statistics errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatsError {
    #[error("no time-to-failure samples to summarize")]
    NoSamples,

    #[error("{censored} trials were censored without an hour budget")]
    MissingBudget { censored: usize },
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_year_samples() {
        let stats = summarize(&[8760, 8760, 17520, 17520]).unwrap();

        assert_eq!(stats.trials, 4);
        assert_eq!(stats.censored, 0);
        assert_eq!(stats.mean_hours, 13140.0);
        assert_eq!(stats.stddev_hours, 4380.0);
        // A sample equal to the threshold survives that year.
        assert_eq!(stats.survival_rate(1), Some(1.0));
        assert_eq!(stats.survival_rate(2), Some(0.5));
        assert_eq!(stats.survival_rate(3), Some(0.0));
        assert_eq!(stats.survival_rate(10), Some(0.0));
        assert_eq!(stats.survival_rate(11), None);
        assert!(!stats.mean_is_lower_bound());
    }

    #[test]
    fn test_survival_is_monotonic() {
        let samples: Vec<u64> = (0..500).map(|i| i * 211 + 17).collect();
        let stats = summarize(&samples).unwrap();

        assert_eq!(stats.survival.len(), SURVIVAL_YEARS_COUNT as usize);
        for pair in stats.survival.windows(2) {
            assert!(pair[0].rate >= pair[1].rate);
        }
    }

    #[test]
    fn test_order_does_not_matter() {
        let forward = [1u64, 9000, 20000, 40000, 3, 88000];
        let mut backward = forward;
        backward.reverse();

        assert_eq!(summarize(&forward), summarize(&backward));
    }

    #[test]
    fn test_population_stddev() {
        let stats = summarize(&[2, 4, 4, 4, 5, 5, 7, 9]).unwrap();
        assert_eq!(stats.mean_hours, 5.0);
        assert_eq!(stats.stddev_hours, 2.0);
        assert_eq!(stats.min_hours, 2);
        assert_eq!(stats.max_hours, 9);
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(summarize(&[]), Err(StatsError::NoSamples));
        assert_eq!(
            summarize_censored(&[], 0, Some(100)),
            Err(StatsError::NoSamples)
        );
    }

    #[test]
    fn test_censored_trials_survive_within_budget() {
        // One failure in year 1, one in year 2, two still alive at two years.
        let stats = summarize_censored(&[4000, 10000], 2, Some(17520)).unwrap();

        assert_eq!(stats.trials, 4);
        assert_eq!(stats.censored, 2);
        assert_eq!(stats.hours_max, Some(17520));
        assert_eq!(stats.survival_rate(1), Some(0.75));
        assert_eq!(stats.survival_rate(2), Some(0.5));
        assert_eq!(stats.survival[2].rate, None);
        assert_eq!(stats.survival_rate(10), None);
        assert_eq!(stats.min_hours, 4000);
        assert_eq!(stats.max_hours, 17520);
        assert_eq!(stats.mean_hours, (4000.0 + 10000.0 + 2.0 * 17520.0) / 4.0);
        assert!(stats.mean_is_lower_bound());
    }

    #[test]
    fn test_every_trial_censored() {
        let stats = summarize_censored(&[], 3, Some(100)).unwrap();

        assert_eq!(stats.trials, 3);
        assert_eq!(stats.mean_hours, 100.0);
        assert_eq!(stats.stddev_hours, 0.0);
        assert_eq!(stats.min_hours, 100);
        assert!(stats.survival.iter().all(|s| s.rate.is_none()));
    }

    #[test]
    fn test_censored_without_budget() {
        assert_eq!(
            summarize_censored(&[10], 1, None),
            Err(StatsError::MissingBudget { censored: 1 })
        );
    }

    #[test]
    fn test_unused_budget_is_ignored() {
        assert_eq!(
            summarize_censored(&[8760, 20000], 0, Some(30000)),
            summarize(&[8760, 20000])
        );
    }

    #[test]
    fn test_display() {
        let text = summarize(&[8760]).unwrap().to_string();
        assert!(text.starts_with("Results of 1 iterations:"));
        assert!(text.contains("  mean: 8760.000000"));
        assert!(text.contains("  1 year survival rate: 1.000000"));
        assert!(text.contains("  2 year survival rate: 0.000000"));
    }

    #[test]
    fn test_display_censored() {
        let text = summarize_censored(&[100], 1, Some(8760)).unwrap().to_string();
        assert!(text.contains("  censored: 1 trials alive at 8760 hours"));
        assert!(text.contains("  mean: >= "));
        assert!(text.contains("  1 year survival rate: 0.500000"));
        assert!(text.contains("  2 year survival rate: unknown"));
    }
}
