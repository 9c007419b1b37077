//! Hard Disk Drive
//!
//! TigerStyle: Leaf drive with an age-bucketed hourly failure probability.
//!
//! The model uses the annualized failure rates (AFR) read off the age
//! buckets of Google's 2007 disk population study:
//!
//! | age bucket | AFR   |
//! |------------|-------|
//! | 3 months   | 0.030 |
//! | 6 months   | 0.018 |
//! | 1 year     | 0.017 |
//! | 2 years    | 0.080 |
//! | 3 years    | 0.086 |
//!
//! Each AFR is turned into a mean time between failures with
//! `MTBF = -8760 / ln(1 - AFR)`, and the MTBF into an hourly probability with
//! `1 - exp(-1 / MTBF)`. The 3-year rate applies to every later age.

use once_cell::sync::Lazy;

use super::{Drive, DriveStatus};
use crate::rng::RandomSource;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Hours in a (365-day) year
pub const HOURS_PER_YEAR: u64 = 8760;

/// Upper age bound (exclusive) of each bucket, in hours; the last bucket is open
pub const AGE_BUCKET_HOURS_LIMITS: [u64; 4] = [
    HOURS_PER_YEAR / 4,
    HOURS_PER_YEAR / 2,
    HOURS_PER_YEAR,
    HOURS_PER_YEAR * 2,
];

/// Annualized failure rate per age bucket
pub const AGE_BUCKET_AFRS: [f64; 5] = [0.030, 0.018, 0.017, 0.080, 0.086];

/// Hourly failure probability per age bucket, derived once
static HOURLY_FAILURE_RATES: Lazy<[f64; 5]> =
    Lazy::new(|| AGE_BUCKET_AFRS.map(annualized_failure_rate_to_hourly));

// =============================================================================
// Failure Model
// =============================================================================

/// Mean time between failures, in hours, for an annualized failure rate.
#[must_use]
pub fn annualized_failure_rate_to_mtbf(afr: f64) -> f64 {
    assert!((0.0..1.0).contains(&afr), "afr must be in [0, 1), got {}", afr);
    -(HOURS_PER_YEAR as f64) / (1.0 - afr).ln()
}

/// Probability of failing within one hour for a given MTBF.
#[must_use]
pub fn mtbf_to_hourly_failure_rate(mtbf: f64) -> f64 {
    1.0 - (-1.0 / mtbf).exp()
}

/// Hourly failure probability for an annualized failure rate.
#[must_use]
pub fn annualized_failure_rate_to_hourly(afr: f64) -> f64 {
    mtbf_to_hourly_failure_rate(annualized_failure_rate_to_mtbf(afr))
}

/// Hourly failure probability of a drive that is `age_hours` old.
#[must_use]
pub fn hourly_failure_rate_for_age(age_hours: u64) -> f64 {
    let bucket = AGE_BUCKET_HOURS_LIMITS
        .iter()
        .position(|&limit| age_hours < limit)
        .unwrap_or(AGE_BUCKET_HOURS_LIMITS.len());
    HOURLY_FAILURE_RATES[bucket]
}

// =============================================================================
// HardDiskDrive
// =============================================================================

/// A traditional spinning-media disk.
pub struct HardDiskDrive {
    /// Age in hours; frozen once failed
    age_hours: u64,
    status: DriveStatus,
    capacity_bytes: u64,
    throughput: u64,
    rng: Box<dyn RandomSource>,
}

impl HardDiskDrive {
    /// Create a new, healthy disk at age zero.
    #[must_use]
    pub fn new(capacity_bytes: u64, throughput: u64, rng: Box<dyn RandomSource>) -> Self {
        Self {
            age_hours: 0,
            status: DriveStatus::Ok,
            capacity_bytes,
            throughput,
            rng,
        }
    }

    /// Age in simulated hours.
    #[must_use]
    pub fn age_hours(&self) -> u64 {
        self.age_hours
    }
}

impl Drive for HardDiskDrive {
    fn step(&mut self) {
        if self.status.is_failed() {
            return;
        }

        let age_before = self.age_hours;
        self.age_hours += 1;
        if self.rng.next_float() < hourly_failure_rate_for_age(self.age_hours) {
            self.status = DriveStatus::Failed;
        }

        // Postcondition
        assert!(self.age_hours > age_before, "age must not go backwards");
    }

    fn status(&self) -> DriveStatus {
        self.status
    }

    fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    fn throughput(&self) -> u64 {
        self.throughput
    }
}

impl std::fmt::Debug for HardDiskDrive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HardDiskDrive")
            .field("age_hours", &self.age_hours)
            .field("status", &self.status)
            .field("capacity_bytes", &self.capacity_bytes)
            .field("throughput", &self.throughput)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
