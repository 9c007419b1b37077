//! Storage Pool
//!
//! TigerStyle: Striping, mirroring and parity are one mechanism.
//!
//! A pool tolerates up to `redundancy` failed members:
//! - striped:  redundancy = 0
//! - mirrored: redundancy = members - 1
//! - parity:   redundancy chosen by the caller
//!
//! Status is derived from the failure count: `Ok` with no failures,
//! `Degraded` while failures <= redundancy, `Failed` beyond that. There is no
//! repair, so status only moves forward.

use super::{Drive, DriveStatus};

// =============================================================================
// StoragePool
// =============================================================================

/// A composite drive over exclusively owned members.
pub struct StoragePool {
    drives: Vec<Box<dyn Drive>>,
    redundancy: usize,
    failures: usize,
    status: DriveStatus,
}

impl StoragePool {
    fn new(drives: Vec<Box<dyn Drive>>, redundancy: usize) -> Result<Self, PoolError> {
        if redundancy >= drives.len() {
            return Err(PoolError::InvalidRedundancy {
                redundancy,
                members: drives.len(),
            });
        }

        let mut pool = Self {
            drives,
            redundancy,
            failures: 0,
            status: DriveStatus::Ok,
        };
        pool.failures = pool.drives.iter().filter(|d| d.status().is_failed()).count();
        pool.status = pool.status_for_failures();
        Ok(pool)
    }

    /// A pool that stripes data across its members.
    ///
    /// # Errors
    /// Returns `InvalidRedundancy` if `drives` is empty.
    pub fn striped(drives: Vec<Box<dyn Drive>>) -> Result<Self, PoolError> {
        Self::new(drives, 0)
    }

    /// A pool that mirrors data across its members.
    ///
    /// # Errors
    /// Returns `InvalidRedundancy` if `drives` is empty.
    pub fn mirrored(drives: Vec<Box<dyn Drive>>) -> Result<Self, PoolError> {
        match drives.len().checked_sub(1) {
            Some(redundancy) => Self::new(drives, redundancy),
            None => Err(PoolError::InvalidRedundancy {
                redundancy: 0,
                members: 0,
            }),
        }
    }

    /// A pool that stripes data with `redundancy` members' worth of parity.
    ///
    /// # Errors
    /// Returns `InvalidRedundancy` if `redundancy >= drives.len()`.
    pub fn parity(drives: Vec<Box<dyn Drive>>, redundancy: usize) -> Result<Self, PoolError> {
        Self::new(drives, redundancy)
    }

    /// Number of failed members tolerated.
    #[must_use]
    pub fn redundancy(&self) -> usize {
        self.redundancy
    }

    /// Number of failed members observed so far.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.failures
    }

    /// Members in construction order.
    #[must_use]
    pub fn drives(&self) -> &[Box<dyn Drive>] {
        &self.drives
    }

    fn data_members(&self) -> u64 {
        (self.drives.len() - self.redundancy) as u64
    }

    fn status_for_failures(&self) -> DriveStatus {
        if self.failures == 0 {
            DriveStatus::Ok
        } else if self.failures <= self.redundancy {
            DriveStatus::Degraded
        } else {
            DriveStatus::Failed
        }
    }
}

impl Drive for StoragePool {
    fn step(&mut self) {
        if self.status.is_failed() {
            return;
        }

        let status_before = self.status;
        for drive in self.drives.iter_mut() {
            if drive.status().is_failed() {
                continue;
            }
            drive.step();
            if drive.status().is_failed() {
                self.failures += 1;
            }
        }
        self.status = self.status_for_failures();

        // Postconditions
        assert!(self.failures <= self.drives.len(), "failures exceed members");
        assert!(self.status >= status_before, "pool status must not recover");
    }

    fn status(&self) -> DriveStatus {
        self.status
    }

    fn capacity_bytes(&self) -> u64 {
        if self.redundancy == 0 {
            return self
                .drives
                .iter()
                .fold(0, |total: u64, d| total.saturating_add(d.capacity_bytes()));
        }
        let smallest = self
            .drives
            .iter()
            .map(|d| d.capacity_bytes())
            .min()
            .unwrap_or(0);
        smallest.saturating_mul(self.data_members())
    }

    fn throughput(&self) -> u64 {
        self.drives
            .iter()
            .filter(|d| !d.status().is_failed())
            .map(|d| d.throughput())
            .min()
            .map_or(0, |slowest| slowest.saturating_mul(self.data_members()))
    }
}

impl std::fmt::Debug for StoragePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoragePool")
            .field("members", &self.drives.len())
            .field("redundancy", &self.redundancy)
            .field("failures", &self.failures)
            .field("status", &self.status)
            .finish()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Pool construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("redundancy {redundancy} must be less than member count {members}")]
    InvalidRedundancy { redundancy: usize, members: usize },
}

// =============================================================================
// Tests
// =============================================================================
