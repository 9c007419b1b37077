//! Drives
//!
//! TigerStyle: One capability, two implementers.
//!
//! ```text
//!            ┌──────────────┐
//!            │ Drive (trait)│
//!            └──────────────┘
//!              ↑          ↑
//!   ┌──────────┴───┐  ┌───┴──────────┐
//!   │HardDiskDrive │  │ StoragePool  │──owns──> Vec<Box<dyn Drive>>
//!   │   (leaf)     │  │ (composite)  │
//!   └──────────────┘  └──────────────┘
//! ```

pub mod hard_disk;
pub mod pool;

use serde::Serialize;

pub use hard_disk::HardDiskDrive;
pub use pool::{PoolError, StoragePool};

/// Health of a drive, ordered from healthy to terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriveStatus {
    /// Healthy
    Ok,
    /// Some members have failed, but within the redundancy budget
    Degraded,
    /// Data is lost; terminal
    Failed,
}

impl DriveStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for DriveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A simulated storage device.
pub trait Drive: Send {
    /// Advance simulated time by one hour.
    ///
    /// Once `status()` is `Failed` this must be a no-op.
    fn step(&mut self);

    /// Current status, without side effects.
    fn status(&self) -> DriveStatus;

    /// Usable capacity in bytes.
    fn capacity_bytes(&self) -> u64;

    /// Aggregate throughput in bytes per second.
    fn throughput(&self) -> u64;
}

impl std::fmt::Debug for dyn Drive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Drive")
            .field("status", &self.status())
            .field("capacity_bytes", &self.capacity_bytes())
            .field("throughput", &self.throughput())
            .finish()
    }
}
