//! simdrive - Storage Topology Reliability Estimator
//!
//! TigerStyle Monte Carlo simulation of how long a storage topology survives.
//!
//! A topology (single disks, striped, mirrored and parity pools, nested to
//! any depth) is described declaratively, resolved into a drive tree, and
//! stepped hour by hour until it fails. Many independent trials give a
//! time-to-failure distribution.
//!
//! ```text
//! JSON topology ──> Topology::build ──> Box<dyn Drive>
//!                                            │ step() until Failed
//!                                            ▼
//!                   TrialRunner (N trials) ──> TrialReport ──> Statistics
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use simdrive::{Topology, TrialConfig, TrialRunner};
//! use std::sync::Arc;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let topology = Arc::new(Topology::from_json(br#"{
//!     "root": {"kind": "mirrored_pool", "drives": ["sda", "sda"]},
//!     "sda": {"kind": "hard_disk", "size": "4TB"}
//! }"#)?);
//!
//! let runner = TrialRunner::new(TrialConfig::new(1000, 42));
//! let report = runner.run(move |rng| topology.build(rng)).await?;
//! println!("{}", report.statistics()?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod drive;
pub mod rng;
pub mod scale;
pub mod stats;
pub mod trial;

pub use config::{ConfigError, DriveKind, DriveNode, Topology};
pub use drive::{Drive, DriveStatus, HardDiskDrive, PoolError, StoragePool};
pub use rng::{DeterministicRng, RandomSource};
pub use scale::{parse_scaled_value, ScaleError};
pub use stats::{summarize, summarize_censored, Statistics, StatsError, YearSurvival};
pub use trial::{run_trial, TrialConfig, TrialError, TrialOutcome, TrialReport, TrialRunner};
