//! Topology Configuration
//!
//! TigerStyle: Declarative drive graph resolved into an owned drive tree.
//!
//! A topology is a JSON object mapping drive names to nodes:
//!
//! ```json
//! {
//!   "root": {"kind": "mirrored_pool", "drives": ["sda", "sda"]},
//!   "sda":  {"kind": "hard_disk", "size": "1TB", "throughput": "150MB"}
//! }
//! ```
//!
//! Resolution:
//! 1. The root is the only node never listed as a child.
//! 2. Children are resolved depth-first before their parent is built. Every
//!    reference builds a fresh instance, so `["sda", "sda"]` is two disks.
//! 3. A node met again while still on the resolution path is a cycle.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use serde::Deserialize;

use crate::drive::{Drive, HardDiskDrive, PoolError, StoragePool};
use crate::rng::DeterministicRng;
use crate::scale::{parse_optional_bytes, ScaleError};

// =============================================================================
// Types
// =============================================================================

/// Known drive kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveKind {
    /// A single spinning disk
    HardDisk,
    /// Redundancy 0 over all members
    StripedPool,
    /// Redundancy members - 1
    MirroredPool,
    /// Redundancy given by the node
    ParityPool,
}

impl DriveKind {
    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HardDisk => "hard_disk",
            Self::StripedPool => "striped_pool",
            Self::MirroredPool => "mirrored_pool",
            Self::ParityPool => "parity_pool",
        }
    }

    /// Parse from the config string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "hard_disk" => Some(Self::HardDisk),
            "striped_pool" => Some(Self::StripedPool),
            "mirrored_pool" => Some(Self::MirroredPool),
            "parity_pool" => Some(Self::ParityPool),
            _ => None,
        }
    }
}

impl std::fmt::Display for DriveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One named node of the topology graph.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveNode {
    /// Kind string, kept raw so unknown kinds can be reported verbatim
    pub kind: String,
    /// Child drive names, in order
    #[serde(default)]
    pub drives: Vec<String>,
    /// Hard disk capacity, e.g. "1TB"
    pub size: Option<String>,
    /// Hard disk throughput in bytes per second, e.g. "150MB"
    pub throughput: Option<String>,
    /// Parity pool redundancy
    pub redundancy: Option<usize>,
}

// =============================================================================
// Topology
// =============================================================================

/// A parsed, not yet resolved, drive graph.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Topology {
    nodes: BTreeMap<String, DriveNode>,
}

impl Topology {
    /// Create a topology from named nodes.
    #[must_use]
    pub fn new(nodes: BTreeMap<String, DriveNode>) -> Self {
        Self { nodes }
    }

    /// Parse a topology from JSON.
    ///
    /// # Errors
    /// Returns `ConfigError::Json` if the input is not a valid topology object.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let topology: Self = serde_json::from_slice(bytes)?;
        tracing::debug!(nodes = topology.nodes.len(), "Parsed topology");
        Ok(topology)
    }

    /// Read and parse a topology file.
    ///
    /// # Errors
    /// Returns `ConfigError::Io` or `ConfigError::Json`.
    pub async fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_json(&bytes)
    }

    /// Number of named nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find the unique node that no other node lists as a child.
    ///
    /// # Errors
    /// Returns `NoRootDrive` or `MultipleRootDrives`.
    pub fn root_name(&self) -> Result<&str, ConfigError> {
        let referenced: HashSet<&str> = self
            .nodes
            .values()
            .flat_map(|node| node.drives.iter().map(String::as_str))
            .collect();

        let candidates: Vec<&str> = self
            .nodes
            .keys()
            .map(String::as_str)
            .filter(|name| !referenced.contains(name))
            .collect();

        match candidates.as_slice() {
            [] => Err(ConfigError::NoRootDrive),
            [root] => Ok(*root),
            _ => Err(ConfigError::MultipleRootDrives {
                names: candidates.iter().map(|s| (*s).to_string()).collect(),
            }),
        }
    }

    /// Resolve the graph into a fresh drive tree.
    ///
    /// Every hard disk receives its own stream forked from `rng`.
    ///
    /// # Errors
    /// Returns the first structural or parameter error found; no partial tree
    /// is produced.
    pub fn build(&self, rng: &mut DeterministicRng) -> Result<Box<dyn Drive>, ConfigError> {
        let root = self.root_name()?;
        let mut resolver = Resolver {
            nodes: &self.nodes,
            on_path: BTreeSet::new(),
            rng,
        };
        resolver.resolve(root)
    }
}

// =============================================================================
// Resolver
// =============================================================================

struct Resolver<'a> {
    nodes: &'a BTreeMap<String, DriveNode>,
    /// Nodes on the current resolution path
    on_path: BTreeSet<&'a str>,
    rng: &'a mut DeterministicRng,
}

impl<'a> Resolver<'a> {
    fn resolve(&mut self, name: &'a str) -> Result<Box<dyn Drive>, ConfigError> {
        let nodes = self.nodes;
        let node = nodes
            .get(name)
            .ok_or_else(|| ConfigError::UnknownDrive {
                name: name.to_string(),
            })?;

        if !self.on_path.insert(name) {
            return Err(ConfigError::CycleDetected {
                name: name.to_string(),
            });
        }
        let result = self.resolve_node(name, node);
        self.on_path.remove(name);

        result
    }

    fn resolve_node(
        &mut self,
        name: &'a str,
        node: &'a DriveNode,
    ) -> Result<Box<dyn Drive>, ConfigError> {
        // Children first: a bad reference below is reported before a bad kind here.
        let mut drives = Vec::with_capacity(node.drives.len());
        for child in &node.drives {
            drives.push(self.resolve(child)?);
        }
        let members = drives.len();

        let kind = DriveKind::parse(&node.kind).ok_or_else(|| ConfigError::InvalidKind {
            name: name.to_string(),
            kind: node.kind.clone(),
        })?;

        if kind == DriveKind::HardDisk {
            if members > 0 {
                return Err(ConfigError::LeafWithChildren {
                    name: name.to_string(),
                });
            }
            return self.build_hard_disk(name, node);
        }

        let pool = match kind {
            DriveKind::StripedPool => StoragePool::striped(drives),
            DriveKind::MirroredPool => StoragePool::mirrored(drives),
            DriveKind::ParityPool => {
                let redundancy = node.redundancy.ok_or_else(|| ConfigError::InvalidRedundancy {
                    name: name.to_string(),
                    redundancy: None,
                    members,
                })?;
                StoragePool::parity(drives, redundancy)
            }
            DriveKind::HardDisk => unreachable!("hard disks are built above"),
        }
        .map_err(|e| match e {
            PoolError::InvalidRedundancy {
                redundancy,
                members,
            } => ConfigError::InvalidRedundancy {
                name: name.to_string(),
                redundancy: Some(redundancy),
                members,
            },
        })?;

        tracing::trace!(drive = name, kind = %kind, members, "Built pool");
        Ok(Box::new(pool))
    }

    fn build_hard_disk(
        &mut self,
        name: &str,
        node: &DriveNode,
    ) -> Result<Box<dyn Drive>, ConfigError> {
        let scale_error = |field: &'static str| {
            move |source: ScaleError| ConfigError::Scale {
                name: name.to_string(),
                field,
                source,
            }
        };
        let capacity_bytes =
            parse_optional_bytes(node.size.as_deref()).map_err(scale_error("size"))?;
        let throughput =
            parse_optional_bytes(node.throughput.as_deref()).map_err(scale_error("throughput"))?;

        tracing::trace!(drive = name, capacity_bytes, throughput, "Built hard disk");
        Ok(Box::new(HardDiskDrive::new(
            capacity_bytes,
            throughput,
            Box::new(self.rng.fork()),
        )))
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Topology resolution errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid topology JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no root drive found")]
    NoRootDrive,

    #[error("multiple root drives found: {}", names.join(", "))]
    MultipleRootDrives { names: Vec<String> },

    #[error("detected cycle in config at drive {name}")]
    CycleDetected { name: String },

    #[error("drive {name} is referenced but not defined")]
    UnknownDrive { name: String },

    #[error("invalid kind for drive {name}: {kind}")]
    InvalidKind { name: String, kind: String },

    #[error("invalid redundancy {redundancy:?} for drive {name} with {members} members")]
    InvalidRedundancy {
        name: String,
        redundancy: Option<usize>,
        members: usize,
    },

    #[error("hard disk {name} cannot have member drives")]
    LeafWithChildren { name: String },

    #[error("invalid {field} for drive {name}: {source}")]
    Scale {
        name: String,
        field: &'static str,
        source: ScaleError,
    },
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::DriveStatus;

    fn build(json: &str) -> Result<Box<dyn Drive>, ConfigError> {
        let topology = Topology::from_json(json.as_bytes())?;
        topology.build(&mut DeterministicRng::new(42))
    }

    #[test]
    fn test_empty_config_has_no_root() {
        assert!(matches!(build("{}"), Err(ConfigError::NoRootDrive)));
    }

    #[test]
    fn test_pure_cycle_has_no_root() {
        let json = r#"{"a": {"kind": "mirrored_pool", "drives": ["b", "b"]},
                       "b": {"kind": "mirrored_pool", "drives": ["a", "a"]}}"#;
        assert!(matches!(build(json), Err(ConfigError::NoRootDrive)));
    }

    #[test]
    fn test_multiple_roots() {
        let json = r#"{"sda": {"kind": "hard_disk"}, "sdb": {"kind": "hard_disk"}}"#;
        match build(json) {
            Err(ConfigError::MultipleRootDrives { names }) => {
                assert_eq!(names, vec!["sda".to_string(), "sdb".to_string()]);
            }
            other => panic!("expected MultipleRootDrives, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_roots_with_pool() {
        let json = r#"{"root": {"kind": "mirrored_pool", "drives": ["one", "one"]},
                       "one": {"kind": "hard_disk"},
                       "sdb": {"kind": "hard_disk"}}"#;
        assert!(matches!(
            build(json),
            Err(ConfigError::MultipleRootDrives { .. })
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let json = r#"{"root": {"kind": "mirrored_pool", "drives": ["one", "one"]},
                       "one": {"kind": "mirrored_pool", "drives": ["two", "two"]},
                       "two": {"kind": "mirrored_pool", "drives": ["one", "one"]}}"#;
        match build(json) {
            Err(ConfigError::CycleDetected { name }) => assert_eq!(name, "one"),
            other => panic!("expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_detected() {
        let json = r#"{"root": {"kind": "striped_pool", "drives": ["loop"]},
                       "loop": {"kind": "striped_pool", "drives": ["loop"]}}"#;
        assert!(matches!(
            build(json),
            Err(ConfigError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_invalid_kind() {
        match build(r#"{"invalid": {"kind": "invalid"}}"#) {
            Err(ConfigError::InvalidKind { name, kind }) => {
                assert_eq!(name, "invalid");
                assert_eq!(kind, "invalid");
            }
            other => panic!("expected InvalidKind, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_child() {
        let json = r#"{"root": {"kind": "striped_pool", "drives": ["ghost"]}}"#;
        match build(json) {
            Err(ConfigError::UnknownDrive { name }) => assert_eq!(name, "ghost"),
            other => panic!("expected UnknownDrive, got {:?}", other),
        }
    }

    #[test]
    fn test_children_checked_before_kind() {
        let json = r#"{"root": {"kind": "bogus", "drives": ["ghost"]}}"#;
        match build(json) {
            Err(ConfigError::UnknownDrive { name }) => assert_eq!(name, "ghost"),
            other => panic!("expected UnknownDrive, got {:?}", other),
        }

        let json = r#"{"root": {"kind": "bogus", "drives": ["sda"]},
                       "sda": {"kind": "hard_disk", "size": "11ZB"}}"#;
        assert!(matches!(build(json), Err(ConfigError::Scale { .. })));
    }

    #[test]
    fn test_parity_requires_redundancy() {
        let json = r#"{"root": {"kind": "parity_pool", "drives": ["sda", "sda", "sda"]},
                       "sda": {"kind": "hard_disk"}}"#;
        match build(json) {
            Err(ConfigError::InvalidRedundancy {
                redundancy,
                members,
                ..
            }) => {
                assert_eq!(redundancy, None);
                assert_eq!(members, 3);
            }
            other => panic!("expected InvalidRedundancy, got {:?}", other),
        }
    }

    #[test]
    fn test_parity_redundancy_too_large() {
        let json = r#"{"root": {"kind": "parity_pool", "drives": ["sda", "sda"], "redundancy": 2},
                       "sda": {"kind": "hard_disk"}}"#;
        assert!(matches!(
            build(json),
            Err(ConfigError::InvalidRedundancy {
                redundancy: Some(2),
                members: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_pool_rejected() {
        let json = r#"{"root": {"kind": "striped_pool"}}"#;
        assert!(matches!(
            build(json),
            Err(ConfigError::InvalidRedundancy { .. })
        ));
    }

    #[test]
    fn test_leaf_with_children() {
        let json = r#"{"root": {"kind": "hard_disk", "drives": ["sda"]},
                       "sda": {"kind": "hard_disk"}}"#;
        assert!(matches!(
            build(json),
            Err(ConfigError::LeafWithChildren { .. })
        ));
    }

    #[test]
    fn test_bad_size() {
        let json = r#"{"root": {"kind": "hard_disk", "size": "11ZB"}}"#;
        match build(json) {
            Err(ConfigError::Scale { field, source, .. }) => {
                assert_eq!(field, "size");
                assert!(matches!(source, ScaleError::InvalidPrefix { .. }));
            }
            other => panic!("expected Scale, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{"root": {"kind": "hard_disk", "sise": "1TB"}}"#;
        assert!(matches!(build(json), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_mirrored_pool_of_repeated_child() {
        let json = r#"{"root": {"kind": "mirrored_pool", "drives": ["sda", "sda"]},
                       "sda": {"kind": "hard_disk", "size": "1KB"}}"#;
        let drive = build(json).unwrap();

        assert_eq!(drive.status(), DriveStatus::Ok);
        assert_eq!(drive.capacity_bytes(), 1_000);
    }

    #[test]
    fn test_parity_and_striped_pools() {
        let parity = r#"{"root": {"kind": "parity_pool", "drives": ["sda", "sda", "sda"], "redundancy": 1},
                         "sda": {"kind": "hard_disk", "size": "1KB", "throughput": "100MB"}}"#;
        let drive = build(parity).unwrap();
        assert_eq!(drive.capacity_bytes(), 2_000);
        assert_eq!(drive.throughput(), 200_000_000);

        let striped = r#"{"root": {"kind": "striped_pool", "drives": ["sda", "sda"]},
                          "sda": {"kind": "hard_disk", "size": "1KB"}}"#;
        assert_eq!(build(striped).unwrap().capacity_bytes(), 2_000);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let json = r#"{"root": {"kind": "striped_pool", "drives": ["left", "right"]},
                       "left": {"kind": "mirrored_pool", "drives": ["sda", "sda"]},
                       "right": {"kind": "mirrored_pool", "drives": ["sda", "sda"]},
                       "sda": {"kind": "hard_disk", "size": "1TB"}}"#;
        let drive = build(json).unwrap();
        assert_eq!(drive.capacity_bytes(), 2_000_000_000_000);
    }

    #[test]
    fn test_repeated_children_are_independent() {
        let json = r#"{"root": {"kind": "mirrored_pool", "drives": ["sda", "sda", "sda", "sda"]},
                       "sda": {"kind": "hard_disk"}}"#;
        let topology = Topology::from_json(json.as_bytes()).unwrap();
        let mut drive = topology.build(&mut DeterministicRng::new(7)).unwrap();

        let mut saw_degraded = false;
        for _ in 0..2_000_000 {
            drive.step();
            match drive.status() {
                DriveStatus::Degraded => saw_degraded = true,
                DriveStatus::Failed => break,
                DriveStatus::Ok => {}
            }
        }

        // Each reference owns its own stream, so members fail at different hours.
        assert!(saw_degraded);
    }

    #[test]
    fn test_root_name() {
        let json = r#"{"root": {"kind": "striped_pool", "drives": ["sda"]},
                       "sda": {"kind": "hard_disk"}}"#;
        let topology = Topology::from_json(json.as_bytes()).unwrap();
        assert_eq!(topology.root_name().unwrap(), "root");
        assert_eq!(topology.node_count(), 2);
    }
}
