//! swiftscan-ring: Swift ring files and replica placement
//!
//! Loads the `<resource>.ring.gz` file for a resource type and answers the
//! placement questions the indexer needs: which devices serve a partition,
//! and whether this node is a primary or a handoff for it. Also resolves
//! which ring device corresponds to this node by matching local interface
//! addresses, and reads the cluster hash path configuration.

pub mod conf;
pub mod format;
pub mod node;
pub mod ring;

#[cfg(test)]
pub(crate) mod testutil;

pub use conf::HashPathConfig;
pub use format::{RingDevice, RingFile};
pub use node::{local_ips, resolve_device};
pub use ring::Ring;

use std::path::PathBuf;

/// Errors from ring loading and cluster configuration.
///
/// All of these are fatal for the resource being walked; sibling resources
/// and other disks continue.
#[derive(Debug, thiserror::Error)]
pub enum RingError {
    #[error("cluster config {path} unreadable: {source}")]
    Config {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("ring file {path} unreadable: {source}")]
    Load {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("ring file {path} malformed: {detail}")]
    Format { path: PathBuf, detail: String },
}

/// Result type alias for ring operations.
pub type Result<T> = std::result::Result<T, RingError>;
