//! swiftscan-indexer: the parallel disk crawler
//!
//! Walks the hierarchical Swift disk layout
//! (`device -> {accounts,containers,objects} -> partition -> suffix ->
//! hash -> file`), enriches each partition with ring-derived placement,
//! counts object files, extracts structured metadata from
//! account/container databases, and emits one [`swiftscan_core::Event`]
//! per partition or database onto a fan-in channel.
//!
//! # Concurrency
//!
//! One task per enabled resource performs setup (ring load, partition
//! listing) serially. Partitions of a resource run in parallel up to the
//! resource semaphore; suffixes and hashes within a partition run
//! serially. Every blocking point selects against a shared
//! [`CancellationToken`](tokio_util::sync::CancellationToken).

pub mod datafile;
pub mod dbfile;
pub mod disk;
pub mod hash;
pub mod partition;
pub mod record;
pub mod resource;
pub mod scan;
pub mod suffix;

#[cfg(test)]
pub(crate) mod testutil;

pub use disk::Disk;
pub use record::IndexRecord;
pub use scan::ScanOptions;

/// Errors that abort an entire resource walk. Anything less severe is
/// logged and absorbed so sibling walkers continue.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Ring(#[from] swiftscan_ring::RingError),
}

/// Result type alias for indexer operations.
pub type Result<T> = std::result::Result<T, IndexError>;
