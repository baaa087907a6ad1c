//! Ring-derived placement facts shared by every event from one partition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::ResourceType;

/// Placement facts for one partition on this node.
///
/// Materialized once when a partition walker starts and copied into each
/// event it emits, so events never need a reference back into the walker
/// tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementContext {
    /// Swift device name (the directory under the device dir).
    pub device: String,

    /// Local IP this device was matched to in the ring, empty when the
    /// device is not present in the ring.
    pub ip: String,

    pub resource_type: ResourceType,

    /// Partition id parsed from the directory name, `-1` when unparsable.
    pub partition: i64,

    /// Raw partition directory name. Distinguishes unparsable partitions
    /// from each other in the state store.
    pub partition_name: String,

    /// Mtime of the partition directory.
    pub partition_mtime: DateTime<Utc>,

    /// Mtime of the ring file the placement was derived from.
    pub ring_mtime: DateTime<Utc>,

    /// True when this device is not a primary for the partition.
    pub handoff: bool,

    /// 0-based position in the ring's primary list, `-1` on handoffs.
    pub replica_id: i64,

    /// The other primaries for this partition, in ring order.
    pub peer_devices: Vec<String>,
    pub peer_ips: Vec<String>,
}

impl PlacementContext {
    /// Placement for a device that could not be resolved in the ring.
    ///
    /// The resource is still walked; peer and handoff annotations are not
    /// reliable and consumers must tolerate that.
    pub fn unresolved(
        device: impl Into<String>,
        resource_type: ResourceType,
        partition: i64,
        partition_name: impl Into<String>,
        partition_mtime: DateTime<Utc>,
        ring_mtime: DateTime<Utc>,
    ) -> Self {
        Self {
            device: device.into(),
            ip: String::new(),
            resource_type,
            partition,
            partition_name: partition_name.into(),
            partition_mtime,
            ring_mtime,
            handoff: false,
            replica_id: -1,
            peer_devices: Vec::new(),
            peer_ips: Vec::new(),
        }
    }
}
