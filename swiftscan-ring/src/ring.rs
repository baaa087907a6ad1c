//! In-memory ring snapshot and placement queries.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use swiftscan_core::ResourceType;

use crate::format::{RingDevice, RingFile};
use crate::{Result, RingError};

/// A loaded ring for one resource type. Read-only after load; shared by
/// reference across partition tasks.
#[derive(Debug, Clone)]
pub struct Ring {
    resource_type: ResourceType,
    file: RingFile,

    /// Mtime of the ring file at load time.
    pub ring_mtime: DateTime<Utc>,

    /// Hex MD5 of the (compressed) ring file bytes.
    pub ring_md5: String,
}

impl Ring {
    /// Load `<ring_dir>/<resource>.ring.gz`.
    pub fn load(resource_type: ResourceType, ring_dir: &Path) -> Result<Self> {
        let path = ring_dir.join(resource_type.ring_file_name());

        let metadata = std::fs::metadata(&path).map_err(|source| RingError::Load {
            path: path.clone(),
            source,
        })?;
        let ring_mtime = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_default();

        let bytes = std::fs::read(&path).map_err(|source| RingError::Load {
            path: path.clone(),
            source,
        })?;
        let ring_md5 = format!("{:x}", md5::compute(&bytes));
        let file = RingFile::parse(&path, &bytes)?;

        debug!(
            resource = %resource_type,
            partitions = file.partition_count(),
            replicas = file.replica_count(),
            checksum = %ring_md5,
            "ring loaded"
        );

        Ok(Self {
            resource_type,
            file,
            ring_mtime,
            ring_md5,
        })
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn partition_count(&self) -> usize {
        self.file.partition_count()
    }

    pub fn replica_count(&self) -> usize {
        self.file.replica_count()
    }

    /// Every device present in the ring, in id order.
    pub fn all_devices(&self) -> impl Iterator<Item = &RingDevice> {
        self.file.devs.iter().flatten()
    }

    /// The primary devices for a partition, in replica order. Empty for
    /// partition ids outside the ring.
    pub fn primaries_for(&self, part_id: i64) -> Vec<&RingDevice> {
        let Ok(part) = usize::try_from(part_id) else {
            return Vec::new();
        };
        if part >= self.partition_count() {
            return Vec::new();
        }

        self.file
            .assignments
            .iter()
            .filter_map(|table| table.get(part))
            .filter_map(|&dev_id| self.device(dev_id))
            .collect()
    }

    /// The other primaries for a partition, plus whether this device is a
    /// handoff (not among the primaries at all).
    pub fn job_nodes(&self, part_id: i64, self_dev_id: i64) -> (Vec<&RingDevice>, bool) {
        let primaries = self.primaries_for(part_id);
        let handoff = !primaries
            .iter()
            .any(|dev| i64::from(dev.id) == self_dev_id);
        let peers = primaries
            .into_iter()
            .filter(|dev| i64::from(dev.id) != self_dev_id)
            .collect();
        (peers, handoff)
    }

    /// 0-based position of a device in the partition's primary list, `-1`
    /// when the device is not a primary.
    pub fn replica_index(&self, part_id: i64, dev_id: i64) -> i64 {
        self.primaries_for(part_id)
            .iter()
            .position(|dev| i64::from(dev.id) == dev_id)
            .map_or(-1, |idx| idx as i64)
    }

    fn device(&self, dev_id: u16) -> Option<&RingDevice> {
        self.file.devs.get(usize::from(dev_id))?.as_ref()
    }
}
