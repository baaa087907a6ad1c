//! Event types emitted by the disk indexer.
//!
//! One event is produced per object partition and per account/container
//! database, plus (optionally) one per object data file. Events flow from
//! the walkers through the prospector's duplicate filter into the spooler.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::placement::PlacementContext;

/// The three kinds of resources a Swift disk holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Account,
    Container,
    Object,
}

impl ResourceType {
    /// Recognize a top-level disk subdirectory (`accounts`, `containers`,
    /// `objects`). Anything else is not a resource directory.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "accounts" => Some(Self::Account),
            "containers" => Some(Self::Container),
            "objects" => Some(Self::Object),
            _ => None,
        }
    }

    /// Singular resource name as used in ring files and the state store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Container => "container",
            Self::Object => "object",
        }
    }

    /// The on-disk directory name for this resource.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Account => "accounts",
            Self::Container => "containers",
            Self::Object => "objects",
        }
    }

    /// Ring file name for this resource, e.g. `object.ring.gz`.
    pub fn ring_file_name(&self) -> String {
        format!("{}.ring.gz", self.as_str())
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One object data file, emitted when datafile indexing is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    #[serde(flatten)]
    pub placement: PlacementContext,

    pub path: String,
    pub mtime: DateTime<Utc>,
    pub size_bytes: i64,

    /// 32-hex-char hash directory holding this file.
    pub hash: String,
    pub hash_mtime: DateTime<Utc>,

    /// Three-hex-char suffix shard the hash lives under.
    pub suffix: String,
    pub suffix_mtime: DateTime<Utc>,

    /// Full metadata mapping decoded from the `user.swift.metadata` xattr.
    /// Empty when the attribute was missing or undecodable.
    pub metadata: BTreeMap<String, String>,

    // Known keys lifted out of the metadata mapping. `content_length` is
    // parsed to an integer when possible; the raw value always remains in
    // `metadata`.
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
    pub x_object_meta_mtime: Option<String>,
    pub x_timestamp: Option<String>,
    pub etag: Option<String>,

    pub last_indexed: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

/// Summary of one object partition after its subtree was counted.
///
/// The three counters are `-1` when the partition was deliberately skipped
/// (handoff-only indexing on a primary), which is distinct from an empty
/// partition where they are `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionInfo {
    #[serde(flatten)]
    pub placement: PlacementContext,

    pub num_datafiles: i64,
    pub num_tombstones: i64,
    pub bytes_total: i64,
    pub bytes_total_mb: i64,

    pub last_indexed: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

/// One container database row, read from `container_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    #[serde(flatten)]
    pub placement: PlacementContext,

    pub path: String,
    pub mtime: DateTime<Utc>,
    pub size_kb: i64,

    pub account: String,
    pub container: String,
    pub status: String,
    pub object_count: i64,
    pub bytes_used_mb: i64,
    pub policy_index: i64,

    pub last_indexed: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

/// One account database row, read from `account_stat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(flatten)]
    pub placement: PlacementContext,

    pub path: String,
    pub mtime: DateTime<Utc>,
    pub size_kb: i64,

    pub account: String,
    pub status: String,
    pub container_count: i64,
    pub object_count: i64,
    pub bytes_used_mb: i64,

    pub last_indexed: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "humantime_serde")]
    pub ttl: Option<Duration>,
}

/// Events emitted by the indexer, one of four shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// One object data file (datafile indexing enabled).
    Object(ObjectInfo),

    /// One object partition summary.
    ObjectPartition(PartitionInfo),

    /// One container database.
    Container(ContainerInfo),

    /// One account database.
    Account(AccountInfo),
}

impl Event {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Event::Object(_) | Event::ObjectPartition(_) => ResourceType::Object,
            Event::Container(_) => ResourceType::Container,
            Event::Account(_) => ResourceType::Account,
        }
    }

    fn placement(&self) -> &PlacementContext {
        match self {
            Event::Object(info) => &info.placement,
            Event::ObjectPartition(info) => &info.placement,
            Event::Container(info) => &info.placement,
            Event::Account(info) => &info.placement,
        }
    }

    pub fn last_indexed(&self) -> DateTime<Utc> {
        match self {
            Event::Object(info) => info.last_indexed,
            Event::ObjectPartition(info) => info.last_indexed,
            Event::Container(info) => info.last_indexed,
            Event::Account(info) => info.last_indexed,
        }
    }

    /// The partition descriptor the state store dedupes on.
    pub fn to_partition(&self) -> PartitionView {
        let placement = self.placement();
        PartitionView {
            device: placement.device.clone(),
            resource_type: placement.resource_type,
            part_id: placement.partition,
            part_name: placement.partition_name.clone(),
            mtime: placement.partition_mtime,
            last_indexed: self.last_indexed(),
            ring_mtime: placement.ring_mtime,
        }
    }

    /// Stamp a time-to-live so downstream consumers can schedule a re-check.
    pub fn set_ttl(&mut self, ttl: Duration) {
        match self {
            Event::Object(info) => info.ttl = Some(ttl),
            Event::ObjectPartition(info) => info.ttl = Some(ttl),
            Event::Container(info) => info.ttl = Some(ttl),
            Event::Account(info) => info.ttl = Some(ttl),
        }
    }
}

/// Flat view of the partition behind an event, keyed by
/// (device, resource type, partition id) in the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionView {
    pub device: String,
    pub resource_type: ResourceType,
    pub part_id: i64,
    pub part_name: String,
    pub mtime: DateTime<Utc>,
    pub last_indexed: DateTime<Utc>,
    pub ring_mtime: DateTime<Utc>,
}

impl PartitionView {
    /// Key this partition is tracked under in the state store. Parsable ids
    /// use the decimal form; unparsable directories keep their raw name so
    /// distinct directories stay distinct.
    pub fn state_key(&self) -> String {
        if self.part_id >= 0 {
            self.part_id.to_string()
        } else {
            self.part_name.clone()
        }
    }
}
