//! Partition walker.
//!
//! One task per partition, gated by the owning resource's semaphore.
//! The partition materializes its placement context from the ring, scans
//! its suffixes serially, and finishes by emitting the per-resource
//! events: an object partition summary, or one event per collected
//! account/container database.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tracing::debug;

use swiftscan_core::{
    AccountInfo, ContainerInfo, Event, PartitionInfo, PlacementContext, ResourceType,
};

use crate::record::{FileRecord, IndexRecord};
use crate::resource::{ResourceScan, send_event};
use crate::{dbfile, suffix};

/// Counters accumulated across one object partition's hash dirs.
#[derive(Debug, Default)]
pub(crate) struct PartitionCounters {
    pub datafiles: i64,
    pub tombstones: i64,
    pub bytes_total: i64,
}

pub(crate) struct Partition {
    record: IndexRecord,
    part_id: i64,
}

impl Partition {
    pub(crate) fn new(record: IndexRecord) -> Self {
        // Unparsable directory names index as partition -1; the state
        // store falls back to the raw name to keep them distinct.
        let part_id = record.name.parse::<i64>().unwrap_or(-1);
        Self { record, part_id }
    }

    pub(crate) async fn build_index(
        self,
        scan: Arc<ResourceScan>,
        semaphore: Arc<Semaphore>,
        tx: mpsc::Sender<Event>,
    ) {
        // Scoped permit: released on every exit path below. Shutdown wins
        // over an available permit.
        let _permit = tokio::select! {
            biased;
            _ = scan.token.cancelled() => return,
            permit = semaphore.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return,
            },
        };

        debug!(
            device = %scan.device,
            resource = %scan.resource_type,
            partition = %self.record.name,
            "build partition index"
        );

        let placement = self.placement(&scan);

        if scan.resource_type == ResourceType::Object
            && scan.options.object_index_handoff_only
            && !placement.handoff
        {
            // Primaries are skipped wholesale; sentinel counters mark the
            // partition as skipped rather than empty.
            if scan.options.enable_object_partition_index {
                let event = Event::ObjectPartition(PartitionInfo {
                    placement,
                    num_datafiles: -1,
                    num_tombstones: -1,
                    bytes_total: -1,
                    bytes_total_mb: -1,
                    last_indexed: Utc::now(),
                    ttl: None,
                });
                send_event(&tx, &scan.token, event).await;
            }
            return;
        }

        let mut counters = PartitionCounters::default();
        let mut db_files: Vec<FileRecord> = Vec::new();

        for suffix_record in crate::record::subdirectories(&self.record.path).await {
            if scan.token.is_cancelled() {
                return;
            }
            suffix::build_index(
                &scan,
                &placement,
                suffix_record,
                &mut counters,
                &mut db_files,
                &tx,
            )
            .await;
        }

        let last_indexed = Utc::now();

        match scan.resource_type {
            ResourceType::Object => {
                if scan.options.enable_object_partition_index {
                    let event = Event::ObjectPartition(PartitionInfo {
                        placement,
                        num_datafiles: counters.datafiles,
                        num_tombstones: counters.tombstones,
                        bytes_total: counters.bytes_total,
                        bytes_total_mb: to_mb(counters.bytes_total),
                        last_indexed,
                        ttl: None,
                    });
                    send_event(&tx, &scan.token, event).await;
                }
            }
            ResourceType::Container | ResourceType::Account => {
                // Databases index oldest first.
                db_files.sort_by(|a, b| a.record.mtime.cmp(&b.record.mtime));
                for file in db_files {
                    let event = db_event(&scan, placement.clone(), file).await;
                    if !send_event(&tx, &scan.token, event).await {
                        return;
                    }
                }
            }
        }
    }

    fn placement(&self, scan: &ResourceScan) -> PlacementContext {
        let (peers, handoff) = scan.ring.job_nodes(self.part_id, scan.dev_id);
        let replica_id = if handoff {
            -1
        } else {
            scan.ring.replica_index(self.part_id, scan.dev_id)
        };

        PlacementContext {
            device: scan.device.clone(),
            ip: scan.ip.clone(),
            resource_type: scan.resource_type,
            partition: self.part_id,
            partition_name: self.record.name.clone(),
            partition_mtime: self.record.mtime,
            ring_mtime: scan.ring.ring_mtime,
            handoff,
            replica_id,
            peer_devices: peers.iter().map(|d| d.device.clone()).collect(),
            peer_ips: peers.iter().map(|d| d.ip.clone()).collect(),
        }
    }
}

async fn db_event(scan: &ResourceScan, placement: PlacementContext, file: FileRecord) -> Event {
    let path = file.record.path.display().to_string();
    let mtime = file.record.mtime;
    let size_kb = file.size / 1024;

    match scan.resource_type {
        ResourceType::Account => {
            let record = dbfile::index_account(file.record.path).await;
            Event::Account(AccountInfo {
                placement,
                path,
                mtime,
                size_kb,
                account: record.account,
                status: record.status,
                container_count: record.container_count,
                object_count: record.object_count,
                bytes_used_mb: to_mb(record.bytes_used),
                last_indexed: Utc::now(),
                ttl: None,
            })
        }
        _ => {
            let record = dbfile::index_container(file.record.path).await;
            Event::Container(ContainerInfo {
                placement,
                path,
                mtime,
                size_kb,
                account: record.account,
                container: record.container,
                status: record.status,
                object_count: record.object_count,
                bytes_used_mb: to_mb(record.bytes_used),
                policy_index: record.policy_index,
                last_indexed: Utc::now(),
                ttl: None,
            })
        }
    }
}

/// MB scaling that preserves the `-1` skip sentinel.
pub(crate) fn to_mb(bytes: i64) -> i64 {
    if bytes < 0 { -1 } else { bytes / 1024 / 1024 }
}
