//! Resource walker: one of `accounts`, `containers`, `objects`.
//!
//! Setup (ring load, device resolution, partition listing) runs serially;
//! partitions then fan out onto their own tasks bounded by the resource
//! semaphore, each draining into the resource-level channel through a
//! lightweight forwarder.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use swiftscan_core::{Event, ResourceType};
use swiftscan_ring::{HashPathConfig, Ring, local_ips, resolve_device};

use crate::partition::Partition;
use crate::record::{IndexRecord, subdirectories};
use crate::scan::ScanOptions;
use crate::Result;

/// Everything a partition task needs, materialized once per resource and
/// shared by reference. The ring snapshot is read-only after load.
pub(crate) struct ResourceScan {
    pub device: String,
    pub resource_type: ResourceType,
    pub options: Arc<ScanOptions>,
    pub ring: Ring,
    pub dev_id: i64,
    pub ip: String,
    pub token: CancellationToken,
}

/// Send one event downstream unless shutdown fires first. Returns false
/// when the send was aborted; callers treat that as normal termination.
pub(crate) async fn send_event(
    tx: &mpsc::Sender<Event>,
    token: &CancellationToken,
    event: Event,
) -> bool {
    tokio::select! {
        // Shutdown wins over a ready send.
        biased;
        _ = token.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}

pub(crate) struct Resource {
    device: String,
    resource_type: ResourceType,
    record: IndexRecord,
}

impl Resource {
    pub(crate) fn new(device: &str, resource_type: ResourceType, record: IndexRecord) -> Self {
        Self {
            device: device.to_string(),
            resource_type,
            record,
        }
    }

    /// Walk every partition of this resource. Ring or cluster config
    /// failures abort the whole resource; the caller logs and moves on to
    /// siblings.
    pub(crate) async fn build_index(
        self,
        options: Arc<ScanOptions>,
        token: CancellationToken,
        out: mpsc::Sender<Event>,
    ) -> Result<()> {
        debug!(device = %self.device, resource = %self.resource_type, "build resource index");

        let ring = Ring::load(self.resource_type, &options.ring_dir)?;
        let hash_path = HashPathConfig::load(&options.swift_conf)?;
        debug!(
            resource = %self.resource_type,
            prefix_set = !hash_path.prefix.is_empty(),
            suffix_set = !hash_path.suffix.is_empty(),
            "cluster hash path config loaded"
        );

        let ips = local_ips();
        let (dev_id, ip) = resolve_device(&ring, &self.device, &ips).unwrap_or((-1, String::new()));
        if dev_id < 0 {
            warn!(
                device = %self.device,
                resource = %self.resource_type,
                "device not present in ring; peer and handoff annotations unreliable"
            );
        }

        let scan = Arc::new(ResourceScan {
            device: self.device,
            resource_type: self.resource_type,
            options: options.clone(),
            ring,
            dev_id,
            ip,
            token: token.clone(),
        });

        let partitions = subdirectories(&self.record.path).await;
        debug!(
            resource = %scan.resource_type,
            partitions = partitions.len(),
            "partition list loaded"
        );

        let semaphore = Arc::new(Semaphore::new(options.partition_concurrency));
        let mut walkers = JoinSet::new();
        let mut forwarders = JoinSet::new();

        for record in partitions {
            // Fan-in: the partition writes to its own channel; a forwarder
            // copies into the resource-level channel until the partition
            // drains or shutdown fires.
            let (part_tx, mut part_rx) = mpsc::channel::<Event>(1);
            let forward_out = out.clone();
            let forward_token = token.clone();
            forwarders.spawn(async move {
                while let Some(event) = part_rx.recv().await {
                    if !send_event(&forward_out, &forward_token, event).await {
                        return;
                    }
                }
            });

            let partition = Partition::new(record);
            walkers.spawn(partition.build_index(scan.clone(), semaphore.clone(), part_tx));
        }

        while walkers.join_next().await.is_some() {}
        while forwarders.join_next().await.is_some() {}
        Ok(())
    }
}
