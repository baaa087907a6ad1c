//! Suffix walker.
//!
//! Suffixes scan serially within their partition, keeping the work one
//! partition can put on the fan-in channel bounded and ordered.

use tokio::sync::mpsc;
use tracing::debug;

use swiftscan_core::{Event, PlacementContext};

use crate::hash;
use crate::partition::PartitionCounters;
use crate::record::{FileRecord, IndexRecord, subdirectories};
use crate::resource::ResourceScan;

pub(crate) async fn build_index(
    scan: &ResourceScan,
    placement: &PlacementContext,
    record: IndexRecord,
    counters: &mut PartitionCounters,
    db_files: &mut Vec<FileRecord>,
    tx: &mpsc::Sender<Event>,
) {
    debug!(path = %record.path.display(), "build suffix index");

    for hash_record in subdirectories(&record.path).await {
        if scan.token.is_cancelled() {
            return;
        }
        hash::build_index(scan, placement, &record, hash_record, counters, db_files, tx).await;
    }
}
