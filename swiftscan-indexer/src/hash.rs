//! Hash directory walker, the terminal level of the tree.
//!
//! A hash dir holds every file for one object name. Swift semantics:
//! the newest file wins, so only the newest file's extension is counted.
//! Older files matter only for datafile indexing, where each `.data`
//! file still gets its own event.

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use swiftscan_core::{Event, ObjectInfo, PlacementContext, ResourceType};

use crate::datafile::{self, DataRecord};
use crate::partition::PartitionCounters;
use crate::record::{FileRecord, IndexRecord, regular_files};
use crate::resource::{ResourceScan, send_event};

const DATA_EXT: &str = ".data";
const TOMBSTONE_EXT: &str = ".ts";
const DB_EXT: &str = ".db";

pub(crate) async fn build_index(
    scan: &ResourceScan,
    placement: &PlacementContext,
    suffix: &IndexRecord,
    record: IndexRecord,
    counters: &mut PartitionCounters,
    db_files: &mut Vec<FileRecord>,
    tx: &mpsc::Sender<Event>,
) {
    debug!(path = %record.path.display(), "build hash index");

    let now = Utc::now();
    let files: Vec<FileRecord> = regular_files(&record.path)
        .await
        .into_iter()
        .filter(|f| !scan.options.excluded(&f.record.name))
        .filter(|f| !scan.options.too_old(f.record.mtime, now))
        .collect();

    let Some(newest) = files.first() else {
        return;
    };

    match scan.resource_type {
        ResourceType::Object => {
            match newest.extension() {
                DATA_EXT => {
                    counters.datafiles += 1;
                    counters.bytes_total += newest.size;
                }
                TOMBSTONE_EXT => counters.tombstones += 1,
                _ => {}
            }

            if scan.options.enable_datafile_index {
                for file in &files {
                    if file.extension() != DATA_EXT {
                        continue;
                    }
                    let event = object_event(placement, suffix, &record, file);
                    if !send_event(tx, &scan.token, event).await {
                        return;
                    }
                }
            }
        }
        ResourceType::Container | ResourceType::Account => {
            db_files.extend(
                files
                    .into_iter()
                    .filter(|f| f.extension() == DB_EXT),
            );
        }
    }
}

fn object_event(
    placement: &PlacementContext,
    suffix: &IndexRecord,
    hash: &IndexRecord,
    file: &FileRecord,
) -> Event {
    let metadata = datafile::read_metadata(&file.record.path);
    let known = DataRecord::from_metadata(&metadata);

    Event::Object(ObjectInfo {
        placement: placement.clone(),
        path: file.record.path.display().to_string(),
        mtime: file.record.mtime,
        size_bytes: file.size,
        hash: hash.name.clone(),
        hash_mtime: hash.mtime,
        suffix: suffix.name.clone(),
        suffix_mtime: suffix.mtime,
        metadata,
        name: known.name,
        content_type: known.content_type,
        content_length: known.content_length,
        x_object_meta_mtime: known.x_object_meta_mtime,
        x_timestamp: known.x_timestamp,
        etag: known.etag,
        last_indexed: Utc::now(),
        ttl: None,
    })
}
