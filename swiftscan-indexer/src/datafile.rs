//! Object data file metadata probe.
//!
//! Swift stores per-object metadata in the `user.swift.metadata` extended
//! attribute as a pickled string-to-string dictionary. The probe is
//! read-only and never fails the surrounding walk: any read or decode
//! error logs and leaves the metadata empty.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

const METADATA_KEY: &str = "user.swift.metadata";
const XATTR_BUF_SIZE: usize = 4096;

/// Known metadata keys lifted into dedicated event fields. Matching is
/// case-insensitive; `content-length` is additionally parsed to an
/// integer, keeping only the raw mapping entry when it does not parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRecord {
    pub name: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
    pub x_object_meta_mtime: Option<String>,
    pub x_timestamp: Option<String>,
    pub etag: Option<String>,
}

impl DataRecord {
    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Self {
        let mut record = Self::default();
        for (key, value) in metadata {
            match key.to_ascii_lowercase().as_str() {
                "name" => record.name = Some(value.clone()),
                "content-type" => record.content_type = Some(value.clone()),
                "content-length" => record.content_length = value.parse().ok(),
                "x-object-meta-mtime" => record.x_object_meta_mtime = Some(value.clone()),
                "x-timestamp" => record.x_timestamp = Some(value.clone()),
                "etag" => record.etag = Some(value.clone()),
                _ => {}
            }
        }
        record
    }
}

/// Read and decode the metadata xattr of one `.data` file.
pub fn read_metadata(path: &Path) -> BTreeMap<String, String> {
    let value = match xattr::get(path, METADATA_KEY) {
        Ok(Some(value)) => value,
        Ok(None) => {
            warn!(path = %path.display(), "metadata xattr missing");
            return BTreeMap::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "read xattr failed");
            return BTreeMap::new();
        }
    };

    // The reader works from a fixed buffer; oversized values arrive
    // truncated and fail the decode below.
    let len = value.len().min(XATTR_BUF_SIZE);
    decode_metadata(path, &value[..len])
}

/// Unpickle a string-to-string dictionary. Decode errors log and yield an
/// empty mapping.
pub(crate) fn decode_metadata(path: &Path, buf: &[u8]) -> BTreeMap<String, String> {
    match serde_pickle::from_slice::<BTreeMap<String, String>>(buf, serde_pickle::DeOptions::new()) {
        Ok(metadata) => {
            debug!(path = %path.display(), entries = metadata.len(), "metadata decoded");
            metadata
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unpickling metadata failed");
            BTreeMap::new()
        }
    }
}
