//! Test fixtures: synthesized ring files.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

pub(crate) fn gzip(raw: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).unwrap();
    encoder.finish().unwrap()
}

/// Serialize a three-device ring (sdb/sdc/sdd on 10.0.0.1-3, plus a null
/// hole) with the given partition tables. `part_shift` 30 gives four
/// partitions per table.
pub(crate) fn ring_bytes(part_shift: u32, tables: &[[u16; 4]]) -> Vec<u8> {
    let meta = serde_json::json!({
        "devs": [
            {"id": 0, "ip": "10.0.0.1", "port": 6000, "device": "sdb",
             "region": 1, "zone": 1, "weight": 100.0},
            {"id": 1, "ip": "10.0.0.2", "port": 6000, "device": "sdc",
             "region": 1, "zone": 2, "weight": 100.0},
            {"id": 2, "ip": "10.0.0.3", "port": 6000, "device": "sdd",
             "region": 1, "zone": 3, "weight": 100.0},
            null,
        ],
        "part_shift": part_shift,
        "replica_count": tables.len(),
        "byteorder": "little",
    });
    let json = serde_json::to_vec(&meta).unwrap();

    let mut raw = Vec::new();
    raw.extend_from_slice(b"R1NG");
    raw.extend_from_slice(&1u16.to_be_bytes());
    raw.extend_from_slice(&(json.len() as u32).to_be_bytes());
    raw.extend_from_slice(&json);
    for table in tables {
        for dev in table {
            raw.extend_from_slice(&dev.to_le_bytes());
        }
    }

    gzip(&raw)
}
