//! Test fixtures: Swift directory trees, ring files and databases.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

use flate2::Compression;
use flate2::write::GzEncoder;
use rusqlite::Connection;

use swiftscan_core::ResourceType;

/// Set a file or directory mtime to a fixed unix timestamp.
pub(crate) fn set_mtime(path: &Path, unix_secs: u64) {
    let file = std::fs::File::open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(unix_secs))
        .unwrap();
}

/// Serialize a ring with the given `(id, ip, device)` entries and
/// partition tables. `part_shift` 26 gives 64 partitions per table.
pub(crate) fn ring_bytes(
    devs: &[(u16, &str, &str)],
    part_shift: u32,
    tables: &[Vec<u16>],
) -> Vec<u8> {
    let devs: Vec<serde_json::Value> = devs
        .iter()
        .map(|(id, ip, device)| {
            serde_json::json!({
                "id": id, "ip": ip, "port": 6000, "device": device,
                "region": 1, "zone": 1, "weight": 100.0,
            })
        })
        .collect();
    let meta = serde_json::json!({
        "devs": devs,
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

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    encoder.finish().unwrap()
}

/// Write `<resource>.ring.gz` into `ring_dir`.
pub(crate) fn write_ring(
    ring_dir: &Path,
    resource_type: ResourceType,
    devs: &[(u16, &str, &str)],
    tables: &[Vec<u16>],
) {
    std::fs::create_dir_all(ring_dir).unwrap();
    std::fs::write(
        ring_dir.join(resource_type.ring_file_name()),
        ring_bytes(devs, 26, tables),
    )
    .unwrap();
}

/// Write a minimal cluster config with hash path keys.
pub(crate) fn write_swift_conf(path: &Path) {
    std::fs::write(
        path,
        "[swift-hash]\nswift_hash_path_prefix = t\nswift_hash_path_suffix = t\n",
    )
    .unwrap();
}

/// Create an object-layer file
/// `<device>/objects/<part>/<suffix>/<hash>/<name>` of the given size and
/// mtime, bumping ancestor directory mtimes to match.
pub(crate) fn object_file(
    device_root: &Path,
    part: &str,
    suffix: &str,
    hash: &str,
    name: &str,
    size: usize,
    mtime: u64,
) {
    let dir = device_root.join("objects").join(part).join(suffix).join(hash);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, vec![0u8; size]).unwrap();
    set_mtime(&path, mtime);
    set_mtime(&dir, mtime);
    set_mtime(&dir.parent().unwrap(), mtime);
    set_mtime(&dir.parent().unwrap().parent().unwrap(), mtime);
}

/// Create `<device>/<resource dir>/<part>/<suffix>/<hash>/<name>.db`.
pub(crate) fn db_file(
    device_root: &Path,
    resource_type: ResourceType,
    part: &str,
    suffix: &str,
    hash: &str,
    name: &str,
) -> std::path::PathBuf {
    let dir = device_root
        .join(resource_type.dir_name())
        .join(part)
        .join(suffix)
        .join(hash);
    std::fs::create_dir_all(&dir).unwrap();
    dir.join(name)
}

pub(crate) fn account_db(
    path: &Path,
    account: &str,
    status: &str,
    container_count: i64,
    object_count: i64,
    bytes_used: i64,
) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE account_stat (account TEXT, status TEXT, \
         container_count INTEGER, object_count INTEGER, bytes_used INTEGER);",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO account_stat VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![account, status, container_count, object_count, bytes_used],
    )
    .unwrap();
}

pub(crate) fn container_db(
    path: &Path,
    account: &str,
    container: &str,
    status: &str,
    object_count: i64,
    bytes_used: i64,
    policy_index: i64,
) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE container_info (account TEXT, container TEXT, status TEXT, \
         reported_object_count INTEGER, reported_bytes_used INTEGER, \
         storage_policy_index INTEGER);",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO container_info VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            account,
            container,
            status,
            object_count,
            bytes_used,
            policy_index
        ],
    )
    .unwrap();
}
