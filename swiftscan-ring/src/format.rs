//! On-disk ring file format.
//!
//! A ring file is a gzip stream containing a fixed header, a JSON metadata
//! block and one `u16` partition-to-device table per replica:
//!
//! ```text
//! "R1NG" | version: u16 BE | json length: u32 BE | json metadata
//! replica 0: [u16; partition_count]
//! replica 1: [u16; partition_count]
//! ...
//! ```
//!
//! The metadata block carries the device list (with `null` holes for
//! removed devices), the partition shift and the replica count. Newer
//! clusters record the table byte order in a `byteorder` key; older files
//! are little-endian.

use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::{Result, RingError};

const RING_MAGIC: &[u8; 4] = b"R1NG";
const RING_VERSION: u16 = 1;

/// One device entry from the ring metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RingDevice {
    pub id: u16,
    pub ip: String,
    pub device: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub region: Option<u32>,
    #[serde(default)]
    pub zone: Option<u32>,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RingMeta {
    devs: Vec<Option<RingDevice>>,
    part_shift: u32,
    replica_count: f64,
    #[serde(default)]
    byteorder: Option<String>,
}

/// A fully parsed ring file.
#[derive(Debug, Clone)]
pub struct RingFile {
    /// Device list indexed by device id; holes are removed devices.
    pub devs: Vec<Option<RingDevice>>,
    pub part_shift: u32,
    /// Partition-to-device tables, one per replica. With fractional
    /// replica counts the last table is shorter.
    pub assignments: Vec<Vec<u16>>,
}

impl RingFile {
    pub fn partition_count(&self) -> usize {
        1usize << (32 - self.part_shift)
    }

    pub fn replica_count(&self) -> usize {
        self.assignments.len()
    }

    /// Parse a gzipped ring from raw file bytes.
    pub fn parse(path: &Path, bytes: &[u8]) -> Result<Self> {
        let mut reader = GzDecoder::new(bytes);
        let format = |detail: String| RingError::Format {
            path: path.to_path_buf(),
            detail,
        };

        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| format(format!("short header: {e}")))?;
        if &magic != RING_MAGIC {
            return Err(format(format!("bad magic {magic:02x?}")));
        }

        let version = read_u16_be(&mut reader).map_err(|e| format(format!("no version: {e}")))?;
        if version != RING_VERSION {
            return Err(format(format!("unsupported ring version {version}")));
        }

        let json_len =
            read_u32_be(&mut reader).map_err(|e| format(format!("no metadata length: {e}")))?;
        let mut json = vec![0u8; json_len as usize];
        reader
            .read_exact(&mut json)
            .map_err(|e| format(format!("short metadata block: {e}")))?;
        let meta: RingMeta =
            serde_json::from_slice(&json).map_err(|e| format(format!("bad metadata: {e}")))?;

        if meta.part_shift > 32 {
            return Err(format(format!("bad part_shift {}", meta.part_shift)));
        }
        let partition_count = 1usize << (32 - meta.part_shift);
        let little_endian = match meta.byteorder.as_deref() {
            None | Some("little") => true,
            Some("big") => false,
            Some(other) => return Err(format(format!("unknown byteorder {other:?}"))),
        };

        let rows = meta.replica_count.ceil() as usize;
        if rows == 0 {
            return Err(format("replica_count is zero".into()));
        }

        let mut assignments = Vec::with_capacity(rows);
        for row in 0..rows {
            let mut table = Vec::with_capacity(partition_count);
            for _ in 0..partition_count {
                let mut buf = [0u8; 2];
                match reader.read_exact(&mut buf) {
                    Ok(()) => {
                        let dev = if little_endian {
                            u16::from_le_bytes(buf)
                        } else {
                            u16::from_be_bytes(buf)
                        };
                        table.push(dev);
                    }
                    // A fractional replica count leaves the final table
                    // short; anywhere else a short read is corruption.
                    Err(_) if row + 1 == rows && !table.is_empty() => break,
                    Err(e) => {
                        return Err(format(format!(
                            "short assignment table for replica {row}: {e}"
                        )));
                    }
                }
            }
            assignments.push(table);
        }

        Ok(Self {
            devs: meta.devs,
            part_shift: meta.part_shift,
            assignments,
        })
    }
}

fn read_u16_be(reader: &mut impl Read) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32_be(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}
