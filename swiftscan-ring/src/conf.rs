//! Cluster hash path configuration.
//!
//! Swift clusters carry a shared hash path prefix and suffix in
//! `/etc/swift/swift.conf` under the `[swift-hash]` section. The agent
//! reads them at resource setup; a missing file is fatal for the resource.

use std::path::Path;

use crate::{Result, RingError};

/// The `swift_hash_path_prefix` / `swift_hash_path_suffix` pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashPathConfig {
    pub prefix: String,
    pub suffix: String,
}

impl HashPathConfig {
    /// Read the cluster config file. Keys outside `[swift-hash]` are
    /// ignored; absent keys stay empty.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| RingError::Config {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::default();
        let mut in_swift_hash = false;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                in_swift_hash = section.trim() == "swift-hash";
                continue;
            }
            if !in_swift_hash {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            match key.trim() {
                "swift_hash_path_prefix" => config.prefix = value.trim().to_string(),
                "swift_hash_path_suffix" => config.suffix = value.trim().to_string(),
                _ => {}
            }
        }

        Ok(config)
    }
}
