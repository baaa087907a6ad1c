//! Agent configuration, loaded from a TOML file at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Errors raised while loading or validating configuration. All of these
/// are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid exclude pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Configuration for the swiftscan agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Parent directory whose subdirectories are candidate devices.
    #[serde(default = "default_device_dir")]
    pub device_dir: PathBuf,

    /// Interval between full rescans.
    #[serde(default = "default_scan_frequency", with = "humantime_serde")]
    pub scan_frequency: Duration,

    /// Regex patterns; matching file names are skipped during the walk.
    #[serde(default)]
    pub exclude_files: Vec<String>,

    /// Files older than this are not considered.
    #[serde(default, with = "humantime_serde")]
    pub ignore_older: Option<Duration>,

    /// TTL stamped on events so downstream can schedule a re-check.
    #[serde(default, with = "humantime_serde")]
    pub rescan_older: Option<Duration>,

    /// Garbage-collect state entries inactive for this long.
    #[serde(default, with = "humantime_serde")]
    pub clean_inactive: Option<Duration>,

    /// Garbage-collect state entries whose files disappeared.
    #[serde(default)]
    pub clean_removed: bool,

    /// Emit one summary event per object partition.
    #[serde(default = "default_true")]
    pub enable_object_partition_index: bool,

    /// Emit one event per object data file. Expensive; off by default.
    #[serde(default)]
    pub enable_datafile_index: bool,

    #[serde(default = "default_true")]
    pub enable_account_index: bool,

    #[serde(default = "default_true")]
    pub enable_container_index: bool,

    /// Skip object partitions where this device is a primary; only
    /// handoffs get counted.
    #[serde(default)]
    pub object_index_handoff_only: bool,

    /// How many partitions of one resource may be scanned concurrently.
    #[serde(default = "default_partition_concurrency")]
    pub partition_concurrency: usize,

    /// Directory holding `<resource>.ring.gz` files.
    #[serde(default = "default_ring_dir")]
    pub ring_dir: PathBuf,

    /// Cluster config file carrying the hash path prefix and suffix.
    #[serde(default = "default_swift_conf")]
    pub swift_conf: PathBuf,

    /// Where the registrar persists the state snapshot.
    #[serde(default = "default_registry_file")]
    pub registry_file: PathBuf,

    /// Spooler flushes to the publisher once this many events buffered.
    #[serde(default = "default_spool_size")]
    pub spool_size: usize,

    /// Spooler flushes a partial batch after this long without input.
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Publish batches on a spawned task instead of inline.
    #[serde(default)]
    pub publish_async: bool,
}

fn default_device_dir() -> PathBuf {
    PathBuf::from("/srv/node")
}

fn default_scan_frequency() -> Duration {
    Duration::from_secs(10)
}

fn default_true() -> bool {
    true
}

fn default_partition_concurrency() -> usize {
    1
}

fn default_ring_dir() -> PathBuf {
    PathBuf::from("/etc/swift")
}

fn default_swift_conf() -> PathBuf {
    PathBuf::from("/etc/swift/swift.conf")
}

fn default_registry_file() -> PathBuf {
    PathBuf::from("/var/lib/swiftscan/registry.json")
}

fn default_spool_size() -> usize {
    1024
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            device_dir: default_device_dir(),
            scan_frequency: default_scan_frequency(),
            exclude_files: Vec::new(),
            ignore_older: None,
            rescan_older: None,
            clean_inactive: None,
            clean_removed: false,
            enable_object_partition_index: true,
            enable_datafile_index: false,
            enable_account_index: true,
            enable_container_index: true,
            object_index_handoff_only: false,
            partition_concurrency: default_partition_concurrency(),
            ring_dir: default_ring_dir(),
            swift_conf: default_swift_conf(),
            registry_file: default_registry_file(),
            spool_size: default_spool_size(),
            idle_timeout: default_idle_timeout(),
            publish_async: false,
        }
    }
}

impl AgentConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints. Called by [`AgentConfig::load`];
    /// programmatically built configs should call it too.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("device_dir must not be empty".into()));
        }

        if self.scan_frequency.is_zero() {
            return Err(ConfigError::Invalid(
                "scan_frequency must be nonzero".into(),
            ));
        }

        if self.partition_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "partition_concurrency must be at least 1".into(),
            ));
        }

        if let Some(clean_inactive) = self.clean_inactive {
            let Some(ignore_older) = self.ignore_older else {
                return Err(ConfigError::Invalid(
                    "ignore_older must be enabled when clean_inactive is used".into(),
                ));
            };
            if clean_inactive <= ignore_older + self.scan_frequency {
                return Err(ConfigError::Invalid(
                    "clean_inactive must be greater than ignore_older + scan_frequency \
                     so only partitions no longer monitored are removed"
                        .into(),
                ));
            }
        }

        self.exclude_patterns()?;
        Ok(())
    }

    /// Compile the `exclude_files` patterns.
    pub fn exclude_patterns(&self) -> Result<Vec<Regex>, ConfigError> {
        self.exclude_files
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AgentConfig::default();
        assert_eq!(config.device_dir, PathBuf::from("/srv/node"));
        assert_eq!(config.scan_frequency, Duration::from_secs(10));
        assert!(config.enable_object_partition_index);
        assert!(!config.enable_datafile_index);
        assert!(config.enable_account_index);
        assert!(config.enable_container_index);
        assert!(!config.object_index_handoff_only);
        assert_eq!(config.partition_concurrency, 1);
        assert_eq!(config.spool_size, 1024);
        assert!(!config.publish_async);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn durations_parse_from_humantime_strings() {
        let config: AgentConfig = toml::from_str(
            r#"
            device_dir = "/srv/node"
            scan_frequency = "30s"
            ignore_older = "24h"
            rescan_older = "1h"
            "#,
        )
        .unwrap();
        assert_eq!(config.scan_frequency, Duration::from_secs(30));
        assert_eq!(config.ignore_older, Some(Duration::from_secs(86_400)));
        assert_eq!(config.rescan_older, Some(Duration::from_secs(3_600)));
    }

    #[test]
    fn load_reads_and_validates_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(
            file,
            "device_dir = \"/srv/node\"\nscan_frequency = \"1m\"\nobject_index_handoff_only = true"
        )
        .unwrap();

        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(config.scan_frequency, Duration::from_secs(60));
        assert!(config.object_index_handoff_only);

        let missing = AgentConfig::load(Path::new("/nonexistent/swiftscan.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn clean_inactive_requires_ignore_older() {
        let config: AgentConfig = toml::from_str(r#"clean_inactive = "48h""#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ignore_older"));
    }

    #[test]
    fn clean_inactive_must_exceed_ignore_older_plus_scan_frequency() {
        let config: AgentConfig = toml::from_str(
            r#"
            ignore_older = "1h"
            clean_inactive = "30m"
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("clean_inactive"));
    }

    #[test]
    fn zero_scan_frequency_is_rejected() {
        let config: AgentConfig = toml::from_str(r#"scan_frequency = "0s""#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_exclude_pattern_is_rejected() {
        let config: AgentConfig = toml::from_str(r#"exclude_files = ["[unclosed"]"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn exclude_patterns_compile_and_match() {
        let config: AgentConfig =
            toml::from_str(r#"exclude_files = ["\\.lock$", "^tmp"]"#).unwrap();
        let patterns = config.exclude_patterns().unwrap();
        assert!(patterns.iter().any(|p| p.is_match("hashes.lock")));
        assert!(patterns.iter().any(|p| p.is_match("tmp123")));
        assert!(!patterns.iter().any(|p| p.is_match("1700000000.00000.data")));
    }
}
