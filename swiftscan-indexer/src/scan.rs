//! Per-scan options threaded into every walker.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

use swiftscan_core::{AgentConfig, ConfigError, ResourceType};

/// The configuration slice the walkers need, with exclusion patterns
/// compiled. Built once at startup and shared by reference; walkers never
/// consult global state.
#[derive(Debug)]
pub struct ScanOptions {
    pub ring_dir: PathBuf,
    pub swift_conf: PathBuf,
    pub partition_concurrency: usize,
    pub enable_object_partition_index: bool,
    pub enable_datafile_index: bool,
    pub enable_account_index: bool,
    pub enable_container_index: bool,
    pub object_index_handoff_only: bool,
    pub exclude_files: Vec<Regex>,
    pub ignore_older: Option<Duration>,
}

impl ScanOptions {
    pub fn from_config(config: &AgentConfig) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            ring_dir: config.ring_dir.clone(),
            swift_conf: config.swift_conf.clone(),
            partition_concurrency: config.partition_concurrency,
            enable_object_partition_index: config.enable_object_partition_index,
            enable_datafile_index: config.enable_datafile_index,
            enable_account_index: config.enable_account_index,
            enable_container_index: config.enable_container_index,
            object_index_handoff_only: config.object_index_handoff_only,
            exclude_files: config.exclude_patterns()?,
            ignore_older: config.ignore_older,
        })
    }

    /// Whether a resource directory should be walked at all.
    pub fn resource_enabled(&self, resource_type: ResourceType) -> bool {
        match resource_type {
            ResourceType::Account => self.enable_account_index,
            ResourceType::Container => self.enable_container_index,
            ResourceType::Object => {
                self.enable_object_partition_index || self.enable_datafile_index
            }
        }
    }

    /// File-level exclusion by name.
    pub(crate) fn excluded(&self, name: &str) -> bool {
        self.exclude_files.iter().any(|p| p.is_match(name))
    }

    /// `ignore_older` cutoff check against a file mtime.
    pub(crate) fn too_old(&self, mtime: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.ignore_older {
            None => false,
            Some(cutoff) => match chrono::Duration::from_std(cutoff) {
                Ok(cutoff) => now - mtime > cutoff,
                Err(_) => false,
            },
        }
    }
}
