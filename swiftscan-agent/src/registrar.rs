//! Registrar: persists the state store across restarts.
//!
//! On start it loads the registry JSON (absent file is fine) into the
//! shared state store. While running it consumes post-publish batches and
//! rewrites the registry after each one, plus once more on shutdown.
//! Writes go to a temp file first and land with an atomic rename.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use swiftscan_core::{DiskState, Event, StateStore};

use crate::{AgentError, Result};

pub struct Registrar {
    registry_file: PathBuf,
    states: Arc<StateStore>,
}

impl Registrar {
    /// Set up the registrar, creating the registry directory when needed.
    pub fn new(registry_file: PathBuf, states: Arc<StateStore>) -> Result<Self> {
        if let Some(parent) = registry_file.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| AgentError::Registry {
                path: registry_file.clone(),
                source,
            })?;
        }
        info!(path = %registry_file.display(), "registry file set");
        Ok(Self {
            registry_file,
            states,
        })
    }

    /// Load previously persisted states into the store. A missing file
    /// starts fresh; a corrupt file is fatal at startup.
    pub async fn load_states(&self) -> Result<()> {
        let contents = match tokio::fs::read(&self.registry_file).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.registry_file.display(), "no registry file, starting fresh");
                return Ok(());
            }
            Err(source) => {
                return Err(AgentError::Registry {
                    path: self.registry_file.clone(),
                    source,
                });
            }
        };

        let snapshot: BTreeMap<String, DiskState> =
            serde_json::from_slice(&contents).map_err(|source| AgentError::RegistryFormat {
                path: self.registry_file.clone(),
                source,
            })?;

        self.states.load(snapshot).await;
        let partitions = self.states.count().await;
        info!(partitions, "registry states loaded");
        Ok(())
    }

    /// Consume published batches, persisting the snapshot after each one
    /// and once more when the channel closes.
    pub async fn run(self, mut rx: mpsc::Receiver<Vec<Event>>) {
        info!("starting registrar");
        while let Some(batch) = rx.recv().await {
            debug!(events = batch.len(), "registrar observed published batch");
            if let Err(e) = self.write_registry().await {
                error!(error = %e, "writing registry failed, continuing");
            }
        }

        if let Err(e) = self.write_registry().await {
            error!(error = %e, "final registry write failed");
        }
        info!("registrar stopped");
    }

    /// Serialize the snapshot and atomically replace the registry file.
    pub async fn write_registry(&self) -> std::io::Result<()> {
        let snapshot = self.states.snapshot().await;
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let tempfile = self.registry_file.with_extension("json.new");
        tokio::fs::write(&tempfile, &json).await?;
        tokio::fs::rename(&tempfile, &self.registry_file).await?;

        debug!(
            path = %self.registry_file.display(),
            disks = snapshot.len(),
            "registry file updated"
        );
        Ok(())
    }
}
