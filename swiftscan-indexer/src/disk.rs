//! Disk walker, the top of the tree.
//!
//! A disk owns up to three resources, one per recognized subdirectory.
//! Each enabled resource walks on its own task; a failed resource (ring
//! missing, cluster config unreadable) is logged and does not stop its
//! siblings.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use swiftscan_core::{Event, ResourceType};

use crate::record::subdirectories;
use crate::resource::Resource;
use crate::scan::ScanOptions;

/// One Swift device directory, rebuilt fresh for every scan tick.
pub struct Disk {
    pub name: String,
    pub path: PathBuf,
}

impl Disk {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Walk every enabled resource of this disk, emitting events on `out`.
    /// Completes when all walkers have drained; unknown subdirectories are
    /// ignored.
    pub async fn build_index(
        &self,
        options: Arc<ScanOptions>,
        token: CancellationToken,
        out: mpsc::Sender<Event>,
    ) {
        debug!(device = %self.name, path = %self.path.display(), "build disk index");

        let mut resources = JoinSet::new();
        for entry in subdirectories(&self.path).await {
            let Some(resource_type) = ResourceType::from_dir_name(&entry.name) else {
                continue;
            };
            if !options.resource_enabled(resource_type) {
                continue;
            }

            let resource = Resource::new(&self.name, resource_type, entry);
            let options = options.clone();
            let token = token.clone();
            let out = out.clone();
            let device = self.name.clone();
            resources.spawn(async move {
                if let Err(e) = resource.build_index(options, token, out).await {
                    error!(
                        device = %device,
                        resource = %resource_type,
                        error = %e,
                        "resource walk failed"
                    );
                }
            });
        }

        while resources.join_next().await.is_some() {}
    }
}
