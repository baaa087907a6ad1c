//! Prospector: periodic scan scheduler, one crawl loop per device.
//!
//! Devices are discovered once at startup under `device_dir`. Each device
//! loop builds a fresh walker tree on every `scan_frequency` tick; the
//! harvester channel and its consumer persist across ticks, so a slow
//! scan may still be draining while the next tick's tree starts. The
//! consumer stamps TTLs, drops events the state store has already seen,
//! and forwards survivors to the spooler with a cancellable send.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use swiftscan_core::{AgentConfig, Event, StateStore, UpdateOutcome};
use swiftscan_indexer::{Disk, ScanOptions};

use crate::{AgentError, Result};

pub struct Prospector {
    devices: Vec<(String, PathBuf)>,
    options: Arc<ScanOptions>,
    scan_frequency: Duration,
    rescan_older: Option<Duration>,
    states: Arc<StateStore>,
    spooler_tx: mpsc::Sender<Event>,
    token: CancellationToken,
}

impl Prospector {
    /// Discover devices and prepare scan options. An unreadable device
    /// dir is fatal at startup.
    pub fn new(
        config: &AgentConfig,
        states: Arc<StateStore>,
        spooler_tx: mpsc::Sender<Event>,
        token: CancellationToken,
    ) -> Result<Self> {
        let options = Arc::new(ScanOptions::from_config(config)?);

        let mut devices = Vec::new();
        let entries =
            std::fs::read_dir(&config.device_dir).map_err(|source| AgentError::DeviceDir {
                path: config.device_dir.clone(),
                source,
            })?;
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            devices.push((name, entry.path()));
        }
        devices.sort();

        if devices.is_empty() {
            warn!(path = %config.device_dir.display(), "no devices found under device dir");
        }
        info!(devices = devices.len(), "prospector initialized");

        Ok(Self {
            devices,
            options,
            scan_frequency: config.scan_frequency,
            rescan_older: config.rescan_older,
            states,
            spooler_tx,
            token,
        })
    }

    /// Run one crawl loop per device until shutdown.
    pub async fn run(self) {
        info!("starting prospector");
        let mut loops = JoinSet::new();

        for (name, path) in self.devices {
            let crawl = DeviceCrawl {
                name,
                path,
                options: self.options.clone(),
                scan_frequency: self.scan_frequency,
                rescan_older: self.rescan_older,
                states: self.states.clone(),
                spooler_tx: self.spooler_tx.clone(),
                token: self.token.clone(),
            };
            loops.spawn(crawl.run());
        }
        // The prospector's own sender is dropped here so the spooler sees
        // the channel close once every device loop finished.
        drop(self.spooler_tx);

        while loops.join_next().await.is_some() {}
        info!("prospector stopped");
    }
}

/// The per-device crawl loop.
struct DeviceCrawl {
    name: String,
    path: PathBuf,
    options: Arc<ScanOptions>,
    scan_frequency: Duration,
    rescan_older: Option<Duration>,
    states: Arc<StateStore>,
    spooler_tx: mpsc::Sender<Event>,
    token: CancellationToken,
}

impl DeviceCrawl {
    async fn run(self) {
        // Harvester channel and consumer persist across ticks; every
        // tick's walker tree drains into the same fan-in.
        let (harvester_tx, harvester_rx) = mpsc::channel::<Event>(1);
        let consumer = tokio::spawn(consume(
            harvester_rx,
            self.states.clone(),
            self.spooler_tx.clone(),
            self.token.clone(),
            self.rescan_older,
        ));

        let mut scans = JoinSet::new();
        loop {
            debug!(device = %self.name, "start next scan");
            let disk = Disk::new(self.name.clone(), self.path.clone());
            let options = self.options.clone();
            let token = self.token.clone();
            let tx = harvester_tx.clone();
            let device = self.name.clone();
            scans.spawn(async move {
                disk.build_index(options, token, tx).await;
                debug!(device = %device, "scan complete");
                return_memory();
            });

            // Reap finished scans without gating the next tick on them.
            while scans.try_join_next().is_some() {}

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.scan_frequency) => {}
            }
        }

        info!(device = %self.name, "stopping device crawl");
        while scans.join_next().await.is_some() {}
        drop(harvester_tx);
        let _ = consumer.await;
    }
}

/// Filter harvested events through the state store and forward survivors.
async fn consume(
    mut rx: mpsc::Receiver<Event>,
    states: Arc<StateStore>,
    spooler_tx: mpsc::Sender<Event>,
    token: CancellationToken,
    rescan_older: Option<Duration>,
) {
    while let Some(mut event) = rx.recv().await {
        if let Some(ttl) = rescan_older {
            event.set_ttl(ttl);
        }

        let view = event.to_partition();
        if !states.is_new_event(&view).await {
            debug!(
                device = %view.device,
                resource = %view.resource_type,
                partition = %view.state_key(),
                "dropping duplicate event"
            );
            continue;
        }

        // Cancellable forward: shutdown aborts the send and ends the
        // consumer; the event is lost, which at-least-once permits.
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("prospector channel stopped");
                return;
            }
            sent = spooler_tx.send(event) => {
                if sent.is_err() {
                    return;
                }
            }
        }

        if states.update(&view).await == UpdateOutcome::OutOfOrder {
            warn!(
                device = %view.device,
                partition = %view.state_key(),
                "event accepted by filter but rejected by store"
            );
        }
    }
}

/// Best-effort hint to hand freed heap back to the OS between scans.
#[cfg(target_os = "linux")]
fn return_memory() {
    unsafe {
        libc::malloc_trim(0);
    }
}

#[cfg(not(target_os = "linux"))]
fn return_memory() {}
