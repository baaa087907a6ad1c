//! Change-tracking state store.
//!
//! Tracks, per (device, resource, partition), the timestamps of the last
//! accepted event so repeated scans of an unchanged tree emit nothing. The
//! store is the only mutable structure shared across scan tasks; a single
//! mutex serializes every decision.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::event::{PartitionView, ResourceType};

/// Last accepted timestamps for one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PartitionState {
    pub last_indexed: DateTime<Utc>,
    pub last_mtime: DateTime<Utc>,
    pub last_ring_mtime: DateTime<Utc>,
}

impl PartitionState {
    fn from_view(view: &PartitionView) -> Self {
        Self {
            last_indexed: view.last_indexed,
            last_mtime: view.mtime,
            last_ring_mtime: view.ring_mtime,
        }
    }

    fn apply(&mut self, view: &PartitionView) {
        self.last_indexed = view.last_indexed;
        self.last_mtime = view.mtime;
        self.last_ring_mtime = view.ring_mtime;
    }
}

/// Tracked state for one disk: three maps of partition key to state, one
/// per resource kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskState {
    pub account: BTreeMap<String, PartitionState>,
    pub container: BTreeMap<String, PartitionState>,
    pub object: BTreeMap<String, PartitionState>,
}

impl DiskState {
    fn resource(&self, resource_type: ResourceType) -> &BTreeMap<String, PartitionState> {
        match resource_type {
            ResourceType::Account => &self.account,
            ResourceType::Container => &self.container,
            ResourceType::Object => &self.object,
        }
    }

    fn resource_mut(
        &mut self,
        resource_type: ResourceType,
    ) -> &mut BTreeMap<String, PartitionState> {
        match resource_type {
            ResourceType::Account => &mut self.account,
            ResourceType::Container => &mut self.container,
            ResourceType::Object => &mut self.object,
        }
    }

    fn len(&self) -> usize {
        self.account.len() + self.container.len() + self.object.len()
    }
}

/// Result of [`StateStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// New state was recorded (insert or overwrite).
    Accepted,
    /// Event repeats already-recorded state from a later tick; dropped.
    Duplicate,
    /// Event is older than the recorded state; state untouched.
    OutOfOrder,
}

/// How an incoming event compares to recorded state. First matching rule
/// wins; the first three mean the event is new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Newness {
    /// The ring file changed; replica placement may differ and the
    /// partition must be re-reported.
    RingChanged,
    /// The partition directory was modified since last acceptance.
    MtimeAdvanced,
    /// Same mtime, same index pass: a re-emission within one tick.
    SameTick,
    /// Same mtime seen again by a later tick; nothing changed.
    Replayed,
    /// Mtime older than recorded.
    Stale,
    /// Same mtime but an earlier index time than recorded; the tracked
    /// state would move backward.
    Backward,
}

impl Newness {
    fn is_new(self) -> bool {
        matches!(
            self,
            Newness::RingChanged | Newness::MtimeAdvanced | Newness::SameTick
        )
    }
}

fn classify(state: &PartitionState, view: &PartitionView) -> Newness {
    if view.ring_mtime > state.last_ring_mtime {
        return Newness::RingChanged;
    }
    if view.mtime > state.last_mtime {
        return Newness::MtimeAdvanced;
    }
    if view.mtime == state.last_mtime {
        if view.last_indexed == state.last_indexed {
            return Newness::SameTick;
        }
        if view.last_indexed > state.last_indexed {
            return Newness::Replayed;
        }
        return Newness::Backward;
    }
    Newness::Stale
}

/// Thread-safe map of `device -> resource -> partition -> PartitionState`.
#[derive(Debug, Default)]
pub struct StateStore {
    inner: Mutex<BTreeMap<String, DiskState>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event for this partition should be forwarded downstream.
    /// Unknown partitions are always new.
    pub async fn is_new_event(&self, view: &PartitionView) -> bool {
        let inner = self.inner.lock().await;
        match Self::lookup(&inner, view) {
            None => true,
            Some(state) => {
                let newness = classify(state, view);
                if newness == Newness::Backward {
                    error!(
                        device = %view.device,
                        resource = %view.resource_type,
                        partition = %view.state_key(),
                        incoming = %view.last_indexed,
                        recorded = %state.last_indexed,
                        "state going backward"
                    );
                }
                newness.is_new()
            }
        }
    }

    /// Record an accepted event. Inserts when the partition is unknown,
    /// overwrites the three timestamps when the newness rule says new, and
    /// leaves state untouched otherwise.
    pub async fn update(&self, view: &PartitionView) -> UpdateOutcome {
        let mut inner = self.inner.lock().await;
        let disk = inner.entry(view.device.clone()).or_default();
        let partitions = disk.resource_mut(view.resource_type);
        let key = view.state_key();

        match partitions.get_mut(&key) {
            None => {
                partitions.insert(key, PartitionState::from_view(view));
                UpdateOutcome::Accepted
            }
            Some(state) => match classify(state, view) {
                newness if newness.is_new() => {
                    debug!(
                        device = %view.device,
                        resource = %view.resource_type,
                        partition = %key,
                        mtime = %view.mtime,
                        "state updated"
                    );
                    state.apply(view);
                    UpdateOutcome::Accepted
                }
                Newness::Replayed => UpdateOutcome::Duplicate,
                Newness::Backward => {
                    error!(
                        device = %view.device,
                        resource = %view.resource_type,
                        partition = %key,
                        incoming = %view.last_indexed,
                        recorded = %state.last_indexed,
                        "state going backward"
                    );
                    UpdateOutcome::OutOfOrder
                }
                _ => UpdateOutcome::OutOfOrder,
            },
        }
    }

    /// Deep copy of the whole structure, for persistence.
    pub async fn snapshot(&self) -> BTreeMap<String, DiskState> {
        self.inner.lock().await.clone()
    }

    /// Replace the whole structure, e.g. from a loaded registry file.
    pub async fn load(&self, snapshot: BTreeMap<String, DiskState>) {
        *self.inner.lock().await = snapshot;
    }

    /// Total number of tracked partitions across all disks and resources.
    pub async fn count(&self) -> usize {
        self.inner.lock().await.values().map(DiskState::len).sum()
    }

    fn lookup<'a>(
        inner: &'a BTreeMap<String, DiskState>,
        view: &PartitionView,
    ) -> Option<&'a PartitionState> {
        inner
            .get(&view.device)?
            .resource(view.resource_type)
            .get(&view.state_key())
    }
}
