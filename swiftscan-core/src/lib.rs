//! swiftscan-core: shared model for the swiftscan node agent
//!
//! This crate holds the pieces every other swiftscan crate builds on:
//!
//! - **Event model** - [`Event`] and its per-resource payloads, one event per
//!   Swift partition or account/container database
//! - **Placement** - [`PlacementContext`], the ring-derived facts copied into
//!   every event instead of walker back-references
//! - **State store** - [`StateStore`], the change-tracking map that suppresses
//!   duplicate events across repeated scans
//! - **Configuration** - [`AgentConfig`] loaded from TOML at startup

pub mod config;
pub mod event;
pub mod placement;
pub mod state;

// Re-export key types for convenience
pub use config::{AgentConfig, ConfigError};
pub use event::{
    AccountInfo, ContainerInfo, Event, ObjectInfo, PartitionInfo, PartitionView, ResourceType,
};
pub use placement::PlacementContext;
pub use state::{DiskState, PartitionState, StateStore, UpdateOutcome};
