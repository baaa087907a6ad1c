//! swiftscan-agent: the long-running node agent
//!
//! Wires the pieces together: one [`Prospector`] per configuration drives
//! periodic disk scans, survivors of the state-store filter flow into the
//! [`Spooler`], batches go to a [`Publisher`], and published batches
//! trigger the [`Registrar`] to persist the state snapshot.
//!
//! ```text
//! Prospector -> Disk walkers -> fan-in -> state filter -> Spooler
//!     -> Publisher -> Registrar (persist snapshot)
//! ```

pub mod agent;
pub mod prospector;
pub mod publisher;
pub mod registrar;
pub mod spooler;

pub use agent::Agent;
pub use prospector::Prospector;
pub use publisher::{NdjsonPublisher, PublishPump, Publisher};
pub use registrar::Registrar;
pub use spooler::Spooler;

use std::path::PathBuf;

/// Errors that prevent the agent from starting. Everything after startup
/// is logged and absorbed; the next scan tick re-attempts.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Config(#[from] swiftscan_core::ConfigError),

    #[error("device dir {path} unreadable: {source}")]
    DeviceDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("registry file {path} unusable: {source}")]
    Registry {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("registry file {path} corrupt: {source}")]
    RegistryFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
