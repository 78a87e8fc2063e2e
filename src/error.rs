//! Error types.
//!
//! Errors fall into three groups:
//! - **fatal**: [`Error::Initialization`] aborts `start()`/`run()` before any
//!   `started` notification,
//! - **transient**: [`Error::Query`] and [`Error::DeviceUnavailable`] are raised by
//!   ports during a tick; the engine logs them and keeps polling,
//! - **configuration**: loading an [`EngineConfig`](crate::config::EngineConfig).
//!
//! Unknown button bits are not errors at all; they only produce a diagnostic.

use crate::device::DeviceId;
use std::path::PathBuf;

/// Crate-wide error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device subsystem could not be located or initialized.
    #[error("device layer initialization failed: {0}")]
    Initialization(String),

    /// `start()` was called on an engine that is already running.
    #[error("engine is already running")]
    AlreadyRunning,

    /// A port query failed.
    #[error("device query `{op}` failed: {reason}")]
    Query { op: &'static str, reason: String },

    /// The port no longer knows this id (unplugged between list refreshes).
    #[error("device {0} is not available")]
    DeviceUnavailable(DeviceId),

    #[error("failed to read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML config: {0}")]
    ConfigToml(#[from] toml::de::Error),

    #[error("invalid JSON config: {0}")]
    ConfigJson(#[from] serde_json::Error),

    /// A button table binds a bit outside its width, binds a bit twice, or has a
    /// width outside `1..=32`.
    #[error("invalid button table: {0}")]
    ButtonTable(String),

    /// Config path has neither a `.toml` nor a `.json` extension.
    #[error("unsupported config format: {}", .0.display())]
    UnsupportedConfigFormat(PathBuf),

    /// The polling thread could not be spawned or died unexpectedly.
    #[error("polling thread failure: {0}")]
    PollThread(String),
}

impl Error {
    /// Shorthand used by ports to build a [`Error::Query`].
    pub fn query(op: &'static str, reason: impl std::fmt::Display) -> Self {
        Error::Query {
            op,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
