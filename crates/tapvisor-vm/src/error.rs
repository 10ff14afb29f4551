//! Error types for tapvisor-vm.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tapvisor-vm operations.
pub type Result<T> = std::result::Result<T, VmError>;

/// Errors that can occur during VM operations.
#[derive(Debug, Error)]
pub enum VmError {
    /// Missing or malformed configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Pre-flight check against the host failed
    #[error("validation failed: {0}")]
    Validation(String),

    /// Failed to spawn the hypervisor
    #[error("failed to launch {binary}: {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to deliver a signal
    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    /// Unknown signal name or number
    #[error("{0} is not a supported signal")]
    InvalidSignal(String),

    /// Operation requires a running VM
    #[error("VM {0} is not running")]
    NotRunning(String),

    /// Persisted identity file exists but cannot be used
    #[error("identity file {path:?}: {reason}")]
    Identity { path: PathBuf, reason: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
