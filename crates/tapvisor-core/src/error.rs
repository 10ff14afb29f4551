//! Error types for tapvisor-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tapvisor-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while loading or applying a topology.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error from tapvisor-vm
    #[error("VM error: {0}")]
    Vm(#[from] tapvisor_vm::VmError),

    /// Error from tapvisor-net
    #[error("network error: {0}")]
    Net(#[from] tapvisor_net::NetError),

    /// Invalid topology
    #[error("configuration error: {0}")]
    Config(String),

    /// Topology file is not valid TOML for the expected schema
    #[error("failed to parse {path:?}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// No VM with this name is declared
    #[error("unknown VM: {0}")]
    UnknownVm(String),

    /// No network with this name is declared
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
