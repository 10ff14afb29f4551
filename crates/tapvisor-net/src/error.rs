//! Error types for tapvisor-net.

use crate::reconcile::ConvergeReport;
use thiserror::Error;

/// Result type alias for tapvisor-net operations.
pub type Result<T> = std::result::Result<T, NetError>;

/// Errors that can occur while discovering or converging a bridge.
#[derive(Debug, Error)]
pub enum NetError {
    /// Network declaration is unusable
    #[error("configuration error: {0}")]
    Config(String),

    /// The bridge utility could not be started at all
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The bridge utility ran but reported failure
    #[error("`{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// Bridge device does not exist
    #[error("bridge device {0} does not exist")]
    NotFound(String),

    /// Member interfaces never appeared within the wait budget
    #[error("interface(s) {} did not appear after {waited:?}, not added to bridge {bridge}", members.join(", "))]
    MemberTimeout {
        bridge: String,
        members: Vec<String>,
        waited: std::time::Duration,
        /// What the pass did for the members that were present
        partial: Box<ConvergeReport>,
    },
}
