use std::net::SocketAddr;

use thiserror::Error;

use crate::identifier::Id;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("Peer {addr} unreachable: {reason}")]
    Unreachable { addr: SocketAddr, reason: String },

    #[error("Call to {addr} timed out")]
    Timeout { addr: SocketAddr },

    #[error("No live root reachable for {0}")]
    RootUnreachable(Id),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Identifier {0} is already in use by a live node")]
    IdInUse(Id),

    #[error("Protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u16, got: u16 },

    #[error("Unexpected response to {0}")]
    UnexpectedResponse(&'static str),

    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Consistency layer error: {0}")]
    Consistency(String),

    #[error("Node has left the mesh")]
    NodeStopped,
}

impl OverlayError {
    /// Failures worth retrying against another candidate.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OverlayError::Unreachable { .. }
                | OverlayError::Timeout { .. }
                | OverlayError::NodeStopped
        )
    }
}

pub type Result<T> = std::result::Result<T, OverlayError>;
