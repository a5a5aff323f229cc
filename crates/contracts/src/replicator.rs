//! Replicator trait - network push interface
//!
//! Pushes a chunk to the peer topologically closest to its address.

use thiserror::Error;

use crate::{Chunk, Receipt};

/// Outcome of a failed push attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    /// The local node is itself the closest peer; network replication has
    /// already been handled by the protocol layer
    #[error("local node is the closest peer")]
    WantSelf,

    /// No peer is currently reachable
    #[error("no peer available for push")]
    NoPeer,

    /// Transport or peer-side failure
    #[error("push transport error: {message}")]
    Transport { message: String },
}

impl PushError {
    /// Create transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Whether this is the self-as-destination condition
    pub fn is_want_self(&self) -> bool {
        matches!(self, Self::WantSelf)
    }
}

/// Network replication trait
#[trait_variant::make(Replicator: Send)]
pub trait LocalReplicator {
    /// Push `chunk` to the peer closest to its address
    ///
    /// # Errors
    /// `PushError::WantSelf` when this node is the closest peer; any other
    /// variant is a transient failure
    async fn push_to_closest(&self, chunk: &Chunk) -> Result<Receipt, PushError>;
}
