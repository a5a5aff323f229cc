//! LocalCommitter trait - direct local storage interface

use crate::{Chunk, ContractError, PutMode};

/// Local chunk storage trait
///
/// Used by the push stage only when the local node is the chunk's
/// final destination.
#[trait_variant::make(LocalCommitter: Send)]
pub trait LocalChunkPutter {
    /// Persist `chunk` with the given mode
    ///
    /// Returns `true` if the chunk was already present.
    async fn put(&self, mode: PutMode, chunk: &Chunk) -> Result<bool, ContractError>;
}
