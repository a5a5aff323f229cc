//! # Contracts
//!
//! Frozen interface contracts shared by every stage of the chunk push
//! pipeline: content addresses, chunks, write units, the collaborator
//! traits (replicator, local committer, chain writer) and configuration.
//! All business crates depend on this crate, never the other way around.
//!
//! ## Addressing Model
//! - An [`Address`] is a 32-byte content-derived identifier
//! - Proximity between addresses is XOR distance
//! - A pipeline's final [`Digest`] is address-shaped

mod address;
mod blueprint;
mod chain;
mod chunk;
mod committer;
mod error;
mod replicator;

pub use address::{Address, ADDRESS_LEN};
pub use blueprint::*;
pub use chain::*;
pub use chunk::*;
pub use committer::*;
pub use error::*;
pub use replicator::*;
