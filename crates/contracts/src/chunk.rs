//! Chunk and WriteUnit - pipeline payload types

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{Address, ContractError};

/// Final identifying value of a completed pipeline
pub type Digest = Address;

/// Immutable content-addressed unit of data.
///
/// The address is trusted to be the one the upstream pipeline computed for
/// the payload; nothing downstream re-derives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    address: Address,
    payload: Bytes,
}

impl Chunk {
    /// Create a chunk from an address and its payload
    pub fn new(address: Address, payload: impl Into<Bytes>) -> Self {
        Self {
            address,
            payload: payload.into(),
        }
    }

    /// Create a chunk addressed by the BLAKE3 digest of its payload
    pub fn from_content(payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            address: Address::from_content(&payload),
            payload,
        }
    }

    /// Chunk address
    #[inline]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Chunk payload
    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Argument of a single pipeline write.
///
/// Both fields must be present; a unit with either missing is a
/// precondition violation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteUnit {
    /// Content address computed upstream
    pub address: Option<Address>,
    /// Raw chunk bytes
    pub payload: Option<Bytes>,
}

impl WriteUnit {
    /// Create a complete write unit
    pub fn new(address: Address, payload: impl Into<Bytes>) -> Self {
        Self {
            address: Some(address),
            payload: Some(payload.into()),
        }
    }

    /// Write unit carrying an existing chunk
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            address: Some(chunk.address),
            payload: Some(chunk.payload.clone()),
        }
    }

    /// Build the chunk this unit describes
    ///
    /// # Errors
    /// `InvalidData` when the address or the payload is missing
    pub fn to_chunk(&self) -> Result<Chunk, ContractError> {
        let address = self
            .address
            .ok_or(ContractError::InvalidData { missing: "address" })?;
        let payload = self
            .payload
            .clone()
            .ok_or(ContractError::InvalidData { missing: "payload" })?;
        Ok(Chunk { address, payload })
    }
}

impl From<Chunk> for WriteUnit {
    fn from(chunk: Chunk) -> Self {
        Self {
            address: Some(chunk.address),
            payload: Some(chunk.payload),
        }
    }
}

/// Local store write mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PutMode {
    /// Chunk uploaded locally, still has to be pushed
    #[default]
    Upload,
    /// Chunk whose network replication is already satisfied
    Sync,
    /// Chunk retrieved on request from another peer
    Request,
}

/// Acknowledgement of a successful push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// Address of the pushed chunk
    pub address: Address,
    /// Overlay address of the peer that stored it
    pub storer: Address,
}
