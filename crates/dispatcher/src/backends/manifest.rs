//! ManifestWriter - terminal writer producing a pipeline digest
//!
//! Records every unit address in write order. `sum` packs the addresses into
//! one manifest chunk, addressed by its content, and hands that chunk to the
//! inner writer so it is replicated like any other chunk.

use bytes::{BufMut, Bytes, BytesMut};
use contracts::{Address, ChainWriter, Chunk, ContractError, Digest, WriteUnit, ADDRESS_LEN};
use tracing::{debug, instrument};

use crate::stage::Unchained;

/// Writer collecting addresses into a manifest chunk
pub struct ManifestWriter<W = Unchained> {
    entries: Vec<Address>,
    inner: Option<W>,
}

impl ManifestWriter<Unchained> {
    /// Manifest writer that only computes the digest
    pub fn standalone() -> Self {
        Self {
            entries: Vec::new(),
            inner: None,
        }
    }
}

impl<W: ChainWriter> ManifestWriter<W> {
    /// Manifest writer storing its manifest chunk through `inner`
    pub fn new(inner: W) -> Self {
        Self {
            entries: Vec::new(),
            inner: Some(inner),
        }
    }

    /// Addresses recorded so far
    pub fn entries(&self) -> &[Address] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn inner(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    /// Manifest chunk for the addresses recorded so far
    pub fn manifest(&self) -> Chunk {
        let mut payload = BytesMut::with_capacity(self.entries.len() * ADDRESS_LEN);
        for address in &self.entries {
            payload.put_slice(address.as_bytes());
        }
        Chunk::from_content(payload.freeze())
    }

    /// Addresses packed in a manifest payload
    ///
    /// # Errors
    /// `Other` if the payload is not a whole number of addresses
    pub fn decode(payload: &Bytes) -> Result<Vec<Address>, ContractError> {
        if payload.len() % ADDRESS_LEN != 0 {
            return Err(ContractError::Other(format!(
                "manifest length {} is not a multiple of {}",
                payload.len(),
                ADDRESS_LEN
            )));
        }
        Ok(payload
            .chunks_exact(ADDRESS_LEN)
            .filter_map(Address::from_slice)
            .collect())
    }
}

impl<W: ChainWriter> ChainWriter for ManifestWriter<W> {
    async fn chain_write(&mut self, unit: WriteUnit) -> Result<(), ContractError> {
        let address = unit
            .address
            .ok_or(ContractError::InvalidData { missing: "address" })?;
        self.entries.push(address);
        Ok(())
    }

    #[instrument(name = "manifest_writer_sum", skip(self), fields(entries = self.entries.len()))]
    async fn sum(&mut self) -> Result<Digest, ContractError> {
        let manifest = self.manifest();
        let digest = *manifest.address();

        if let Some(inner) = self.inner.as_mut() {
            inner.chain_write(manifest.into()).await?;
        }
        debug!(digest = %digest, "manifest written");

        Ok(digest)
    }
}
