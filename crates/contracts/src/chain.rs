//! ChainWriter trait - pipeline stage interface
//!
//! Every stage of a write pipeline implements this trait; a stage forwards
//! units to the next one and `sum` yields the pipeline's digest.

use crate::{ContractError, Digest, WriteUnit};

/// Pipeline stage trait
#[trait_variant::make(ChainWriter: Send)]
pub trait LocalChainWriter {
    /// Accept one write unit
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn chain_write(&mut self, unit: WriteUnit) -> Result<(), ContractError>;

    /// Finish the pipeline and return its digest
    async fn sum(&mut self) -> Result<Digest, ContractError>;
}
