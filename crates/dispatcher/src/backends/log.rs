//! LogWriter - logs unit summaries via tracing

use contracts::{ChainWriter, ContractError, Digest, WriteUnit};
use tracing::{info, instrument};

/// Pass-through writer that logs every unit before forwarding it
pub struct LogWriter<W> {
    name: String,
    inner: W,
    units: u64,
    bytes: u64,
}

impl<W: ChainWriter> LogWriter<W> {
    /// Wrap `inner`, tagging log lines with `name`
    pub fn new(name: impl Into<String>, inner: W) -> Self {
        Self {
            name: name.into(),
            inner,
            units: 0,
            bytes: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units forwarded so far
    pub fn units(&self) -> u64 {
        self.units
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    fn log_unit(&self, unit: &WriteUnit) {
        let address = unit
            .address
            .map(|a| a.short())
            .unwrap_or_else(|| "<none>".to_string());
        let size = unit.payload.as_ref().map_or(0, |p| p.len());

        info!(
            writer = %self.name,
            seq = self.units,
            address = %address,
            size,
            "WriteUnit received"
        );
    }
}

impl<W: ChainWriter> ChainWriter for LogWriter<W> {
    #[instrument(name = "log_writer_write", skip(self, unit), fields(writer = %self.name))]
    async fn chain_write(&mut self, unit: WriteUnit) -> Result<(), ContractError> {
        self.log_unit(&unit);
        let size = unit.payload.as_ref().map_or(0, |p| p.len()) as u64;
        self.inner.chain_write(unit).await?;
        self.units += 1;
        self.bytes += size;
        Ok(())
    }

    #[instrument(name = "log_writer_sum", skip(self), fields(writer = %self.name))]
    async fn sum(&mut self) -> Result<Digest, ContractError> {
        let digest = self.inner.sum().await?;
        info!(
            writer = %self.name,
            units = self.units,
            bytes = self.bytes,
            digest = %digest,
            "LogWriter finished"
        );
        Ok(digest)
    }
}
