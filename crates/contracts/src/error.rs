//! Layered error definitions
//!
//! Categorized by source: config / write / store / general

use std::sync::Arc;

use thiserror::Error;

use crate::Address;

/// Unified error type
///
/// `Clone` so a stage can hand the same terminal failure to every caller
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Write Errors =====
    /// Malformed write unit (never retried)
    #[error("invalid data: write unit has no {missing}")]
    InvalidData { missing: &'static str },

    /// The enclosing operation was cancelled or timed out
    #[error("operation cancelled")]
    Cancelled,

    /// Local commit after a self-as-destination push failed
    #[error("local commit of chunk {address} failed: {message}")]
    LocalCommit { address: Address, message: String },

    /// A push task panicked instead of completing
    #[error("push task panicked: {message}")]
    TaskPanicked { message: String },

    /// `sum` was called on a stage with no downstream writer
    #[error("no terminal writer: stage has no downstream to finalize")]
    NoTerminalWriter,

    // ===== Store Errors =====
    /// Storage backend error
    #[error("store '{store}' error: {message}")]
    Store { store: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create local commit error
    pub fn local_commit(address: Address, message: impl Into<String>) -> Self {
        Self::LocalCommit {
            address,
            message: message.into(),
        }
    }

    /// Create store error
    pub fn store(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Whether this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::io::Error> for ContractError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
