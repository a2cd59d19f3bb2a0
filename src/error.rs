//! Error and admission outcome types for forkledger

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("UTXO not found: {0}")]
    UtxoNotFound(String),

    #[error("Double spend detected: {0}")]
    DoubleSpendDetected(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

/// Result of offering a block to the chain forest.
///
/// Rejections are expected, recoverable conditions (orphans, stale forks,
/// bad transactions) and are reported as values rather than errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockOutcome {
    Accepted,
    /// Previous hash absent, or parent not among the retained nodes.
    RejectedMissingParent,
    /// Parent lies further than the cutoff age behind the best tip.
    RejectedTooOld,
    /// At least one listed transaction (or the coinbase) failed validation.
    RejectedInvalidTransactions,
    /// A node with this block hash is already retained.
    RejectedDuplicate,
}

impl BlockOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, BlockOutcome::Accepted)
    }
}

impl std::fmt::Display for BlockOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BlockOutcome::Accepted => write!(f, "accepted"),
            BlockOutcome::RejectedMissingParent => write!(f, "rejected: missing parent"),
            BlockOutcome::RejectedTooOld => write!(f, "rejected: parent too old"),
            BlockOutcome::RejectedInvalidTransactions => {
                write!(f, "rejected: invalid transactions")
            }
            BlockOutcome::RejectedDuplicate => write!(f, "rejected: duplicate block"),
        }
    }
}
