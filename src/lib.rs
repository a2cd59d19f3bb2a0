//! forkledger - a single-node UTXO ledger core with fork choice
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, UTXO ledger state and the fork-aware chain forest
//! - [`transaction`] - Transaction types and validation
//! - [`mempool`] - Transactions awaiting inclusion
//! - [`node`] - Admission, block assembly and snapshot reads
//!
//! ## Cryptography
//! - [`crypto`] - Signatures and verification (secp256k1)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`logging`] - Tracing subscriber setup
//! - [`clock`] - Arrival-time sources
//! - [`error`] - Error and admission outcome types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod node;
pub mod transaction;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use blockchain::{Block, BlockNode, ChainForest, Sha256Hash, UtxoSet};
pub use error::{BlockOutcome, ChainError, Result};
pub use mempool::Mempool;
pub use node::{ChainSnapshot, Node};
pub use transaction::{OutPoint, Transaction, TxInput, TxOutput, TxValidator};
