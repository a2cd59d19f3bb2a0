// Thin re-export module: implementation is in `blockchain/core.rs`, split
// into block types, ledger state, validation and the chain forest.

pub mod core;
pub use self::core::*;
