// core.rs splits chain responsibilities into submodules: block types,
// ledger state, block-level validation and the fork-aware block forest.
pub mod chain;
pub mod forest;
pub mod state;
pub mod validation;

pub use chain::*;
pub use forest::*;
pub use state::*;
pub use validation::*;
