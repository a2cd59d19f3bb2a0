/// Validation logic for transactions separated from type definitions
use crate::blockchain::UtxoSet;
use crate::crypto::{Secp256k1Verifier, SignatureVerifier};
use crate::error::ChainError;
use crate::transaction::types::Transaction;
use std::collections::HashSet;
use std::sync::Arc;

/// Checks transactions against a ledger state.
///
/// Holds no ledger of its own: every call names the state it validates
/// against, and that state is never mutated.
#[derive(Clone)]
pub struct TxValidator {
    verifier: Arc<dyn SignatureVerifier>,
}

impl Default for TxValidator {
    fn default() -> Self {
        Self::new(Arc::new(Secp256k1Verifier))
    }
}

impl std::fmt::Debug for TxValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("TxValidator").finish_non_exhaustive()
    }
}

impl TxValidator {
    pub fn new(verifier: Arc<dyn SignatureVerifier>) -> Self {
        TxValidator { verifier }
    }

    /// Full validation of `tx` against `ledger`. Returns the implicit fee.
    pub fn check(&self, tx: &Transaction, ledger: &UtxoSet) -> Result<i64, ChainError> {
        tx.validate_size()?;

        let mut seen = HashSet::with_capacity(tx.inputs().len());
        let mut input_total: i64 = 0;

        for (index, input) in tx.inputs().iter().enumerate() {
            if !seen.insert(input.prevout) {
                return Err(ChainError::DoubleSpendDetected(format!(
                    "Outpoint {} referenced twice in transaction {}",
                    input.prevout,
                    tx.hash_str()
                )));
            }

            let spent = ledger.lookup(&input.prevout).ok_or_else(|| {
                ChainError::UtxoNotFound(format!(
                    "Input {} of transaction {} spends unknown outpoint {}",
                    index,
                    tx.hash_str(),
                    input.prevout
                ))
            })?;

            let signature = input.signature.as_deref().ok_or_else(|| {
                ChainError::InvalidSignature(format!(
                    "Input {} of transaction {} is not signed",
                    index,
                    tx.hash_str()
                ))
            })?;
            let message = tx.signable_message(index).ok_or_else(|| {
                ChainError::InvalidTransaction(format!("No input at index {}", index))
            })?;
            if !self.verifier.verify(&spent.recipient, &message, signature) {
                return Err(ChainError::InvalidSignature(format!(
                    "Input {} of transaction {} does not verify against {}",
                    index,
                    tx.hash_str(),
                    input.prevout
                )));
            }

            input_total = input_total.checked_add(spent.value).ok_or_else(|| {
                ChainError::InvalidTransaction("Input value overflow".to_string())
            })?;
        }

        let mut output_total: i64 = 0;
        for (index, output) in tx.outputs().iter().enumerate() {
            if output.value < 0 {
                return Err(ChainError::InvalidTransaction(format!(
                    "Output {} of transaction {} has negative value {}",
                    index,
                    tx.hash_str(),
                    output.value
                )));
            }
            output_total = output_total.checked_add(output.value).ok_or_else(|| {
                ChainError::InvalidTransaction("Output value overflow".to_string())
            })?;
        }

        if input_total < output_total {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction {} spends {} but only has {} in inputs",
                tx.hash_str(),
                output_total,
                input_total
            )));
        }

        Ok(input_total - output_total)
    }

    pub fn validate(&self, tx: &Transaction, ledger: &UtxoSet) -> bool {
        self.check(tx, ledger).is_ok()
    }

    /// The fee `tx` would pay against `ledger`, if it is valid there.
    pub fn fee(&self, tx: &Transaction, ledger: &UtxoSet) -> Option<i64> {
        self.check(tx, ledger).ok()
    }

    /// Accept candidates in order, each judged against the state left by
    /// the ones accepted before it. Conflicts resolve in favour of the
    /// earlier candidate. Returns the accepted transactions and the
    /// resulting working state; `ledger` itself is left untouched.
    pub fn select_valid_subset(
        &self,
        candidates: &[Transaction],
        ledger: &UtxoSet,
    ) -> (Vec<Transaction>, UtxoSet) {
        let mut working = ledger.clone();
        let mut accepted = Vec::with_capacity(candidates.len());

        for tx in candidates {
            match self.check(tx, &working) {
                Ok(_) => {
                    working.apply_transaction(tx);
                    accepted.push(tx.clone());
                }
                Err(e) => {
                    tracing::debug!("Skipping transaction {}: {}", tx.hash_str(), e);
                }
            }
        }

        (accepted, working)
    }
}
