/// Transaction types for forkledger
use crate::blockchain::Sha256Hash;
use crate::crypto::PublicKeyBytes;
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum transaction size in bytes (100KB) to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

/// Identifies one spendable output: the producing transaction and its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_hash: Sha256Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(tx_hash: Sha256Hash, index: u32) -> Self {
        OutPoint { tx_hash, index }
    }
}

impl std::fmt::Display for OutPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", hex::encode(self.tx_hash), self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub prevout: OutPoint,
    pub signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: i64,
    pub recipient: PublicKeyBytes,
}

impl TxOutput {
    pub fn new(value: i64, recipient: PublicKeyBytes) -> Self {
        TxOutput { value, recipient }
    }
}

/// A transfer of value from spent outputs to new outputs.
///
/// Built incrementally with [`add_input`](Self::add_input),
/// [`add_output`](Self::add_output) and [`add_signature`](Self::add_signature),
/// then sealed with [`finalize`](Self::finalize), which fixes the content hash.
/// A transaction without inputs is a coinbase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    /// Only distinguishes otherwise identical coinbase transactions.
    nonce: u64,
    hash: Sha256Hash,
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl Transaction {
    pub fn new() -> Self {
        Transaction {
            inputs: Vec::new(),
            outputs: Vec::new(),
            nonce: 0,
            hash: [0u8; 32],
        }
    }

    /// A finalized coinbase paying `value` to `recipient`.
    pub fn coinbase(value: i64, recipient: PublicKeyBytes, nonce: u64) -> Self {
        let mut tx = Transaction::new();
        tx.nonce = nonce;
        tx.add_output(value, recipient);
        tx.finalize();
        tx
    }

    pub fn add_input(&mut self, prev_tx_hash: Sha256Hash, output_index: u32) {
        self.inputs.push(TxInput {
            prevout: OutPoint::new(prev_tx_hash, output_index),
            signature: None,
        });
    }

    pub fn add_output(&mut self, value: i64, recipient: PublicKeyBytes) {
        self.outputs.push(TxOutput::new(value, recipient));
    }

    pub fn add_signature(&mut self, signature: Vec<u8>, input_index: usize) -> Result<(), ChainError> {
        let input = self.inputs.get_mut(input_index).ok_or_else(|| {
            ChainError::InvalidTransaction(format!("No input at index {}", input_index))
        })?;
        input.signature = Some(signature);
        Ok(())
    }

    /// The bytes the owner of input `input_index` signs: the spent outpoint
    /// followed by every output.
    pub fn signable_message(&self, input_index: usize) -> Option<Vec<u8>> {
        let input = self.inputs.get(input_index)?;
        let mut message = Vec::new();
        message.extend_from_slice(&input.prevout.tx_hash);
        message.extend_from_slice(&input.prevout.index.to_le_bytes());
        for output in &self.outputs {
            message.extend_from_slice(&output.value.to_le_bytes());
            message.extend_from_slice(&output.recipient);
        }
        Some(message)
    }

    /// Seal the transaction and return its content hash.
    pub fn finalize(&mut self) -> Sha256Hash {
        self.hash = self.compute_hash();
        self.hash
    }

    fn compute_hash(&self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        hasher.update((self.inputs.len() as u64).to_le_bytes());
        for input in &self.inputs {
            hasher.update(input.prevout.tx_hash);
            hasher.update(input.prevout.index.to_le_bytes());
            match &input.signature {
                Some(sig) => {
                    hasher.update((sig.len() as u64).to_le_bytes());
                    hasher.update(sig);
                }
                None => hasher.update(u64::MAX.to_le_bytes()),
            }
        }
        hasher.update((self.outputs.len() as u64).to_le_bytes());
        for output in &self.outputs {
            hasher.update(output.value.to_le_bytes());
            hasher.update((output.recipient.len() as u64).to_le_bytes());
            hasher.update(&output.recipient);
        }
        hasher.update(self.nonce.to_le_bytes());
        hasher.finalize().into()
    }

    pub fn hash(&self) -> Sha256Hash {
        self.hash
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Outpoints this transaction creates, paired with their records.
    pub fn produced_outputs(&self) -> impl Iterator<Item = (OutPoint, &TxOutput)> + '_ {
        self.outputs
            .iter()
            .enumerate()
            .map(move |(i, output)| (OutPoint::new(self.hash, i as u32), output))
    }

    /// Validate transaction size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = bincode::serialize(self)?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}
