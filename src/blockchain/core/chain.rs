use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub type Sha256Hash = [u8; 32];

/// A block: a parent link, a coinbase and an ordered list of transactions.
///
/// Only the genesis block has no previous hash. The content hash is fixed by
/// [`finalize`](Self::finalize); blocks are treated as immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    previous_hash: Option<Sha256Hash>,
    coinbase: Transaction,
    transactions: Vec<Transaction>,
    hash: Sha256Hash,
}

impl Block {
    pub fn new(previous_hash: Option<Sha256Hash>, coinbase: Transaction) -> Self {
        Block {
            previous_hash,
            coinbase,
            transactions: Vec::new(),
            hash: [0u8; 32],
        }
    }

    /// Genesis block paying `coinbase` and nothing else, already finalized.
    pub fn genesis(coinbase: Transaction) -> Self {
        let mut block = Block::new(None, coinbase);
        block.finalize();
        block
    }

    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn with_transactions(mut self, transactions: Vec<Transaction>) -> Self {
        self.transactions = transactions;
        self
    }

    /// Seal the block and return its content hash.
    pub fn finalize(&mut self) -> Sha256Hash {
        let mut hasher = Sha256::new();
        match self.previous_hash {
            Some(prev) => {
                hasher.update([1u8]);
                hasher.update(prev);
            }
            None => hasher.update([0u8]),
        }
        hasher.update(self.coinbase.hash());
        hasher.update((self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            hasher.update(tx.hash());
        }
        self.hash = hasher.finalize().into();
        self.hash
    }

    pub fn hash(&self) -> Sha256Hash {
        self.hash
    }

    pub fn hash_str(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn previous_hash(&self) -> Option<Sha256Hash> {
        self.previous_hash
    }

    pub fn coinbase(&self) -> &Transaction {
        &self.coinbase
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Hashes of every transaction the block carries, coinbase included.
    pub fn transaction_hashes(&self) -> Vec<Sha256Hash> {
        std::iter::once(self.coinbase.hash())
            .chain(self.transactions.iter().map(Transaction::hash))
            .collect()
    }

    /// Serialized size, for callers that budget block space.
    pub fn serialized_size(&self) -> Result<usize, ChainError> {
        Ok(bincode::serialized_size(self)? as usize)
    }
}
