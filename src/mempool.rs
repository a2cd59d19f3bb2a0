//! Transactions waiting to be included in a block.
//!
//! Entries are not validated on the way in; validity is decided against the
//! best tip's ledger when a block is assembled. Insertion order is kept
//! because assembly selects conflicting transactions first-come first-served.
//!
//! The pool has no size cap. Entries whose inputs are gone from every tip
//! are evicted after each accepted block; entries that stay spendable but
//! never verify (bad signatures, overspends) remain until they are mined
//! or removed.

use crate::blockchain::Sha256Hash;
use crate::transaction::{OutPoint, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mempool {
    transactions: HashMap<Sha256Hash, Transaction>,
    order: Vec<Sha256Hash>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a transaction with the same hash is already pooled.
    pub fn add_transaction(&mut self, tx: Transaction) -> bool {
        let hash = tx.hash();
        if self.transactions.contains_key(&hash) {
            return false;
        }
        self.order.push(hash);
        self.transactions.insert(hash, tx);
        true
    }

    pub fn get(&self, hash: &Sha256Hash) -> Option<&Transaction> {
        self.transactions.get(hash)
    }

    pub fn contains(&self, hash: &Sha256Hash) -> bool {
        self.transactions.contains_key(hash)
    }

    /// Pooled transactions in arrival order.
    pub fn contents(&self) -> Vec<Transaction> {
        self.order
            .iter()
            .filter_map(|hash| self.transactions.get(hash))
            .cloned()
            .collect()
    }

    pub fn remove_transaction(&mut self, hash: &Sha256Hash) -> Option<Transaction> {
        let removed = self.transactions.remove(hash)?;
        self.order.retain(|h| h != hash);
        Some(removed)
    }

    /// Drop every listed transaction that is pooled. Returns how many went.
    pub fn remove_transactions(&mut self, hashes: &[Sha256Hash]) -> usize {
        let doomed: HashSet<&Sha256Hash> = hashes
            .iter()
            .filter(|hash| self.transactions.contains_key(*hash))
            .collect();
        if doomed.is_empty() {
            return 0;
        }
        for hash in &doomed {
            self.transactions.remove(*hash);
        }
        self.order.retain(|h| !doomed.contains(&h));
        doomed.len()
    }

    /// Drop transactions that can never be mined: every input is neither
    /// `is_unspent` nor produced by another pooled transaction. Repeats until
    /// nothing changes, so dependents of an evicted entry go too. Returns how
    /// many went.
    pub fn evict_unspendable<F>(&mut self, is_unspent: F) -> usize
    where
        F: Fn(&OutPoint) -> bool,
    {
        let mut evicted = 0;
        loop {
            let pooled_outputs: HashSet<OutPoint> = self
                .transactions
                .values()
                .flat_map(|tx| tx.produced_outputs().map(|(id, _)| id))
                .collect();

            let doomed: Vec<Sha256Hash> = self
                .order
                .iter()
                .filter(|hash| {
                    self.transactions.get(*hash).is_some_and(|tx| {
                        !tx.inputs().is_empty()
                            && tx.inputs().iter().all(|input| {
                                !is_unspent(&input.prevout)
                                    && !pooled_outputs.contains(&input.prevout)
                            })
                    })
                })
                .copied()
                .collect();

            if doomed.is_empty() {
                return evicted;
            }
            evicted += self.remove_transactions(&doomed);
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
