use crate::crypto::PublicKeyBytes;
use crate::transaction::{OutPoint, Transaction, TxOutput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unspent outputs keyed by outpoint. A present entry means "unspent".
///
/// Pure store: no validation happens here. `Clone` is a deep copy, which
/// is what lets validators work on a scratch copy while published states
/// stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoSet {
    utxos: HashMap<OutPoint, TxOutput>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: &OutPoint) -> Option<&TxOutput> {
        self.utxos.get(id)
    }

    pub fn contains(&self, id: &OutPoint) -> bool {
        self.utxos.contains_key(id)
    }

    pub fn insert(&mut self, id: OutPoint, record: TxOutput) {
        self.utxos.insert(id, record);
    }

    pub fn remove(&mut self, id: &OutPoint) -> Option<TxOutput> {
        self.utxos.remove(id)
    }

    /// Every entry, ordered by outpoint so callers see a stable sequence.
    pub fn all_entries(&self) -> Vec<(OutPoint, TxOutput)> {
        let mut entries: Vec<_> = self
            .utxos
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// Remove what `tx` consumes and insert what it produces.
    pub fn apply_transaction(&mut self, tx: &Transaction) {
        for input in tx.inputs() {
            self.utxos.remove(&input.prevout);
        }
        for (id, output) in tx.produced_outputs() {
            self.utxos.insert(id, output.clone());
        }
    }

    pub fn add_coinbase(&mut self, coinbase: &Transaction) {
        for (id, output) in coinbase.produced_outputs() {
            self.utxos.insert(id, output.clone());
        }
    }

    /// Sum of every unspent value. Accumulated in `i128`, so the result is
    /// exact for any set of `i64` outputs.
    pub fn total_value(&self) -> i128 {
        self.utxos
            .values()
            .map(|output| i128::from(output.value))
            .sum()
    }

    /// Sum of the unspent values paying `recipient`, exact like
    /// [`total_value`](Self::total_value).
    pub fn balance_of(&self, recipient: &PublicKeyBytes) -> i128 {
        self.utxos
            .values()
            .filter(|output| &output.recipient == recipient)
            .map(|output| i128::from(output.value))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outpoint(seed: u8, index: u32) -> OutPoint {
        OutPoint::new([seed; 32], index)
    }

    #[test]
    fn test_insert_lookup_remove() {
        let mut set = UtxoSet::new();
        let id = outpoint(1, 0);
        set.insert(id, TxOutput::new(10, vec![2; 33]));

        assert!(set.contains(&id));
        assert_eq!(set.lookup(&id).map(|o| o.value), Some(10));
        assert_eq!(set.remove(&id).map(|o| o.value), Some(10));
        assert!(set.lookup(&id).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = UtxoSet::new();
        original.insert(outpoint(1, 0), TxOutput::new(5, vec![2; 33]));

        let mut copy = original.clone();
        copy.remove(&outpoint(1, 0));
        copy.insert(outpoint(9, 1), TxOutput::new(7, vec![3; 33]));

        assert_eq!(original.len(), 1);
        assert!(original.contains(&outpoint(1, 0)));
        assert!(!original.contains(&outpoint(9, 1)));
    }

    #[test]
    fn test_all_entries_sorted() {
        let mut set = UtxoSet::new();
        set.insert(outpoint(3, 0), TxOutput::new(1, vec![]));
        set.insert(outpoint(1, 2), TxOutput::new(1, vec![]));
        set.insert(outpoint(1, 1), TxOutput::new(1, vec![]));

        let ids: Vec<_> = set.all_entries().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![outpoint(1, 1), outpoint(1, 2), outpoint(3, 0)]);
    }

    #[test]
    fn test_apply_transaction_moves_outputs() {
        let mut set = UtxoSet::new();
        let funding = Transaction::coinbase(20, vec![2; 33], 0);
        set.add_coinbase(&funding);

        let mut spend = Transaction::new();
        spend.add_input(funding.hash(), 0);
        spend.add_output(12, vec![3; 33]);
        spend.add_output(8, vec![2; 33]);
        spend.finalize();

        set.apply_transaction(&spend);
        assert!(!set.contains(&OutPoint::new(funding.hash(), 0)));
        assert_eq!(set.len(), 2);
        assert_eq!(set.balance_of(&vec![3; 33]), 12);
        assert_eq!(set.balance_of(&vec![2; 33]), 8);
    }

    #[test]
    fn test_sums_do_not_overflow() {
        let mut set = UtxoSet::new();
        set.insert(outpoint(1, 0), TxOutput::new(i64::MAX, vec![2; 33]));
        set.insert(outpoint(2, 0), TxOutput::new(i64::MAX, vec![2; 33]));
        set.insert(outpoint(3, 0), TxOutput::new(5, vec![3; 33]));

        let doubled = 2 * i128::from(i64::MAX);
        assert_eq!(set.balance_of(&vec![2; 33]), doubled);
        assert_eq!(set.total_value(), doubled + 5);
    }
}
