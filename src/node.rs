//! Chain orchestration: the public face of the ledger core.
//!
//! All admission (transactions, external blocks, locally assembled blocks)
//! runs under one writer lock. After every change the writer publishes an
//! immutable [`ChainSnapshot`]; readers only ever clone the `Arc` of the
//! latest snapshot and never see a half-applied update.

use crate::blockchain::{Block, ChainForest, Sha256Hash, UtxoSet};
use crate::clock::{Clock, SystemClock};
use crate::config::ChainConfig;
use crate::crypto::PublicKeyBytes;
use crate::error::BlockOutcome;
use crate::mempool::Mempool;
use crate::transaction::{Transaction, TxValidator};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Consistent view of the best tip and pending transactions.
#[derive(Debug, Clone)]
pub struct ChainSnapshot {
    pub best_block: Arc<Block>,
    pub best_height: u64,
    pub utxo_set: Arc<UtxoSet>,
    pub mempool: Arc<Mempool>,
    /// Best tip first, back to the oldest retained ancestor.
    pub best_chain: Vec<Sha256Hash>,
    pub retained_nodes: usize,
}

struct ChainCore {
    forest: ChainForest,
    mempool: Arc<Mempool>,
}

impl ChainCore {
    fn snapshot(&self) -> ChainSnapshot {
        let best = self.forest.get_max_height_node();
        ChainSnapshot {
            best_block: Arc::clone(best.block()),
            best_height: best.height(),
            utxo_set: Arc::clone(best.utxo_set()),
            mempool: Arc::clone(&self.mempool),
            best_chain: self.forest.ancestry(&best.hash()),
            retained_nodes: self.forest.len(),
        }
    }
}

pub struct Node {
    core: Mutex<ChainCore>,
    published: RwLock<Arc<ChainSnapshot>>,
    coinbase_reward: i64,
}

impl Node {
    /// A node on the wall clock with secp256k1 signature checks.
    pub fn new(genesis: Block, config: ChainConfig) -> Self {
        Self::with_parts(genesis, config, TxValidator::default(), Arc::new(SystemClock))
    }

    pub fn with_parts(
        genesis: Block,
        config: ChainConfig,
        validator: TxValidator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let coinbase_reward = config.coinbase_reward;
        let core = ChainCore {
            forest: ChainForest::new(genesis, config, validator, clock),
            mempool: Arc::new(Mempool::new()),
        };
        let published = RwLock::new(Arc::new(core.snapshot()));
        Node {
            core: Mutex::new(core),
            published,
            coinbase_reward,
        }
    }

    /// Pool `tx` for a future block. No validation happens here.
    pub fn submit_transaction(&self, tx: Transaction) {
        let mut core = self.core.lock();
        let mut mempool = (*core.mempool).clone();
        if mempool.add_transaction(tx) {
            core.mempool = Arc::new(mempool);
            self.publish(&core);
        }
    }

    /// Offer an externally received block.
    pub fn submit_block(&self, block: Block) -> BlockOutcome {
        let mut core = self.core.lock();
        self.admit(&mut core, block)
    }

    /// Build a block on the best tip from the valid part of the mempool,
    /// paying the coinbase to `miner_key`, and admit it like any other block.
    /// Returns the block if it was accepted.
    pub fn assemble_block(&self, miner_key: PublicKeyBytes) -> Option<Block> {
        let mut core = self.core.lock();

        let parent = core.forest.get_max_height_node();
        let parent_hash = parent.hash();
        let height = parent.height() + 1;
        let candidates = core.mempool.contents();
        let (accepted, _) = core
            .forest
            .validator()
            .select_valid_subset(&candidates, parent.utxo_set());

        debug!(
            "Assembling block at height {} with {} of {} pooled transactions",
            height,
            accepted.len(),
            candidates.len()
        );

        let coinbase = Transaction::coinbase(self.coinbase_reward, miner_key, height);
        let mut block = Block::new(Some(parent_hash), coinbase).with_transactions(accepted);
        block.finalize();

        match self.admit(&mut core, block.clone()) {
            BlockOutcome::Accepted => Some(block),
            outcome => {
                warn!("Assembled block {} was {}", block.hash_str(), outcome);
                None
            }
        }
    }

    /// The one admission routine shared by external and assembled blocks.
    fn admit(&self, core: &mut ChainCore, block: Block) -> BlockOutcome {
        let tx_hashes = block.transaction_hashes();
        let outcome = core.forest.add_block(block);

        if outcome.is_accepted() {
            let mut mempool = (*core.mempool).clone();
            let purged = mempool.remove_transactions(&tx_hashes);
            if purged > 0 {
                info!("Purged {} transactions from the mempool", purged);
            }

            // Assembly only builds on tips, so an outpoint spent on all of
            // them can never fund a pooled transaction again.
            let tip_ledgers: Vec<Arc<UtxoSet>> = core
                .forest
                .tips()
                .iter()
                .filter_map(|hash| core.forest.get_node(hash))
                .map(|node| Arc::clone(node.utxo_set()))
                .collect();
            let evicted = mempool
                .evict_unspendable(|id| tip_ledgers.iter().any(|ledger| ledger.contains(id)));
            if evicted > 0 {
                info!("Evicted {} unspendable transactions from the mempool", evicted);
            }
            core.mempool = Arc::new(mempool);
            self.publish(core);
        }

        outcome
    }

    fn publish(&self, core: &ChainCore) {
        let snapshot = Arc::new(core.snapshot());
        *self.published.write() = snapshot;
    }

    pub fn snapshot(&self) -> Arc<ChainSnapshot> {
        self.published.read().clone()
    }

    pub fn get_max_height_block(&self) -> Arc<Block> {
        Arc::clone(&self.snapshot().best_block)
    }

    pub fn get_max_height_utxo_pool(&self) -> Arc<UtxoSet> {
        Arc::clone(&self.snapshot().utxo_set)
    }

    pub fn get_transaction_pool(&self) -> Arc<Mempool> {
        Arc::clone(&self.snapshot().mempool)
    }

    pub fn best_height(&self) -> u64 {
        self.snapshot().best_height
    }

    pub fn best_chain(&self) -> Vec<Sha256Hash> {
        self.snapshot().best_chain.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::KeyPair;

    fn node_with_genesis(miner: &KeyPair) -> (Node, Block) {
        let genesis = Block::genesis(Transaction::coinbase(25, miner.public_key_bytes(), 0));
        let node = Node::with_parts(
            genesis.clone(),
            ChainConfig::default(),
            TxValidator::default(),
            Arc::new(ManualClock::new(0)),
        );
        (node, genesis)
    }

    fn pay(from: &KeyPair, prev: Sha256Hash, index: u32, value: i64, to: &KeyPair) -> Transaction {
        let mut tx = Transaction::new();
        tx.add_input(prev, index);
        tx.add_output(value, to.public_key_bytes());
        let message = tx.signable_message(0).unwrap();
        tx.add_signature(from.sign(&message).unwrap(), 0).unwrap();
        tx.finalize();
        tx
    }

    #[test]
    fn test_initial_snapshot() {
        let miner = KeyPair::generate().unwrap();
        let (node, genesis) = node_with_genesis(&miner);

        let snapshot = node.snapshot();
        assert_eq!(snapshot.best_block.hash(), genesis.hash());
        assert_eq!(snapshot.best_height, 0);
        assert_eq!(snapshot.best_chain, vec![genesis.hash()]);
        assert!(snapshot.mempool.is_empty());
    }

    #[test]
    fn test_submit_transaction_publishes_new_pool() {
        let miner = KeyPair::generate().unwrap();
        let (node, genesis) = node_with_genesis(&miner);
        let before = node.get_transaction_pool();

        let tx = pay(&miner, genesis.coinbase().hash(), 0, 25, &miner);
        node.submit_transaction(tx.clone());
        node.submit_transaction(tx.clone());

        assert!(before.is_empty());
        assert_eq!(node.get_transaction_pool().len(), 1);
        assert!(node.get_transaction_pool().contains(&tx.hash()));
    }

    #[test]
    fn test_assemble_block_spends_pool() {
        let miner = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let (node, genesis) = node_with_genesis(&miner);

        let tx = pay(&miner, genesis.coinbase().hash(), 0, 20, &bob);
        node.submit_transaction(tx.clone());

        let block = node.assemble_block(miner.public_key_bytes()).unwrap();
        assert_eq!(block.transactions(), &[tx.clone()]);
        assert_eq!(block.previous_hash(), Some(genesis.hash()));
        assert_eq!(node.best_height(), 1);
        assert!(node.get_transaction_pool().is_empty());

        let utxos = node.get_max_height_utxo_pool();
        assert_eq!(utxos.balance_of(&bob.public_key_bytes()), 20);
        assert_eq!(utxos.balance_of(&miner.public_key_bytes()), 25);
    }

    #[test]
    fn test_assemble_skips_invalid_and_keeps_them_pooled() {
        let miner = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let (node, genesis) = node_with_genesis(&miner);

        let good = pay(&miner, genesis.coinbase().hash(), 0, 25, &bob);
        let conflicting = pay(&miner, genesis.coinbase().hash(), 0, 24, &miner);
        node.submit_transaction(good.clone());
        node.submit_transaction(conflicting.clone());

        let block = node.assemble_block(miner.public_key_bytes()).unwrap();
        assert_eq!(block.transactions(), &[good]);

        let pool = node.get_transaction_pool();
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&conflicting.hash()));
    }

    #[test]
    fn test_stale_resubmission_is_evicted() {
        let miner = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let (node, genesis) = node_with_genesis(&miner);

        let tx = pay(&miner, genesis.coinbase().hash(), 0, 25, &bob);
        node.submit_transaction(tx.clone());
        node.assemble_block(miner.public_key_bytes()).unwrap();

        // Already mined: its input is spent on the only tip.
        node.submit_transaction(tx.clone());
        assert!(node.get_transaction_pool().contains(&tx.hash()));

        let block = node.assemble_block(miner.public_key_bytes()).unwrap();
        assert!(block.transactions().is_empty());
        assert!(node.get_transaction_pool().is_empty());
    }

    #[test]
    fn test_spend_alive_on_a_fork_stays_pooled() {
        let miner = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let carol = KeyPair::generate().unwrap();
        let (node, genesis) = node_with_genesis(&miner);
        let coin = genesis.coinbase().hash();

        let to_bob = pay(&miner, coin, 0, 25, &bob);
        let to_carol = pay(&miner, coin, 0, 25, &carol);

        let mut main = Block::new(
            Some(genesis.hash()),
            Transaction::coinbase(25, miner.public_key_bytes(), 1),
        )
        .with_transactions(vec![to_bob]);
        main.finalize();
        assert!(node.submit_block(main).is_accepted());

        node.submit_transaction(to_carol.clone());

        // A sibling fork keeps the genesis coin unspent.
        let mut fork = Block::new(
            Some(genesis.hash()),
            Transaction::coinbase(25, bob.public_key_bytes(), 1),
        );
        fork.finalize();
        assert!(node.submit_block(fork).is_accepted());
        assert!(node.get_transaction_pool().contains(&to_carol.hash()));
    }

    #[test]
    fn test_rejected_block_leaves_state_alone() {
        let miner = KeyPair::generate().unwrap();
        let (node, genesis) = node_with_genesis(&miner);
        let before = node.snapshot();

        let mut bad = Block::new(
            Some(genesis.hash()),
            Transaction::coinbase(25, miner.public_key_bytes(), 1),
        );
        bad.add_transaction(pay(&miner, [3; 32], 0, 1, &miner));
        bad.finalize();

        assert_eq!(node.submit_block(bad), BlockOutcome::RejectedInvalidTransactions);
        assert!(Arc::ptr_eq(&before, &node.snapshot()));
    }
}
