use crate::clock::Clock;
use crate::config::ChainConfig;
use crate::error::BlockOutcome;
use crate::transaction::TxValidator;
use std::cmp::{Ordering, Reverse};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::chain::{Block, Sha256Hash};
use super::state::UtxoSet;
use super::validation::validate_coinbase;

/// One accepted block and the ledger state it leaves behind.
///
/// The parent is referenced by hash only; nothing points from a parent to
/// its children.
#[derive(Debug, Clone)]
pub struct BlockNode {
    block: Arc<Block>,
    height: u64,
    arrived_at: u64,
    arrival_seq: u64,
    utxo_set: Arc<UtxoSet>,
}

impl BlockNode {
    pub fn block(&self) -> &Arc<Block> {
        &self.block
    }

    pub fn hash(&self) -> Sha256Hash {
        self.block.hash()
    }

    pub fn parent_hash(&self) -> Option<Sha256Hash> {
        self.block.previous_hash()
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Arrival time in milliseconds since the epoch.
    pub fn arrived_at(&self) -> u64 {
        self.arrived_at
    }

    pub fn utxo_set(&self) -> &Arc<UtxoSet> {
        &self.utxo_set
    }

    /// Fork-choice rank: higher wins. Greatest height first, then earliest
    /// arrival, then first registered.
    fn rank(&self) -> (u64, Reverse<u64>, Reverse<u64>) {
        (self.height, Reverse(self.arrived_at), Reverse(self.arrival_seq))
    }
}

/// All retained block nodes, keyed by block hash.
///
/// Constructed once around a genesis block; every later node comes through
/// [`add_block`](Self::add_block). Memory is bounded by pruning nodes that
/// fall too far behind the best tip to ever be extended again.
pub struct ChainForest {
    nodes: HashMap<Sha256Hash, BlockNode>,
    best: Sha256Hash,
    config: ChainConfig,
    validator: TxValidator,
    clock: Arc<dyn Clock>,
    next_seq: u64,
}

impl ChainForest {
    /// # Panics
    ///
    /// If `genesis` has a previous hash. Only a parentless block can seed
    /// the forest.
    pub fn new(
        genesis: Block,
        config: ChainConfig,
        validator: TxValidator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        assert!(
            genesis.previous_hash().is_none(),
            "genesis block {} must not have a previous hash",
            genesis.hash_str()
        );

        let mut utxo_set = UtxoSet::new();
        utxo_set.add_coinbase(genesis.coinbase());
        for tx in genesis.transactions() {
            utxo_set.apply_transaction(tx);
        }

        let hash = genesis.hash();
        let node = BlockNode {
            block: Arc::new(genesis),
            height: 0,
            arrived_at: clock.now_millis(),
            arrival_seq: 0,
            utxo_set: Arc::new(utxo_set),
        };
        info!("Chain forest created with genesis {}", hex::encode(hash));

        let mut nodes = HashMap::new();
        nodes.insert(hash, node);

        ChainForest {
            nodes,
            best: hash,
            config,
            validator,
            clock,
            next_seq: 1,
        }
    }

    pub fn add_block(&mut self, block: Block) -> BlockOutcome {
        let block_hash = block.hash();

        let Some(parent_hash) = block.previous_hash() else {
            warn!("Rejected block {}: no previous hash", block.hash_str());
            return BlockOutcome::RejectedMissingParent;
        };

        if self.nodes.contains_key(&block_hash) {
            debug!("Rejected block {}: already retained", block.hash_str());
            return BlockOutcome::RejectedDuplicate;
        }

        let Some(parent) = self.nodes.get(&parent_hash) else {
            warn!(
                "Rejected block {}: parent {} not retained",
                block.hash_str(),
                hex::encode(parent_hash)
            );
            return BlockOutcome::RejectedMissingParent;
        };

        let best_height = self.best_height();
        if parent.height.saturating_add(self.config.cutoff_age) < best_height {
            warn!(
                "Rejected block {}: parent height {} is more than {} behind best height {}",
                block.hash_str(),
                parent.height,
                self.config.cutoff_age,
                best_height
            );
            return BlockOutcome::RejectedTooOld;
        }

        if let Err(e) = validate_coinbase(block.coinbase(), self.config.coinbase_reward) {
            warn!("Rejected block {}: {}", block.hash_str(), e);
            return BlockOutcome::RejectedInvalidTransactions;
        }

        let (accepted, mut utxo_set) = self
            .validator
            .select_valid_subset(block.transactions(), parent.utxo_set());
        if accepted.len() != block.transactions().len() {
            warn!(
                "Rejected block {}: only {} of {} transactions valid",
                block.hash_str(),
                accepted.len(),
                block.transactions().len()
            );
            return BlockOutcome::RejectedInvalidTransactions;
        }

        let fees = parent.utxo_set.total_value() - utxo_set.total_value();
        utxo_set.add_coinbase(block.coinbase());

        let node = BlockNode {
            height: parent.height + 1,
            arrived_at: self.clock.now_millis(),
            arrival_seq: self.next_seq,
            utxo_set: Arc::new(utxo_set),
            block: Arc::new(block),
        };
        self.next_seq += 1;

        debug!(
            "Block {} carries {} transactions paying {} in fees",
            hex::encode(block_hash),
            accepted.len(),
            fees
        );
        info!(
            "Accepted block {} at height {}",
            hex::encode(block_hash),
            node.height
        );

        if node.rank() > self.best_node().rank() {
            self.best = block_hash;
        }
        self.nodes.insert(block_hash, node);
        self.prune();

        BlockOutcome::Accepted
    }

    /// Evict the older half of the forest once it outgrows its ceiling,
    /// keeping everything within the cutoff window of the best tip.
    fn prune(&mut self) {
        if self.nodes.len() <= self.config.max_retained_nodes {
            return;
        }

        let mut heights: Vec<u64> = self.nodes.values().map(|n| n.height).collect();
        heights.sort_unstable();
        let median = heights[heights.len() / 2];
        let window_floor = self.best_height().saturating_sub(self.config.cutoff_age);
        let cut_line = median.min(window_floor);

        let before = self.nodes.len();
        self.nodes.retain(|_, node| node.height >= cut_line);
        let evicted = before - self.nodes.len();

        if evicted > 0 {
            info!(
                "Evicted {} block nodes below height {} ({} retained)",
                evicted,
                cut_line,
                self.nodes.len()
            );
        }
    }

    fn best_node(&self) -> &BlockNode {
        // The best node always sits inside the cutoff window, so pruning
        // never removes it.
        &self.nodes[&self.best]
    }

    pub fn get_max_height_node(&self) -> &BlockNode {
        self.best_node()
    }

    pub fn get_max_height_block(&self) -> Arc<Block> {
        Arc::clone(&self.best_node().block)
    }

    pub fn get_max_height_utxo_pool(&self) -> Arc<UtxoSet> {
        Arc::clone(&self.best_node().utxo_set)
    }

    pub fn best_height(&self) -> u64 {
        self.best_node().height
    }

    pub fn get_node(&self, hash: &Sha256Hash) -> Option<&BlockNode> {
        self.nodes.get(hash)
    }

    pub fn contains(&self, hash: &Sha256Hash) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn validator(&self) -> &TxValidator {
        &self.validator
    }

    /// `hash` followed by its retained ancestors, newest first. Stops at
    /// genesis or at the first evicted parent.
    pub fn ancestry(&self, hash: &Sha256Hash) -> Vec<Sha256Hash> {
        let mut chain = Vec::new();
        let mut cursor = self.nodes.get(hash);
        while let Some(node) = cursor {
            chain.push(node.hash());
            cursor = node.parent_hash().and_then(|parent| self.nodes.get(&parent));
        }
        chain
    }

    /// Retained children of `hash`, in arrival order. Computed by scanning.
    pub fn children_of(&self, hash: &Sha256Hash) -> Vec<Sha256Hash> {
        let mut children: Vec<&BlockNode> = self
            .nodes
            .values()
            .filter(|node| node.parent_hash().as_ref() == Some(hash))
            .collect();
        children.sort_by_key(|node| node.arrival_seq);
        children.into_iter().map(BlockNode::hash).collect()
    }

    /// Nodes nobody builds on, best first.
    pub fn tips(&self) -> Vec<Sha256Hash> {
        let parents: HashSet<Sha256Hash> =
            self.nodes.values().filter_map(BlockNode::parent_hash).collect();
        let mut tips: Vec<&BlockNode> = self
            .nodes
            .values()
            .filter(|node| !parents.contains(&node.hash()))
            .collect();
        tips.sort_by(|a, b| match b.rank().cmp(&a.rank()) {
            Ordering::Equal => a.hash().cmp(&b.hash()),
            ord => ord,
        });
        tips.into_iter().map(BlockNode::hash).collect()
    }
}
