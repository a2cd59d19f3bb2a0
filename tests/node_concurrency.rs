//! Concurrent use of a shared node, plus loading a node from a config file

use forkledger::clock::ManualClock;
use forkledger::config::{load_config, ChainConfig};
use forkledger::crypto::KeyPair;
use forkledger::{logging, Block, Node, OutPoint, Sha256Hash, Transaction, TxValidator};
use std::io::Write;
use std::sync::Arc;
use std::thread;

/// A genesis with `count` separately spendable outputs owned by `owner`.
fn funded_genesis(owner: &KeyPair, count: u32) -> Block {
    let mut coinbase = Transaction::new();
    for _ in 0..count {
        coinbase.add_output(10, owner.public_key_bytes());
    }
    coinbase.finalize();
    Block::genesis(coinbase)
}

fn pay(owner: &KeyPair, prevout: OutPoint, to: &KeyPair) -> Transaction {
    let mut tx = Transaction::new();
    tx.add_input(prevout.tx_hash, prevout.index);
    tx.add_output(9, to.public_key_bytes());
    let message = tx.signable_message(0).unwrap();
    tx.add_signature(owner.sign(&message).unwrap(), 0).unwrap();
    tx.finalize();
    tx
}

#[test]
fn test_concurrent_submitters_and_miner() {
    let alice = Arc::new(KeyPair::generate().unwrap());
    let bob = Arc::new(KeyPair::generate().unwrap());
    let genesis = funded_genesis(&alice, 40);
    let genesis_coinbase: Sha256Hash = genesis.coinbase().hash();

    let node = Arc::new(Node::with_parts(
        genesis,
        ChainConfig::default(),
        TxValidator::default(),
        Arc::new(ManualClock::new(0)),
    ));

    let mut handles = Vec::new();
    for worker in 0..4u32 {
        let node = Arc::clone(&node);
        let alice = Arc::clone(&alice);
        let bob = Arc::clone(&bob);
        handles.push(thread::spawn(move || {
            for i in 0..10u32 {
                let prevout = OutPoint::new(genesis_coinbase, worker * 10 + i);
                node.submit_transaction(pay(&alice, prevout, &bob));
            }
        }));
    }

    let miner = {
        let node = Arc::clone(&node);
        let alice = Arc::clone(&alice);
        thread::spawn(move || {
            let mut mined = 0;
            for _ in 0..5 {
                if node.assemble_block(alice.public_key_bytes()).is_some() {
                    mined += 1;
                }
                // Every published snapshot is internally consistent.
                let snapshot = node.snapshot();
                assert_eq!(snapshot.best_chain[0], snapshot.best_block.hash());
                assert_eq!(snapshot.best_chain.len() as u64, snapshot.best_height + 1);
            }
            mined
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(miner.join().unwrap(), 5);

    // Sweep whatever the miner did not get to.
    node.assemble_block(alice.public_key_bytes()).unwrap();

    let snapshot = node.snapshot();
    assert_eq!(snapshot.best_height, 6);
    assert!(snapshot.mempool.is_empty());
    assert_eq!(snapshot.utxo_set.balance_of(&bob.public_key_bytes()), 40 * 9);
    assert_eq!(
        snapshot.utxo_set.balance_of(&alice.public_key_bytes()),
        6 * 25
    );
}

#[test]
fn test_readers_keep_old_snapshots() {
    let alice = KeyPair::generate().unwrap();
    let bob = KeyPair::generate().unwrap();
    let genesis = funded_genesis(&alice, 1);
    let coin = OutPoint::new(genesis.coinbase().hash(), 0);
    let node = Node::with_parts(
        genesis,
        ChainConfig::default(),
        TxValidator::default(),
        Arc::new(ManualClock::new(0)),
    );

    let before = node.snapshot();
    node.submit_transaction(pay(&alice, coin, &bob));
    node.assemble_block(alice.public_key_bytes()).unwrap();

    assert_eq!(before.best_height, 0);
    assert!(before.utxo_set.contains(&coin));
    assert!(before.mempool.is_empty());

    let after = node.snapshot();
    assert_eq!(after.best_height, 1);
    assert!(!after.utxo_set.contains(&coin));
}

#[test]
fn test_node_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[chain]\ncutoff_age = 2\nmax_retained_nodes = 5\ncoinbase_reward = 7\n\n[logging]\nlevel = \"debug\""
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    logging::init(&config.logging).unwrap();
    assert_eq!(config.chain.coinbase_reward, 7);

    let miner = KeyPair::generate().unwrap();
    let genesis = Block::genesis(Transaction::coinbase(7, miner.public_key_bytes(), 0));
    let node = Node::new(genesis, config.chain.clone());

    for _ in 0..12 {
        node.assemble_block(miner.public_key_bytes()).unwrap();
    }

    let snapshot = node.snapshot();
    assert_eq!(snapshot.best_height, 12);
    assert!(snapshot.retained_nodes <= 5);
    assert_eq!(snapshot.utxo_set.balance_of(&miner.public_key_bytes()), 13 * 7);
}
