//! Block/state store shared by every simulation request.
//!
//! Blocks are append-only: each stored block owns an `Arc` of its post-state
//! snapshot, so concurrent readers never observe a partially written block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::consensus::{Header, TxEnvelope};
use alloy::eips::eip1559::INITIAL_BASE_FEE;
use alloy::primitives::B256;
use dashmap::DashMap;
use eyre::{bail, eyre, Result};
use parking_lot::Mutex;
use revm::db::CacheDB;
use tracing::{debug, info};

use crate::snapshot::SnapshotDb;
use crate::types::{BlockSelector, ChainConfig, Genesis};

/// Mutable per-request copy of a block's state.
pub type WorkingState = CacheDB<Arc<SnapshotDb>>;

/// A sealed block together with the state it produced.
#[derive(Clone, Debug)]
pub struct StoredBlock {
    pub header: Header,
    pub hash: B256,
    pub transactions: Vec<TxEnvelope>,
    pub state: Arc<SnapshotDb>,
}

/// Location of an included transaction.
#[derive(Clone, Debug)]
pub struct IndexedTransaction {
    pub tx: TxEnvelope,
    pub block_number: u64,
    pub index: usize,
}

/// Source of historical state and headers for the simulator.
pub trait StateProvider: Send + Sync {
    fn chain_config(&self) -> &ChainConfig;

    fn header(&self, selector: BlockSelector) -> Option<Header>;

    /// Returns a fresh working copy of the post-state of the selected block
    /// plus that block's header.
    fn state_and_header(&self, selector: BlockSelector) -> Result<(WorkingState, Header)>;

    fn block_transactions(&self, number: u64) -> Option<Vec<TxEnvelope>>;

    fn transaction(&self, hash: B256) -> Option<IndexedTransaction>;
}

/// In-memory chain: genesis plus every block mined on top of it.
#[derive(Debug)]
pub struct ChainStore {
    config: ChainConfig,
    blocks: DashMap<u64, StoredBlock>,
    numbers: DashMap<B256, u64>,
    transactions: DashMap<B256, (u64, usize)>,
    head: AtomicU64,
    writer: Mutex<()>,
}

impl ChainStore {
    /// Creates a store holding only the genesis block.
    pub fn new(config: ChainConfig, genesis: &Genesis) -> Self {
        let header = Header {
            number: 0,
            gas_limit: genesis.gas_limit,
            timestamp: genesis.timestamp,
            beneficiary: genesis.coinbase,
            difficulty: genesis.difficulty,
            base_fee_per_gas: config
                .is_london(0)
                .then(|| genesis.base_fee.unwrap_or(INITIAL_BASE_FEE)),
            ..Default::default()
        };
        let hash = header.hash_slow();

        let mut state = SnapshotDb::from_genesis(genesis);
        state.insert_block_hash(0, hash);

        info!(
            chain_id = config.chain_id,
            accounts = genesis.alloc.len(),
            genesis_hash = %hash,
            "initialized chain store"
        );

        let store = Self {
            config,
            blocks: DashMap::new(),
            numbers: DashMap::new(),
            transactions: DashMap::new(),
            head: AtomicU64::new(0),
            writer: Mutex::new(()),
        };
        store.numbers.insert(hash, 0);
        store.blocks.insert(0, StoredBlock { header, hash, transactions: Vec::new(), state: Arc::new(state) });
        store
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn head_number(&self) -> u64 {
        self.head.load(Ordering::Acquire)
    }

    pub fn head(&self) -> Result<StoredBlock> {
        self.block(BlockSelector::Latest).ok_or_else(|| eyre!("chain head missing"))
    }

    pub fn block(&self, selector: BlockSelector) -> Option<StoredBlock> {
        let number = match selector {
            BlockSelector::Number(number) => number,
            BlockSelector::Hash(hash) => *self.numbers.get(&hash)?,
            BlockSelector::Latest => self.head_number(),
        };
        self.blocks.get(&number).map(|block| block.clone())
    }

    /// Appends a block on top of the current head.
    ///
    /// # Errors
    /// Fails if the block does not extend the head by exactly one or its
    /// parent hash does not match.
    pub fn insert_block(&self, block: StoredBlock) -> Result<()> {
        let _guard = self.writer.lock();
        let head = self.head()?;

        if block.header.number != head.header.number + 1 {
            bail!("block {} does not extend head {}", block.header.number, head.header.number);
        }
        if block.header.parent_hash != head.hash {
            bail!("block {} parent {} is not head {}", block.header.number, block.header.parent_hash, head.hash);
        }

        let number = block.header.number;
        for (index, tx) in block.transactions.iter().enumerate() {
            self.transactions.insert(*tx.tx_hash(), (number, index));
        }
        self.numbers.insert(block.hash, number);
        debug!(number, hash = %block.hash, txs = block.transactions.len(), "stored block");
        self.blocks.insert(number, block);
        self.head.store(number, Ordering::Release);
        Ok(())
    }
}

impl StateProvider for ChainStore {
    fn chain_config(&self) -> &ChainConfig {
        &self.config
    }

    fn header(&self, selector: BlockSelector) -> Option<Header> {
        self.block(selector).map(|block| block.header)
    }

    fn state_and_header(&self, selector: BlockSelector) -> Result<(WorkingState, Header)> {
        let block = self.block(selector).ok_or_else(|| eyre!("no state for block {selector}"))?;
        Ok((CacheDB::new(Arc::clone(&block.state)), block.header))
    }

    fn block_transactions(&self, number: u64) -> Option<Vec<TxEnvelope>> {
        self.blocks.get(&number).map(|block| block.transactions.clone())
    }

    fn transaction(&self, hash: B256) -> Option<IndexedTransaction> {
        let (block_number, index) = *self.transactions.get(&hash)?;
        let tx = self.blocks.get(&block_number)?.transactions.get(index)?.clone();
        Some(IndexedTransaction { tx, block_number, index })
    }
}
