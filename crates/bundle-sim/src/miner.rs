//! Block production and historical replay on top of the chain store.

use std::sync::Arc;

use alloy::consensus::TxEnvelope;
use alloy::primitives::{Bytes, B256};
use bundle_state::{BlockSelector, ChainConfig, ChainStore, StateProvider, StoredBlock, WorkingState};
use revm::primitives::ResultAndState;
use revm::DatabaseCommit;
use tracing::{debug, info};

use crate::deadline::{Deadline, DeadlineInspector};
use crate::engine::{evm_env, transact, tx_env, ExecutionMode};
use crate::error::{Result, SimError};
use crate::executor::SignedTransaction;
use crate::header::{HeaderOverrides, SyntheticHeader};

/// Mines one block of raw transactions on the current head and stores it.
///
/// Unlike a bundle simulation, every transaction is metered against the
/// block gas limit and the resulting state is persisted.
///
/// # Errors
/// Fails if any transaction cannot be decoded or applied; the store is left
/// unchanged in that case.
pub fn mine_block(store: &ChainStore, raw_txs: &[Bytes], overrides: &HeaderOverrides) -> Result<B256> {
    let txs = raw_txs
        .iter()
        .enumerate()
        .map(|(index, raw)| SignedTransaction::decode(raw, index))
        .collect::<Result<Vec<_>>>()?;

    let parent = store.head().map_err(|err| SimError::Chain(err.to_string()))?;
    let header = SyntheticHeader::synthesize(store.config(), &parent.header, parent.header.number + 1, overrides);

    let mut state = WorkingState::new(Arc::clone(&parent.state));
    let gas_used = apply_all(store.config(), &mut state, &header, &txs)?;

    let sealed = header.to_header(gas_used);
    let hash = sealed.hash_slow();
    let mut snapshot = parent.state.apply_changes(&state);
    snapshot.insert_block_hash(sealed.number, hash);

    info!(number = sealed.number, %hash, txs = txs.len(), gas_used, "mined block");

    store
        .insert_block(StoredBlock {
            header: sealed,
            hash,
            transactions: txs.into_iter().map(|tx| tx.envelope).collect(),
            state: Arc::new(snapshot),
        })
        .map_err(|err| SimError::Chain(err.to_string()))?;
    Ok(hash)
}

/// Applies `txs` under block rules and returns the cumulative gas used.
fn apply_all(config: &ChainConfig, state: &mut WorkingState, header: &SyntheticHeader, txs: &[SignedTransaction]) -> Result<u64> {
    let block_env = header.block_env(config);
    let mut gas_used = 0u64;

    for (index, tx) in txs.iter().enumerate() {
        let env = evm_env(config, block_env.clone(), tx_env(&tx.envelope, tx.sender), ExecutionMode::Block);
        // Remaining block gas, not the header total, bounds each transaction.
        let available = header.gas_limit.saturating_sub(gas_used);
        if env.tx.gas_limit > available {
            return Err(SimError::Apply {
                index,
                hash: tx.hash,
                reason: format!("gas limit reached: tx wants {}, block has {available} left", env.tx.gas_limit),
            });
        }

        let (outcome, _) = transact(&mut *state, env, DeadlineInspector::new(Deadline::none()));
        let ResultAndState { result, state: changes } =
            outcome.map_err(|err| SimError::Apply { index, hash: tx.hash, reason: err.to_string() })?;
        state.commit(changes);
        gas_used += result.gas_used();
        debug!(index, tx_hash = %tx.hash, gas = result.gas_used(), "included");
    }
    Ok(gas_used)
}

/// State and context needed to re-execute an included transaction.
#[derive(Debug)]
pub struct Replay {
    pub state: WorkingState,
    pub header: SyntheticHeader,
    pub tx: SignedTransaction,
}

/// Rebuilds the state right before the transaction `hash` ran: the parent
/// block's state with every earlier transaction of the same block applied.
pub fn replay_to<P: StateProvider + ?Sized>(provider: &P, hash: B256) -> Result<Replay> {
    let located = provider.transaction(hash).ok_or(SimError::TransactionNotFound(hash))?;
    let block_header = provider
        .header(BlockSelector::Number(located.block_number))
        .ok_or_else(|| SimError::StateUnavailable(format!("block {}", located.block_number)))?;
    let parent_number = located
        .block_number
        .checked_sub(1)
        .ok_or_else(|| SimError::StateUnavailable("genesis has no parent".to_string()))?;
    let (mut state, _) = provider
        .state_and_header(BlockSelector::Number(parent_number))
        .map_err(|err| SimError::StateUnavailable(err.to_string()))?;
    let block_txs = provider
        .block_transactions(located.block_number)
        .ok_or_else(|| SimError::StateUnavailable(format!("transactions of block {}", located.block_number)))?;

    let header = SyntheticHeader::from_sealed(&block_header);
    let preceding = recover_all(block_txs.get(..located.index).unwrap_or(&[]))?;
    apply_all(provider.chain_config(), &mut state, &header, &preceding)?;

    let tx = SignedTransaction::recover(located.tx, located.index)?;
    Ok(Replay { state, header, tx })
}

fn recover_all(txs: &[TxEnvelope]) -> Result<Vec<SignedTransaction>> {
    txs.iter()
        .enumerate()
        .map(|(index, tx)| SignedTransaction::recover(tx.clone(), index))
        .collect()
}
