//! Sequential execution of a bundle on a working state.

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::eips::eip2718::Decodable2718;
use alloy::primitives::{Address, Bytes, TxKind, B256};
use bundle_state::{ChainConfig, WorkingState};
use revm::primitives::{ExecutionResult, HaltReason, ResultAndState};
use revm::DatabaseCommit;
use tracing::{debug, debug_span, warn};

use crate::bundle_hash::BundleHasher;
use crate::deadline::{Deadline, DeadlineInspector};
use crate::economics::{effective_tip, BundleEconomics, CoinbaseLedger};
use crate::engine::{balance_of, evm_env, transact, tx_env, ExecutionMode};
use crate::error::{Result, SimError};
use crate::header::SyntheticHeader;
use crate::results::{BundleResult, PerTxResult};
use crate::revert::RevertReason;

/// A decoded transaction with its recovered sender.
#[derive(Clone, Debug)]
pub struct SignedTransaction {
    pub envelope: TxEnvelope,
    pub sender: Address,
    pub hash: B256,
}

impl SignedTransaction {
    /// Decodes an EIP-2718 encoded transaction (legacy RLP included).
    pub fn decode(raw: &Bytes, index: usize) -> Result<Self> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|err| SimError::MalformedTransaction { index, reason: err.to_string() })?;
        Self::recover(envelope, index)
    }

    pub fn recover(envelope: TxEnvelope, index: usize) -> Result<Self> {
        let hash = *envelope.tx_hash();
        let sender = envelope
            .recover_signer()
            .map_err(|err| SimError::Apply { index, hash, reason: format!("invalid sender: {err}") })?;
        Ok(Self { envelope, sender, hash })
    }

    pub fn to(&self) -> Option<Address> {
        match self.envelope.kind() {
            TxKind::Call(to) => Some(to),
            TxKind::Create => None,
        }
    }
}

/// Bundle outcome before the caller attaches the state block number.
#[derive(Clone, Debug)]
pub struct ExecutedBundle {
    pub results: Vec<PerTxResult>,
    pub bundle_hash: B256,
    pub economics: BundleEconomics,
}

impl ExecutedBundle {
    pub fn into_result(self, state_block_number: u64) -> BundleResult {
        BundleResult::new(self.results, self.economics, self.bundle_hash, state_block_number)
    }
}

/// Runs `txs` in order on `state`, committing each one so later transactions
/// observe earlier effects.
///
/// Reverted and halted executions are recorded and the bundle continues. A
/// transaction the engine refuses to apply aborts the whole bundle.
pub fn execute_bundle(
    config: &ChainConfig,
    state: &mut WorkingState,
    header: &SyntheticHeader,
    txs: &[SignedTransaction],
    deadline: Deadline,
) -> Result<ExecutedBundle> {
    let block_env = header.block_env(config);
    let base_fee = header.base_fee_u128();
    let coinbase = header.coinbase;

    let mut ledger = CoinbaseLedger::new(balance_of(state, coinbase));
    let mut hasher = BundleHasher::new();
    let mut results = Vec::with_capacity(txs.len());

    for (index, tx) in txs.iter().enumerate() {
        if deadline.expired() {
            warn!(index, budget = ?deadline.budget(), "bundle simulation timed out");
            return Err(SimError::Timeout(deadline.budget()));
        }

        let span = debug_span!("bundle_tx", tx_hash = %tx.hash, index);
        let _enter = span.enter();

        ledger.begin_tx(balance_of(state, coinbase));

        let env = evm_env(config, block_env.clone(), tx_env(&tx.envelope, tx.sender), ExecutionMode::Bundle);
        let (outcome, watchdog) = transact(&mut *state, env, DeadlineInspector::new(deadline));
        let ResultAndState { result, state: changes } =
            outcome.map_err(|err| SimError::Apply { index, hash: tx.hash, reason: err.to_string() })?;
        if watchdog.fired() {
            warn!(index, budget = ?deadline.budget(), "bundle simulation timed out mid-execution");
            return Err(SimError::Timeout(deadline.budget()));
        }
        state.commit(changes);

        let tip = effective_tip(tx.envelope.max_fee_per_gas(), tx.envelope.max_priority_fee_per_gas(), base_fee)
            .ok_or_else(|| SimError::Apply {
                index,
                hash: tx.hash,
                reason: "max fee per gas less than block base fee".to_string(),
            })?;

        let gas_used = result.gas_used();
        let economics = ledger.finish_tx(balance_of(state, coinbase), gas_used, tip);
        hasher.push(&tx.hash);

        let mut record = PerTxResult::new(tx.hash, tx.sender, tx.to(), gas_used, economics);
        match result {
            ExecutionResult::Success { output, .. } => {
                record.return_data = Some(output.into_data());
            }
            ExecutionResult::Revert { output, .. } => {
                record.error_message = Some("execution reverted".to_string());
                record.revert_reason = RevertReason::decode(&output);
            }
            ExecutionResult::Halt { reason, .. } => {
                record.error_message = Some(halt_message(&reason));
            }
        }
        debug!(gas_used, success = record.succeeded(), coinbase_diff = %record.coinbase_diff, "applied");
        results.push(record);
    }

    let economics = ledger.finish(balance_of(state, coinbase));
    Ok(ExecutedBundle { results, bundle_hash: hasher.finish(), economics })
}

/// Human-readable text of an exceptional halt, in the engine-error wording
/// RPC clients expect.
pub fn halt_message(reason: &HaltReason) -> String {
    let message = match reason {
        HaltReason::OutOfGas(_) => "out of gas",
        HaltReason::OpcodeNotFound | HaltReason::InvalidFEOpcode => "invalid opcode",
        HaltReason::InvalidJump => "invalid jump destination",
        HaltReason::StackUnderflow => "stack underflow",
        HaltReason::StackOverflow => "stack limit reached",
        HaltReason::OutOfOffset => "return data out of bounds",
        HaltReason::CreateCollision => "contract address collision",
        HaltReason::PrecompileError => "precompiled contract failed",
        HaltReason::NonceOverflow => "nonce uint64 overflow",
        HaltReason::CreateContractSizeLimit => "max code size exceeded",
        HaltReason::CreateContractStartingWithEF => "invalid code: must not begin with 0xef",
        HaltReason::CreateInitCodeSizeLimit => "max initcode size exceeded",
        HaltReason::StateChangeDuringStaticCall | HaltReason::CallNotAllowedInsideStatic => "write protection",
        HaltReason::OutOfFunds => "insufficient balance for transfer",
        HaltReason::CallTooDeep => "max call depth exceeded",
        other => return format!("{other:?}"),
    };
    message.to_string()
}
