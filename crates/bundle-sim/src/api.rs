//! Request-level entry points.
//!
//! [`BundleApi`] owns a handle to the state provider and the operator
//! settings. Each call resolves its state, builds a private working copy and
//! discards it on return, so any number of calls may run concurrently.

use std::sync::Arc;
use std::time::Instant;

use alloy::consensus::Header;
use alloy::primitives::{Address, Bytes, B256, U256};
use bundle_state::{BlockSelector, StateOverride, StateProvider, WorkingState};
use revm::primitives::{ExecutionResult, ResultAndState, KECCAK_EMPTY};
use revm::DatabaseRef;

use crate::args::{CallBundleArgs, EstimateGasBundleArgs, TraceConfig, TransactionArgs};
use crate::config::SimConfig;
use crate::deadline::{Deadline, DeadlineInspector};
use crate::engine::{evm_env, transact, tx_env, ExecutionMode};
use crate::error::{Result, SimError};
use crate::estimate::estimate_calls;
use crate::executor::{execute_bundle, SignedTransaction};
use crate::header::SyntheticHeader;
use crate::miner::replay_to;
use crate::results::{BundleResult, GasEstimate};
use crate::tracer::{TracerResult, TransferTracer, TIMEOUT_REASON, TRANSFER_TRACER};

#[derive(Debug)]
pub struct BundleApi<P> {
    provider: Arc<P>,
    config: SimConfig,
}

impl<P> Clone for BundleApi<P> {
    fn clone(&self) -> Self {
        Self { provider: Arc::clone(&self.provider), config: self.config.clone() }
    }
}

impl<P: StateProvider> BundleApi<P> {
    pub fn new(provider: Arc<P>, config: SimConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Simulates a bundle of signed transactions on top of the selected state.
    ///
    /// # Errors
    /// Request validation happens before any state is touched: an empty
    /// bundle, a missing block number, then each transaction's encoding.
    /// Afterwards any transaction the engine refuses to apply, or an expired
    /// timeout, aborts the simulation.
    #[tracing::instrument(skip_all, fields(block_number = args.block_number, txs = args.txs.len()))]
    pub fn call_bundle(&self, args: CallBundleArgs) -> Result<BundleResult> {
        if args.txs.is_empty() {
            return Err(SimError::EmptyBundle);
        }
        if args.block_number == 0 {
            return Err(SimError::MissingBlockNumber);
        }
        let txs = args
            .txs
            .iter()
            .enumerate()
            .map(|(index, raw)| SignedTransaction::decode(raw, index))
            .collect::<Result<Vec<_>>>()?;

        let started = Instant::now();
        let deadline = Deadline::after(self.config.timeout(args.timeout));
        let (mut state, parent) = self.state_at(args.state_block)?;
        if let Some(overrides) = &args.state_override {
            apply_overrides(overrides, &mut state)?;
        }

        let chain = self.provider.chain_config();
        let header = SyntheticHeader::synthesize(chain, &parent, args.block_number, &args.header_overrides());
        let result = execute_bundle(chain, &mut state, &header, &txs, deadline)?.into_result(parent.number);

        tracing::info!(
            bundle_hash = %result.bundle_hash,
            state_block = result.state_block_number,
            total_gas_used = result.total_gas_used,
            coinbase_diff = %result.coinbase_diff,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bundle simulated"
        );
        Ok(result)
    }

    /// Estimates the gas of each unsigned call, every call on its own copy
    /// of the selected state.
    ///
    /// The synthetic block keeps the parent's base fee.
    #[tracing::instrument(skip_all, fields(block_number = args.block_number, txs = args.txs.len()))]
    pub fn estimate_gas_bundle(&self, args: EstimateGasBundleArgs) -> Result<Vec<GasEstimate>> {
        if args.txs.is_empty() {
            return Err(SimError::EmptyBundle);
        }
        if args.block_number == 0 {
            return Err(SimError::MissingBlockNumber);
        }

        let deadline = Deadline::after(self.config.timeout(args.timeout));
        let (state, parent) = self.state_at(args.state_block)?;
        let chain = self.provider.chain_config();
        let mut header = SyntheticHeader::synthesize(chain, &parent, args.block_number, &args.header_overrides());
        header.base_fee = parent.base_fee_per_gas.map(U256::from);

        let estimates = estimate_calls(chain, &state, &header, &args.txs, self.config.gas_cap, deadline)?;
        tracing::info!(calls = estimates.len(), "bundle gas estimated");
        Ok(estimates)
    }

    /// Re-executes an included transaction under the named tracer.
    #[tracing::instrument(skip(self, config), fields(tracer = tracing::field::Empty))]
    pub fn trace_transaction(&self, hash: B256, config: TraceConfig) -> Result<TracerResult> {
        let name = config.tracer.as_deref().unwrap_or(TRANSFER_TRACER);
        if name != TRANSFER_TRACER {
            return Err(SimError::UnknownTracer(name.to_string()));
        }
        tracing::Span::current().record("tracer", name);

        let replay = replay_to(self.provider.as_ref(), hash)?;
        let mut state = replay.state;
        let chain = self.provider.chain_config();
        let deadline = Deadline::after(self.config.timeout(config.timeout));

        let env = evm_env(
            chain,
            replay.header.block_env(chain),
            tx_env(&replay.tx.envelope, replay.tx.sender),
            ExecutionMode::Block,
        );
        let (outcome, tracer) = transact(&mut state, env, TransferTracer::new().with_deadline(deadline));
        outcome.map_err(|err| SimError::Apply { index: 0, hash, reason: err.to_string() })?;

        let result = tracer.get_result()?;
        if result.error.as_deref() == Some(TIMEOUT_REASON) {
            tracing::warn!(%hash, budget = ?deadline.budget(), "trace stopped by timeout");
        }
        Ok(result)
    }

    /// Re-runs an included transaction as a call on its block's state and
    /// returns the raw revert payload, if it reverts with one.
    ///
    /// Unknown transactions yield `Ok(None)`.
    pub fn transaction_error(&self, hash: B256, overrides: Option<&StateOverride>) -> Result<Option<Bytes>> {
        let Some(located) = self.provider.transaction(hash) else {
            return Ok(None);
        };
        let tx = SignedTransaction::recover(located.tx, located.index)?;
        let (mut state, header) = self.state_at(BlockSelector::Number(located.block_number))?;
        if let Some(overrides) = overrides {
            apply_overrides(overrides, &mut state)?;
        }

        let chain = self.provider.chain_config();
        let header = SyntheticHeader::from_sealed(&header);
        let call = TransactionArgs::from_envelope(&tx.envelope, tx.sender)
            .to_tx_env(self.config.gas_cap, header.base_fee)
            .map_err(|reason| SimError::InvalidArgs { index: located.index, reason })?;

        let deadline = Deadline::after(self.config.default_timeout);
        let env = evm_env(chain, header.block_env(chain), call, ExecutionMode::Call);
        let (outcome, watchdog) = transact(&mut state, env, DeadlineInspector::new(deadline));
        let ResultAndState { result, .. } =
            outcome.map_err(|err| SimError::Call { index: located.index, reason: err.to_string() })?;
        if watchdog.fired() {
            return Err(SimError::Timeout(deadline.budget()));
        }

        Ok(match result {
            ExecutionResult::Revert { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        })
    }

    /// Whether `address` holds contract code at the selected block.
    pub fn has_code(&self, address: Address, selector: BlockSelector) -> Result<bool> {
        let (state, _) = self.state_at(selector)?;
        let code_hash = state
            .basic_ref(address)
            .ok()
            .flatten()
            .map(|info| info.code_hash)
            .unwrap_or(KECCAK_EMPTY);
        Ok(code_hash != KECCAK_EMPTY && !code_hash.is_zero())
    }

    fn state_at(&self, selector: BlockSelector) -> Result<(WorkingState, Header)> {
        self.provider
            .state_and_header(selector)
            .map_err(|err| SimError::StateUnavailable(err.to_string()))
    }
}

fn apply_overrides(overrides: &StateOverride, state: &mut WorkingState) -> Result<()> {
    overrides.apply(state).map_err(|err| SimError::StateOverride(err.to_string()))
}
