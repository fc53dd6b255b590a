//! Gas estimation for bundles of unsigned calls.

use bundle_state::{ChainConfig, WorkingState};
use revm::primitives::{ExecutionResult, ResultAndState};
use tracing::{debug, debug_span, warn};

use crate::args::TransactionArgs;
use crate::deadline::{Deadline, DeadlineInspector};
use crate::engine::{evm_env, transact, ExecutionMode};
use crate::error::{Result, SimError};
use crate::header::SyntheticHeader;
use crate::results::GasEstimate;

/// Measures the gas each call uses on its own copy of `base`.
///
/// Calls never see each other's effects. Reverted calls still report the
/// gas they consumed.
pub fn estimate_calls(
    config: &ChainConfig,
    base: &WorkingState,
    header: &SyntheticHeader,
    calls: &[TransactionArgs],
    gas_cap: u64,
    deadline: Deadline,
) -> Result<Vec<GasEstimate>> {
    let block_env = header.block_env(config);

    calls
        .iter()
        .enumerate()
        .map(|(index, call)| {
            if deadline.expired() {
                warn!(index, budget = ?deadline.budget(), "gas estimation timed out");
                return Err(SimError::Timeout(deadline.budget()));
            }
            let _enter = debug_span!("estimate_call", index).entered();

            let tx = call
                .to_tx_env(gas_cap, header.base_fee)
                .map_err(|reason| SimError::InvalidArgs { index, reason })?;

            let mut scratch = base.clone();
            let env = evm_env(config, block_env.clone(), tx, ExecutionMode::Call);
            let (outcome, watchdog) = transact(&mut scratch, env, DeadlineInspector::new(deadline));
            let ResultAndState { result, .. } =
                outcome.map_err(|err| SimError::Call { index, reason: err.to_string() })?;
            if watchdog.fired() {
                return Err(SimError::Timeout(deadline.budget()));
            }

            let gas_used = result.gas_used();
            debug!(gas_used, reverted = !matches!(result, ExecutionResult::Success { .. }), "estimated");
            Ok(GasEstimate { gas_used })
        })
        .collect()
}
