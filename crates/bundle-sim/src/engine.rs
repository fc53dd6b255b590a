//! Binding to the `revm` execution engine.
//!
//! Every simulation path goes through [`transact`]: build an environment,
//! run one transaction with an inspector attached, hand back the result and
//! the inspector. Committing the resulting state diff is the caller's call.

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::primitives::{Address, B256, U256};
use bundle_state::{ChainConfig, WorkingState};
use revm::primitives::{BlockEnv, CfgEnv, EVMError, Env, EnvWithHandlerCfg, ResultAndState, TxEnv};
use revm::{inspector_handle_register, Database, DatabaseRef, Evm, GetInspector};

/// How strictly the engine checks the block-level envelope of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Real block production: block gas limit and base fee enforced.
    Block,
    /// Bundle simulation: the bundle gets the maximum gas pool.
    Bundle,
    /// Unsigned calls: no block gas limit, no base-fee floor.
    Call,
}

/// Builds the engine environment for one transaction.
pub fn evm_env(config: &ChainConfig, block: BlockEnv, tx: TxEnv, mode: ExecutionMode) -> EnvWithHandlerCfg {
    let mut cfg = CfgEnv::default();
    cfg.chain_id = config.chain_id;
    cfg.disable_block_gas_limit = mode != ExecutionMode::Block;
    cfg.disable_base_fee = mode == ExecutionMode::Call;

    EnvWithHandlerCfg::new_with_spec_id(Box::new(Env { cfg, block, tx }), config.spec_id())
}

/// Executes one transaction against `db` without committing.
///
/// Returns the engine outcome alongside the inspector so callers can read
/// whatever it recorded.
pub fn transact<DB, I>(db: DB, env: EnvWithHandlerCfg, inspector: I) -> (Result<ResultAndState, EVMError<DB::Error>>, I)
where
    DB: Database,
    I: GetInspector<DB>,
{
    let mut evm = Evm::builder()
        .with_db(db)
        .with_external_context(inspector)
        .with_env_with_handler_cfg(env)
        .append_handler_register(inspector_handle_register)
        .build();

    let outcome = evm.transact();
    let inspector = evm.into_context().external;
    (outcome, inspector)
}

/// Converts a signed transaction into the engine's transaction environment.
pub fn tx_env(tx: &TxEnvelope, sender: Address) -> TxEnv {
    let mut env = TxEnv::default();
    env.caller = sender;
    env.gas_limit = tx.gas_limit();
    env.gas_price = U256::from(tx.max_fee_per_gas());
    env.gas_priority_fee = tx.max_priority_fee_per_gas().map(U256::from);
    env.transact_to = tx.kind();
    env.value = tx.value();
    env.data = tx.input().clone();
    env.nonce = Some(tx.nonce());
    env.chain_id = tx.chain_id();
    env.access_list = tx.access_list().map(|list| list.0.clone()).unwrap_or_default();
    env.blob_hashes = tx.blob_versioned_hashes().map(<[B256]>::to_vec).unwrap_or_default();
    env.max_fee_per_blob_gas = tx.max_fee_per_blob_gas().map(U256::from);
    env
}

/// Balance of `address` in `state`; missing accounts read as zero.
pub fn balance_of(state: &WorkingState, address: Address) -> U256 {
    state
        .basic_ref(address)
        .ok()
        .flatten()
        .map(|info| info.balance)
        .unwrap_or_default()
}
