//! Integration tests for the value-transfer tracer.

mod common;

use alloy::primitives::{Bytes, U256};
use bundle_sim::engine::{evm_env, transact, tx_env, ExecutionMode};
use bundle_sim::executor::SignedTransaction;
use bundle_sim::header::{HeaderOverrides, SyntheticHeader};
use bundle_sim::miner::mine_block;
use bundle_sim::{SimError, TraceConfig, TransferTrace, TransferTracer};
use bundle_state::{BlockSelector, StateProvider};
use common::*;

fn trace_config() -> TraceConfig {
    TraceConfig { tracer: Some("transferTracer".to_string()), timeout: None }
}

fn frames(output: serde_json::Value) -> TransferTrace {
    serde_json::from_value(output).expect("tracer output has the transfers shape")
}

/// Mines `txs` into block 1 and returns an api over the resulting chain.
fn mined(txs: &[Bytes]) -> bundle_sim::BundleApi<bundle_state::ChainStore> {
    let store = TestChain::new().store();
    mine_block(&store, txs, &HeaderOverrides::default()).expect("block mines");
    api_for(store)
}

#[test]
fn plain_transfer_yields_single_frame() {
    let tx = transfer(&alice(), 0, bob().address(), 1_000);
    let api = mined(&[tx.clone()]);

    let result = api.trace_transaction(tx_hash(&tx), trace_config()).expect("traces");
    assert_eq!(result.error, None);
    assert_eq!(result.output["transfers"][0]["type"], "CALL");
    assert_eq!(result.output["transfers"][0]["value"], "0x3e8");

    let trace = frames(result.output);
    assert_eq!(trace.transfers.len(), 1);
    assert_eq!(trace.transfers[0].from, alice().address());
    assert_eq!(trace.transfers[0].to, bob().address());
}

#[test]
fn nested_value_transfers_are_recorded() {
    let forward = legacy_tx(&alice(), TxSpec::call(FORWARDER, 0).gas(100_000).value(500));
    let silent = legacy_tx(&alice(), TxSpec::call(ZERO_FORWARDER, 1).gas(100_000));
    let api = mined(&[forward.clone(), silent.clone()]);

    let trace = frames(api.trace_transaction(tx_hash(&forward), trace_config()).expect("traces").output);
    assert_eq!(trace.transfers.len(), 2);
    assert_eq!(trace.transfers[0].to, FORWARDER);
    assert_eq!(trace.transfers[1].kind, "CALL");
    assert_eq!(trace.transfers[1].from, FORWARDER);
    assert_eq!(trace.transfers[1].to, bob().address());
    assert_eq!(trace.transfers[1].value, U256::from(500));

    // Zero-value nested calls are skipped; the outer frame is always present.
    let trace = frames(api.trace_transaction(tx_hash(&silent), trace_config()).expect("traces").output);
    assert_eq!(trace.transfers.len(), 1);
    assert_eq!(trace.transfers[0].value, U256::ZERO);
}

#[test]
fn callcode_frame_reports_code_account() {
    let tx = legacy_tx(&alice(), TxSpec::call(CALLCODE_FORWARDER, 0).gas(100_000).value(500));
    let api = mined(&[tx.clone()]);

    let trace = frames(api.trace_transaction(tx_hash(&tx), trace_config()).expect("traces").output);
    assert_eq!(trace.transfers.len(), 2);
    assert_eq!(trace.transfers[1].kind, "CALLCODE");
    assert_eq!(trace.transfers[1].from, CALLCODE_FORWARDER);
    assert_eq!(trace.transfers[1].to, bob().address());
    assert_eq!(trace.transfers[1].value, U256::from(500));
}

#[test]
fn later_transaction_sees_earlier_effects() {
    // The sender only holds funds after the first transaction of the block.
    let stranger = signer(9);
    let fund = transfer(&alice(), 0, stranger.address(), ETH);
    let spend = transfer(&stranger, 0, carol().address(), ETH / 2);
    let api = mined(&[fund, spend.clone()]);

    let trace = frames(api.trace_transaction(tx_hash(&spend), trace_config()).expect("replays").output);
    assert_eq!(trace.transfers[0].from, stranger.address());
    assert_eq!(trace.transfers[0].value, U256::from(ETH / 2));
}

#[test]
fn default_tracer_is_transfer_tracer() {
    let tx = transfer(&alice(), 0, bob().address(), 1);
    let api = mined(&[tx.clone()]);

    let result = api.trace_transaction(tx_hash(&tx), TraceConfig::default()).expect("traces");
    assert_eq!(frames(result.output).transfers.len(), 1);
}

#[test]
fn call_free_replay_honours_timeout() {
    let tx = legacy_tx(&alice(), TxSpec::call(LOOPER, 0).gas(10_000_000));
    let api = mined(&[tx.clone()]);

    let config = TraceConfig { tracer: None, timeout: Some(1) };
    let result = api.trace_transaction(tx_hash(&tx), config).expect("timeout is reported, not raised");
    assert_eq!(result.error.as_deref(), Some("execution timeout"));
    assert_eq!(frames(result.output).transfers.len(), 1);
}

#[test]
fn tracer_errors() {
    let tx = transfer(&alice(), 0, bob().address(), 1);
    let api = mined(&[tx.clone()]);

    let unknown = TraceConfig { tracer: Some("callTracer".to_string()), timeout: None };
    assert!(matches!(api.trace_transaction(tx_hash(&tx), unknown), Err(SimError::UnknownTracer(name)) if name == "callTracer"));

    let missing = alloy::primitives::B256::repeat_byte(0xab);
    assert!(matches!(api.trace_transaction(missing, trace_config()), Err(SimError::TransactionNotFound(hash)) if hash == missing));
}

#[test]
fn stopped_tracer_keeps_outer_frame_only() {
    let store = TestChain::new().store();
    let (mut state, parent) = store.state_and_header(BlockSelector::Latest).expect("genesis state");
    let header = SyntheticHeader::synthesize(store.config(), &parent, 1, &HeaderOverrides::default());
    let raw = legacy_tx(&alice(), TxSpec::call(FORWARDER, 0).gas(100_000).value(500));
    let tx = SignedTransaction::decode(&raw, 0).expect("decodes");

    let tracer = TransferTracer::new();
    tracer.handle().stop("stopped by caller");

    let env = evm_env(
        store.config(),
        header.block_env(store.config()),
        tx_env(&tx.envelope, tx.sender),
        ExecutionMode::Bundle,
    );
    let (outcome, tracer) = transact(&mut state, env, tracer);
    outcome.expect("cancellation unwinds without an engine error");

    assert_eq!(tracer.frames().len(), 1);
    assert_eq!(tracer.frames()[0].to, FORWARDER);
    let result = tracer.get_result().expect("serializes");
    assert_eq!(result.error.as_deref(), Some("stopped by caller"));
}
