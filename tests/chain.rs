//! Integration tests for block production, replay helpers and fixtures.

mod common;

use alloy::primitives::{Address, U256};
use bundle_sim::header::HeaderOverrides;
use bundle_sim::miner::mine_block;
use bundle_sim::{CallBundleArgs, SimError};
use bundle_state::{BlockFixture, BlockSelector, ChainFixture, ChainStore, Genesis, GenesisAccount, StateProvider};
use common::*;

#[test]
fn mining_persists_state_and_header() {
    let store = TestChain::new().store();
    let tx = transfer(&alice(), 0, bob().address(), 1_000);

    let hash = mine_block(&store, &[tx.clone()], &HeaderOverrides::default()).expect("block mines");

    let head = store.head().expect("head exists");
    assert_eq!(head.hash, hash);
    assert_eq!(head.header.number, 1);
    assert_eq!(head.header.gas_used, 21_000);
    assert_eq!(head.header.parent_hash, store.block(BlockSelector::Number(0)).expect("genesis").hash);
    assert_eq!(head.state.balance(&bob().address()), U256::from(100 * ETH + 1_000));

    let located = store.transaction(tx_hash(&tx)).expect("indexed");
    assert_eq!((located.block_number, located.index), (1, 0));
}

#[test]
fn blocks_chain_by_hash() {
    let store = TestChain::new().store();
    let first = mine_block(&store, &[transfer(&alice(), 0, bob().address(), 1)], &HeaderOverrides::default())
        .expect("first block");
    let second = mine_block(&store, &[transfer(&alice(), 1, bob().address(), 1)], &HeaderOverrides::default())
        .expect("second block");

    let head = store.header(BlockSelector::Hash(second)).expect("second block by hash");
    assert_eq!(head.number, 2);
    assert_eq!(head.parent_hash, first);

    // Simulation on a block selected by hash reports that block's number.
    let api = api_for(store);
    let result = api
        .call_bundle(CallBundleArgs {
            txs: vec![transfer(&alice(), 1, carol().address(), 1)],
            block_number: 2,
            state_block: BlockSelector::Hash(first),
            ..Default::default()
        })
        .expect("nonce 1 is next after block 1");
    assert_eq!(result.state_block_number, 1);
}

#[test]
fn block_gas_limit_is_enforced_when_mining() {
    let store = TestChain::new().with_gas_limit(50_000).store();
    let txs = vec![
        transfer(&alice(), 0, bob().address(), 1),
        transfer(&alice(), 1, bob().address(), 1),
        transfer(&alice(), 2, bob().address(), 1),
    ];

    let err = mine_block(&store, &txs, &HeaderOverrides::default()).expect_err("third transfer does not fit");
    assert!(matches!(err, SimError::Apply { index: 2, .. }), "unexpected error {err:?}");
    assert_eq!(store.head_number(), 0);
}

#[test]
fn bundles_ignore_the_block_gas_limit() {
    let api = TestChain::new().with_gas_limit(50_000).api();
    let txs = (0..3).map(|nonce| transfer(&alice(), nonce, bob().address(), 1)).collect();

    let result = api
        .call_bundle(CallBundleArgs { txs, block_number: 1, ..Default::default() })
        .expect("bundle gets the full gas pool");
    assert_eq!(result.total_gas_used, 63_000);
}

#[test]
fn transaction_error_returns_revert_payload() {
    let store = TestChain::new().store();
    let failing = legacy_tx(&alice(), TxSpec::call(REVERTER, 0).gas(100_000));
    let passing = transfer(&alice(), 1, bob().address(), 1);
    mine_block(&store, &[failing.clone(), passing.clone()], &HeaderOverrides::default()).expect("block mines");
    let api = api_for(store);

    assert_eq!(api.transaction_error(tx_hash(&failing), None).expect("reruns"), Some(nope_payload()));
    assert_eq!(api.transaction_error(tx_hash(&passing), None).expect("reruns"), None);
    assert_eq!(api.transaction_error(alloy::primitives::B256::repeat_byte(7), None).expect("unknown is fine"), None);
}

#[test]
fn has_code_reports_contracts_only() {
    let api = TestChain::new().api();

    assert!(api.has_code(REVERTER, BlockSelector::Latest).expect("state exists"));
    assert!(!api.has_code(alice().address(), BlockSelector::Latest).expect("state exists"));
    assert!(!api.has_code(Address::repeat_byte(0x77), BlockSelector::Number(0)).expect("state exists"));
    assert!(matches!(api.has_code(REVERTER, BlockSelector::Number(5)), Err(SimError::StateUnavailable(_))));
}

#[test]
fn fixture_round_trip_and_replay() {
    let coinbase = Address::repeat_byte(0xcb);
    let mut genesis = Genesis {
        gas_limit: 30_000_000,
        base_fee: Some(BASE_FEE),
        timestamp: 1_700_000_000,
        ..Default::default()
    };
    genesis
        .alloc
        .insert(alice().address(), GenesisAccount { balance: U256::from(10 * ETH), ..Default::default() });

    let fixture = ChainFixture {
        genesis,
        blocks: vec![
            BlockFixture {
                coinbase: Some(coinbase),
                timestamp: Some(1_700_000_012),
                transactions: vec![transfer(&alice(), 0, bob().address(), ETH)],
            },
            BlockFixture { transactions: vec![transfer(&bob(), 0, carol().address(), ETH / 2)], ..Default::default() },
        ],
        ..Default::default()
    };

    let json = serde_json::to_string_pretty(&fixture).expect("serializes");
    let parsed = ChainFixture::from_json(&json).expect("parses");
    assert_eq!(parsed, fixture);

    let store = ChainStore::new(parsed.config.clone(), &parsed.genesis);
    for block in &parsed.blocks {
        let overrides = HeaderOverrides { timestamp: block.timestamp, coinbase: block.coinbase, ..Default::default() };
        mine_block(&store, &block.transactions, &overrides).expect("fixture block mines");
    }

    assert_eq!(store.head_number(), 2);
    let first = store.block(BlockSelector::Number(1)).expect("block 1");
    assert_eq!(first.header.beneficiary, coinbase);
    assert_eq!(first.header.timestamp, 1_700_000_012);

    let head = store.head().expect("head");
    assert_eq!(head.state.balance(&carol().address()), U256::from(ETH / 2));
    assert!(head.state.balance(&coinbase) > U256::ZERO);
}
