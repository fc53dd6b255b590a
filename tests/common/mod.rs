//! Shared test helpers and utilities.
//!
//! Provides deterministic signers, signed transaction builders, hand-assembled
//! contract bytecode and an in-memory chain factory.

#![allow(dead_code)]

use std::sync::Arc;

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{address, keccak256, Address, Bytes, TxKind, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol_types::{Revert, SolError};
use bundle_sim::{BundleApi, SimConfig};
use bundle_state::{ChainConfig, ChainStore, Genesis, GenesisAccount};

pub const GWEI: u128 = 1_000_000_000;
pub const ETH: u128 = 1_000_000_000_000_000_000;

/// Genesis base fee: 1 gwei.
pub const BASE_FEE: u64 = 1_000_000_000;

pub const COINBASE: Address = address!("00000000000000000000000000000000000c0b05");
pub const REVERTER: Address = address!("000000000000000000000000000000000000dead");
pub const FORWARDER: Address = address!("000000000000000000000000000000000000f0f0");
pub const ZERO_FORWARDER: Address = address!("000000000000000000000000000000000000f000");
pub const CALLCODE_FORWARDER: Address = address!("000000000000000000000000000000000000cc0d");
pub const TIPPER: Address = address!("0000000000000000000000000000000000007199");
pub const WRITER: Address = address!("0000000000000000000000000000000000005705");
pub const LOOPER: Address = address!("0000000000000000000000000000000000001009");
pub const CLOCK: Address = address!("000000000000000000000000000000000000c10c");

/// Deterministic signer derived from a one-byte private key.
///
/// # Example
/// ```ignore
/// let alice = signer(1);
/// ```
pub fn signer(seed: u8) -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&B256::with_last_byte(seed)).expect("non-zero key is valid")
}

pub fn alice() -> PrivateKeySigner {
    signer(1)
}

pub fn bob() -> PrivateKeySigner {
    signer(2)
}

pub fn carol() -> PrivateKeySigner {
    signer(3)
}

/// Parameters of a test transaction. Defaults to a 21k-gas legacy call at 2 gwei.
#[derive(Clone, Debug)]
pub struct TxSpec {
    pub nonce: u64,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: u128,
    pub input: Bytes,
}

impl Default for TxSpec {
    fn default() -> Self {
        Self {
            nonce: 0,
            to: None,
            value: U256::ZERO,
            gas_limit: 21_000,
            gas_price: 2 * GWEI,
            input: Bytes::new(),
        }
    }
}

impl TxSpec {
    pub fn call(to: Address, nonce: u64) -> Self {
        Self { to: Some(to), nonce, ..Default::default() }
    }

    pub fn value(mut self, wei: u128) -> Self {
        self.value = U256::from(wei);
        self
    }

    pub fn gas(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn price(mut self, gas_price: u128) -> Self {
        self.gas_price = gas_price;
        self
    }

    fn kind(&self) -> TxKind {
        self.to.map_or(TxKind::Create, TxKind::Call)
    }
}

/// Signs a legacy (EIP-155) transaction and returns its EIP-2718 encoding.
pub fn legacy_tx(signer: &PrivateKeySigner, spec: TxSpec) -> Bytes {
    let tx = TxLegacy {
        chain_id: Some(1),
        nonce: spec.nonce,
        gas_price: spec.gas_price,
        gas_limit: spec.gas_limit,
        to: spec.kind(),
        value: spec.value,
        input: spec.input,
    };
    let signature = signer.sign_hash_sync(&tx.signature_hash()).expect("signing works");
    let envelope: TxEnvelope = tx.into_signed(signature).into();
    envelope.encoded_2718().into()
}

/// Signs a dynamic-fee transaction, using `TxSpec::gas_price` as the fee cap.
pub fn dynamic_tx(signer: &PrivateKeySigner, spec: TxSpec, max_priority_fee_per_gas: u128) -> Bytes {
    let tx = TxEip1559 {
        chain_id: 1,
        nonce: spec.nonce,
        gas_limit: spec.gas_limit,
        max_fee_per_gas: spec.gas_price,
        max_priority_fee_per_gas,
        to: spec.kind(),
        value: spec.value,
        access_list: Default::default(),
        input: spec.input,
    };
    let signature = signer.sign_hash_sync(&tx.signature_hash()).expect("signing works");
    let envelope: TxEnvelope = tx.into_signed(signature).into();
    envelope.encoded_2718().into()
}

/// Plain legacy value transfer.
pub fn transfer(from: &PrivateKeySigner, nonce: u64, to: Address, wei: u128) -> Bytes {
    legacy_tx(from, TxSpec::call(to, nonce).value(wei))
}

/// Hash of an encoded transaction (keccak of its EIP-2718 bytes).
pub fn tx_hash(raw: &Bytes) -> B256 {
    keccak256(raw)
}

/// ABI payload of `Error("nope")`.
pub fn nope_payload() -> Bytes {
    Revert { reason: "nope".into() }.abi_encode().into()
}

/// Reverts with `Error("nope")`.
///
/// `CODECOPY` the 100-byte payload appended after the 12 opcode bytes, then `REVERT`.
pub fn reverter_code() -> Bytes {
    let mut code = vec![0x60, 0x64, 0x60, 0x0c, 0x60, 0x00, 0x39, 0x60, 0x64, 0x60, 0x00, 0xfd];
    code.extend_from_slice(&nope_payload());
    code.into()
}

/// Forwards `msg.value` to `target` with a plain `CALL`.
pub fn forwarder_code(target: Address) -> Bytes {
    let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x34, 0x73];
    code.extend_from_slice(target.as_slice());
    code.extend_from_slice(&[0x5a, 0xf1, 0x50, 0x00]);
    code.into()
}

/// Runs `target`'s code via `CALLCODE`, passing along `msg.value`.
pub fn callcode_forwarder_code(target: Address) -> Bytes {
    let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x34, 0x73];
    code.extend_from_slice(target.as_slice());
    code.extend_from_slice(&[0x5a, 0xf2, 0x50, 0x00]);
    code.into()
}

/// Calls `target` with zero value.
pub fn zero_value_forwarder_code(target: Address) -> Bytes {
    let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73];
    code.extend_from_slice(target.as_slice());
    code.extend_from_slice(&[0x5a, 0xf1, 0x50, 0x00]);
    code.into()
}

/// Forwards `msg.value` to the block coinbase.
pub fn coinbase_tipper_code() -> Bytes {
    Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x34, 0x41, 0x5a, 0xf1, 0x50, 0x00])
}

/// Stores 1 into slot 0.
pub fn writer_code() -> Bytes {
    Bytes::from_static(&[0x60, 0x01, 0x60, 0x00, 0x55, 0x00])
}

/// Jumps to itself until gas runs out.
pub fn looper_code() -> Bytes {
    Bytes::from_static(&[0x5b, 0x60, 0x00, 0x56])
}

/// Returns the block timestamp as a 32-byte word.
pub fn clock_code() -> Bytes {
    Bytes::from_static(&[0x42, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3])
}

/// Builder for an in-memory chain.
///
/// Alice, Bob and Carol start with 100 ETH each; every helper contract above
/// is deployed at genesis.
pub struct TestChain {
    config: ChainConfig,
    genesis: Genesis,
}

impl Default for TestChain {
    fn default() -> Self {
        Self::new()
    }
}

impl TestChain {
    pub fn new() -> Self {
        let mut chain = Self {
            config: ChainConfig::default(),
            genesis: Genesis {
                gas_limit: 30_000_000,
                base_fee: Some(BASE_FEE),
                timestamp: 1_700_000_000,
                coinbase: COINBASE,
                ..Default::default()
            },
        };
        for account in [alice(), bob(), carol()] {
            chain = chain.with_balance(account.address(), 100 * ETH);
        }
        let bob = bob().address();
        chain
            .with_code(REVERTER, reverter_code())
            .with_code(FORWARDER, forwarder_code(bob))
            .with_code(ZERO_FORWARDER, zero_value_forwarder_code(bob))
            .with_code(CALLCODE_FORWARDER, callcode_forwarder_code(bob))
            .with_code(TIPPER, coinbase_tipper_code())
            .with_code(WRITER, writer_code())
            .with_code(LOOPER, looper_code())
            .with_code(CLOCK, clock_code())
    }

    pub fn with_balance(mut self, address: Address, wei: u128) -> Self {
        self.genesis.alloc.entry(address).or_default().balance = U256::from(wei);
        self
    }

    pub fn with_code(mut self, address: Address, code: Bytes) -> Self {
        self.genesis.alloc.entry(address).or_insert_with(GenesisAccount::default).code = Some(code);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.genesis.gas_limit = gas_limit;
        self
    }

    pub fn store(self) -> Arc<ChainStore> {
        Arc::new(ChainStore::new(self.config, &self.genesis))
    }

    pub fn api(self) -> BundleApi<ChainStore> {
        api_for(self.store())
    }
}

pub fn api_for(store: Arc<ChainStore>) -> BundleApi<ChainStore> {
    BundleApi::new(store, SimConfig::default())
}
