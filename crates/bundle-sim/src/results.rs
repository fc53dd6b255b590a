//! Result records returned to callers.
//!
//! Wei amounts serialize as base-10 strings; hashes, addresses and return
//! data as `0x`-hex.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::economics::{BundleEconomics, TxEconomics};
use crate::revert::RevertReason;
use crate::serde_helpers::decimal;

/// Outcome of one bundle transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerTxResult {
    #[serde(rename = "txHash")]
    pub hash: B256,
    pub gas_used: u64,
    pub from_address: Address,
    /// `None` for contract creations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<Address>,
    /// Return data of a successful execution.
    #[serde(default, rename = "value", skip_serializing_if = "Option::is_none")]
    pub return_data: Option<Bytes>,
    #[serde(default, rename = "error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, rename = "revert", skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<RevertReason>,
    #[serde(with = "decimal")]
    pub coinbase_diff: U256,
    #[serde(rename = "gasFees", with = "decimal")]
    pub gas_fees_paid: U256,
    #[serde(with = "decimal")]
    pub eth_sent_to_coinbase: U256,
    #[serde(rename = "gasPrice", with = "decimal")]
    pub implied_gas_price: U256,
}

impl PerTxResult {
    pub fn new(hash: B256, from: Address, to: Option<Address>, gas_used: u64, economics: TxEconomics) -> Self {
        Self {
            hash,
            gas_used,
            from_address: from,
            to_address: to,
            return_data: None,
            error_message: None,
            revert_reason: None,
            coinbase_diff: economics.coinbase_diff,
            gas_fees_paid: economics.gas_fees,
            eth_sent_to_coinbase: economics.eth_sent_to_coinbase,
            implied_gas_price: economics.implied_gas_price,
        }
    }

    /// Success means the execution neither reverted nor halted.
    pub fn succeeded(&self) -> bool {
        self.error_message.is_none()
    }
}

/// Outcome of a whole bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleResult {
    pub results: Vec<PerTxResult>,
    #[serde(with = "decimal")]
    pub coinbase_diff: U256,
    #[serde(rename = "gasFees", with = "decimal")]
    pub gas_fees: U256,
    #[serde(with = "decimal")]
    pub eth_sent_to_coinbase: U256,
    #[serde(with = "decimal")]
    pub bundle_gas_price: U256,
    pub total_gas_used: u64,
    pub bundle_hash: B256,
    pub state_block_number: u64,
}

impl BundleResult {
    pub fn new(results: Vec<PerTxResult>, economics: BundleEconomics, bundle_hash: B256, state_block_number: u64) -> Self {
        Self {
            results,
            coinbase_diff: economics.coinbase_diff,
            gas_fees: economics.gas_fees,
            eth_sent_to_coinbase: economics.eth_sent_to_coinbase,
            bundle_gas_price: economics.bundle_gas_price,
            total_gas_used: economics.total_gas_used,
            bundle_hash,
            state_block_number,
        }
    }
}

/// Gas consumed by one estimated call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub gas_used: u64,
}
