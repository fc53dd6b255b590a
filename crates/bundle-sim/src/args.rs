//! Request payloads accepted by the simulator.
//!
//! Field names follow the JSON-RPC conventions (`camelCase`, hex quantities).

use alloy::consensus::{Transaction, TxEnvelope};
use alloy::primitives::{Address, Bytes, TxKind, U256};
use bundle_state::{BlockSelector, StateOverride};
use revm::primitives::TxEnv;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::header::HeaderOverrides;

/// Arguments of a bundle simulation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallBundleArgs {
    /// EIP-2718 encoded signed transactions, executed in order.
    pub txs: Vec<Bytes>,
    /// Number of the synthetic block the bundle runs in. Must be non-zero.
    #[serde(default)]
    pub block_number: u64,
    #[serde(default, rename = "stateBlockNumber")]
    pub state_block: BlockSelector,
    #[serde(default)]
    pub coinbase: Option<Address>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    /// Milliseconds; zero disables the limit.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub gas_limit: Option<u64>,
    #[serde(default)]
    pub difficulty: Option<U256>,
    #[serde(default)]
    pub base_fee: Option<U256>,
    #[serde(default)]
    pub state_override: Option<StateOverride>,
}

impl CallBundleArgs {
    pub fn header_overrides(&self) -> HeaderOverrides {
        HeaderOverrides {
            timestamp: self.timestamp,
            coinbase: self.coinbase,
            difficulty: self.difficulty,
            gas_limit: self.gas_limit,
            base_fee: self.base_fee,
        }
    }
}

/// Arguments of a bundle gas estimation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateGasBundleArgs {
    pub txs: Vec<TransactionArgs>,
    #[serde(default)]
    pub block_number: u64,
    #[serde(default, rename = "stateBlockNumber")]
    pub state_block: BlockSelector,
    #[serde(default)]
    pub coinbase: Option<Address>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl EstimateGasBundleArgs {
    pub fn header_overrides(&self) -> HeaderOverrides {
        HeaderOverrides { timestamp: self.timestamp, coinbase: self.coinbase, ..Default::default() }
    }
}

/// An unsigned call description.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Bytes>,
}

impl TransactionArgs {
    /// Call description equivalent to an already signed transaction.
    pub fn from_envelope(tx: &TxEnvelope, sender: Address) -> Self {
        let (gas_price, max_fee_per_gas, max_priority_fee_per_gas) = match tx.max_priority_fee_per_gas() {
            Some(tip) => (None, Some(U256::from(tx.max_fee_per_gas())), Some(U256::from(tip))),
            None => (Some(U256::from(tx.max_fee_per_gas())), None, None),
        };
        Self {
            from: Some(sender),
            to: tx.to(),
            gas: Some(tx.gas_limit()),
            gas_price,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            value: Some(tx.value()),
            data: None,
            input: Some(tx.input().clone()),
        }
    }

    pub fn call_data(&self) -> Result<Bytes, String> {
        match (&self.input, &self.data) {
            (Some(input), Some(data)) if input != data => {
                Err("both \"data\" and \"input\" are set and not equal".to_string())
            }
            (Some(input), _) => Ok(input.clone()),
            (None, Some(data)) => Ok(data.clone()),
            (None, None) => Ok(Bytes::new()),
        }
    }

    /// Turns the call into an engine transaction.
    ///
    /// Gas defaults to `gas_cap` and is clamped to it (zero disables the cap).
    /// With a base fee in effect, a set `gasPrice` is used as both fee caps;
    /// otherwise the dynamic-fee fields apply. The nonce is not checked.
    pub fn to_tx_env(&self, gas_cap: u64, base_fee: Option<U256>) -> Result<TxEnv, String> {
        if self.gas_price.is_some() && (self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some()) {
            return Err("both gasPrice and (maxFeePerGas or maxPriorityFeePerGas) specified".to_string());
        }

        let mut gas = self.gas.unwrap_or(if gas_cap == 0 { u64::MAX / 2 } else { gas_cap });
        if gas_cap != 0 && gas > gas_cap {
            warn!(requested = gas, cap = gas_cap, "caller gas above allowance, capping");
            gas = gas_cap;
        }

        let (gas_price, gas_priority_fee) = match (base_fee, self.gas_price) {
            (None, gas_price) => (gas_price.unwrap_or_default(), None),
            (Some(_), Some(gas_price)) => (gas_price, Some(gas_price)),
            (Some(_), None) => {
                let fee_cap = self.max_fee_per_gas.unwrap_or_default();
                let tip_cap = self.max_priority_fee_per_gas.unwrap_or_default();
                if tip_cap > fee_cap {
                    return Err(format!("maxFeePerGas ({fee_cap}) < maxPriorityFeePerGas ({tip_cap})"));
                }
                (fee_cap, Some(tip_cap))
            }
        };

        let mut env = TxEnv::default();
        env.caller = self.from.unwrap_or_default();
        env.gas_limit = gas;
        env.gas_price = gas_price;
        env.gas_priority_fee = gas_priority_fee;
        env.transact_to = self.to.map_or(TxKind::Create, TxKind::Call);
        env.value = self.value.unwrap_or_default();
        env.data = self.call_data()?;
        env.nonce = None;
        Ok(env)
    }
}

/// Tracer selection for `trace_transaction`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceConfig {
    #[serde(default)]
    pub tracer: Option<String>,
    /// Milliseconds; zero disables the limit.
    #[serde(default)]
    pub timeout: Option<u64>,
}
