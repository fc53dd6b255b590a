//! Coinbase accounting for simulated bundles.
//!
//! A transaction pays the block producer two ways: the priority part of its
//! gas price (`gasFees`) and plain value sent to the coinbase address by the
//! executed code (`ethSentToCoinbase`). Only the coinbase balance change is
//! observable, so the direct payment is derived as `coinbaseDiff - gasFees`.

use alloy::primitives::U256;

/// Per-gas amount the coinbase earns from a transaction's fee.
///
/// With a base fee this is `min(tip_cap, fee_cap - base_fee)`; legacy
/// transactions use their gas price for both caps. Without a base fee the
/// whole tip cap goes to the coinbase. Returns `None` if the fee cap is below
/// the base fee.
pub fn effective_tip(max_fee_per_gas: u128, max_priority_fee_per_gas: Option<u128>, base_fee: Option<u128>) -> Option<u128> {
    let tip_cap = max_priority_fee_per_gas.unwrap_or(max_fee_per_gas);
    match base_fee {
        None => Some(tip_cap),
        Some(base_fee) => max_fee_per_gas.checked_sub(base_fee).map(|headroom| headroom.min(tip_cap)),
    }
}

/// Coinbase earnings per unit of gas. Zero gas yields zero.
pub fn implied_gas_price(coinbase_diff: U256, gas_used: u64) -> U256 {
    if gas_used == 0 {
        return U256::ZERO;
    }
    coinbase_diff / U256::from(gas_used)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TxEconomics {
    pub coinbase_diff: U256,
    pub gas_fees: U256,
    pub eth_sent_to_coinbase: U256,
    pub implied_gas_price: U256,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BundleEconomics {
    pub coinbase_diff: U256,
    pub gas_fees: U256,
    pub eth_sent_to_coinbase: U256,
    pub bundle_gas_price: U256,
    pub total_gas_used: u64,
}

/// Tracks coinbase balance movement across a bundle.
///
/// Balance drops (the coinbase itself spending) report as zero earnings.
#[derive(Clone, Debug)]
pub struct CoinbaseLedger {
    balance_at_start: U256,
    balance_before_tx: U256,
    gas_fees: U256,
    total_gas_used: u64,
}

impl CoinbaseLedger {
    pub fn new(balance_at_start: U256) -> Self {
        Self { balance_at_start, balance_before_tx: balance_at_start, gas_fees: U256::ZERO, total_gas_used: 0 }
    }

    pub fn begin_tx(&mut self, balance: U256) {
        self.balance_before_tx = balance;
    }

    pub fn finish_tx(&mut self, balance_after: U256, gas_used: u64, tip: u128) -> TxEconomics {
        let coinbase_diff = balance_after.saturating_sub(self.balance_before_tx);
        let gas_fees = U256::from(gas_used) * U256::from(tip);

        self.gas_fees += gas_fees;
        self.total_gas_used += gas_used;

        TxEconomics {
            coinbase_diff,
            gas_fees,
            eth_sent_to_coinbase: coinbase_diff.saturating_sub(gas_fees),
            implied_gas_price: implied_gas_price(coinbase_diff, gas_used),
        }
    }

    pub fn finish(self, balance_after: U256) -> BundleEconomics {
        let coinbase_diff = balance_after.saturating_sub(self.balance_at_start);
        BundleEconomics {
            coinbase_diff,
            gas_fees: self.gas_fees,
            eth_sent_to_coinbase: coinbase_diff.saturating_sub(self.gas_fees),
            bundle_gas_price: implied_gas_price(coinbase_diff, self.total_gas_used),
            total_gas_used: self.total_gas_used,
        }
    }
}
