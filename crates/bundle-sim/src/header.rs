//! Synthetic block context for simulated blocks.

use alloy::consensus::Header;
use alloy::primitives::{Address, B256, U256};
use bundle_state::ChainConfig;
use revm::primitives::{BlobExcessGasAndPrice, BlockEnv, SpecId};

/// Caller-supplied replacements for the inherited header fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeaderOverrides {
    pub timestamp: Option<u64>,
    pub coinbase: Option<Address>,
    pub difficulty: Option<U256>,
    pub gas_limit: Option<u64>,
    pub base_fee: Option<U256>,
}

/// Block context a bundle executes in. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntheticHeader {
    pub parent_hash: B256,
    pub number: u64,
    pub gas_limit: u64,
    pub timestamp: u64,
    pub difficulty: U256,
    pub coinbase: Address,
    pub base_fee: Option<U256>,
}

impl SyntheticHeader {
    /// Builds the header for block `number` on top of `parent`.
    ///
    /// Unset fields inherit from the parent, the timestamp defaults to one
    /// second after it, and when the base-fee rules are active the base fee
    /// follows the EIP-1559 update from the parent.
    pub fn synthesize(config: &ChainConfig, parent: &Header, number: u64, overrides: &HeaderOverrides) -> Self {
        let base_fee = overrides
            .base_fee
            .or_else(|| config.is_london(number).then(|| U256::from(config.next_base_fee(parent))));

        Self {
            parent_hash: parent.hash_slow(),
            number,
            gas_limit: overrides.gas_limit.unwrap_or(parent.gas_limit),
            timestamp: overrides.timestamp.unwrap_or(parent.timestamp.saturating_add(1)),
            difficulty: overrides.difficulty.unwrap_or(parent.difficulty),
            coinbase: overrides.coinbase.unwrap_or(parent.beneficiary),
            base_fee,
        }
    }

    /// Mirror of an already sealed header, used when replaying its block.
    pub fn from_sealed(header: &Header) -> Self {
        Self {
            parent_hash: header.parent_hash,
            number: header.number,
            gas_limit: header.gas_limit,
            timestamp: header.timestamp,
            difficulty: header.difficulty,
            coinbase: header.beneficiary,
            base_fee: header.base_fee_per_gas.map(U256::from),
        }
    }

    pub fn base_fee_u128(&self) -> Option<u128> {
        self.base_fee.map(|fee| fee.saturating_to::<u128>())
    }

    /// Engine view of this header.
    pub fn block_env(&self, config: &ChainConfig) -> BlockEnv {
        let spec = config.spec_id();
        BlockEnv {
            number: U256::from(self.number),
            timestamp: U256::from(self.timestamp),
            gas_limit: U256::from(self.gas_limit),
            basefee: self.base_fee.unwrap_or_default(),
            difficulty: self.difficulty,
            prevrandao: spec.is_enabled_in(SpecId::MERGE).then(|| B256::from(self.difficulty)),
            coinbase: self.coinbase,
            blob_excess_gas_and_price: spec
                .is_enabled_in(SpecId::CANCUN)
                .then_some(BlobExcessGasAndPrice { excess_blob_gas: 0, blob_gasprice: 1 }),
        }
    }

    /// Sealable header carrying this context and the gas used by its transactions.
    pub fn to_header(&self, gas_used: u64) -> Header {
        Header {
            parent_hash: self.parent_hash,
            number: self.number,
            gas_limit: self.gas_limit,
            gas_used,
            timestamp: self.timestamp,
            beneficiary: self.coinbase,
            difficulty: self.difficulty,
            mix_hash: B256::from(self.difficulty),
            base_fee_per_gas: self.base_fee.map(|fee| fee.saturating_to::<u64>()),
            ..Default::default()
        }
    }
}
