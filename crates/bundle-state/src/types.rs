//! Chain-level types shared by the state store and the simulator.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alloy::consensus::Header;
use alloy::eips::eip1559::{calc_next_block_base_fee, BaseFeeParams, INITIAL_BASE_FEE};
use alloy::primitives::{Address, Bytes, B256, U256};
use revm::primitives::SpecId;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default block gas limit used when a genesis does not name one.
pub const DEFAULT_GAS_LIMIT: u64 = 30_000_000;

/// Identifies which stored state a request should run on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlockSelector {
    Number(u64),
    Hash(B256),
    #[default]
    Latest,
}

impl fmt::Display for BlockSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSelector::Number(number) => write!(f, "{number}"),
            BlockSelector::Hash(hash) => write!(f, "{hash}"),
            BlockSelector::Latest => f.write_str("latest"),
        }
    }
}

impl FromStr for BlockSelector {
    type Err = String;

    /// Accepts `latest`, a decimal or `0x` block number, or a 32-byte block hash.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") || s.eq_ignore_ascii_case("pending") {
            return Ok(BlockSelector::Latest);
        }
        if let Some(hex) = s.strip_prefix("0x") {
            if hex.len() == 64 {
                return B256::from_str(s)
                    .map(BlockSelector::Hash)
                    .map_err(|e| format!("invalid block hash {s}: {e}"));
            }
            return u64::from_str_radix(hex, 16)
                .map(BlockSelector::Number)
                .map_err(|e| format!("invalid block number {s}: {e}"));
        }
        s.parse::<u64>()
            .map(BlockSelector::Number)
            .map_err(|e| format!("invalid block selector {s}: {e}"))
    }
}

impl Serialize for BlockSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            BlockSelector::Number(number) => serializer.serialize_u64(*number),
            BlockSelector::Hash(hash) => hash.serialize(serializer),
            BlockSelector::Latest => serializer.serialize_str("latest"),
        }
    }
}

impl<'de> Deserialize<'de> for BlockSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(number) => Ok(BlockSelector::Number(number)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Protocol rule sets the engine can be configured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hardfork {
    Berlin,
    London,
    Merge,
    Shanghai,
    #[default]
    Cancun,
}

impl Hardfork {
    pub fn spec_id(self) -> SpecId {
        match self {
            Hardfork::Berlin => SpecId::BERLIN,
            Hardfork::London => SpecId::LONDON,
            Hardfork::Merge => SpecId::MERGE,
            Hardfork::Shanghai => SpecId::SHANGHAI,
            Hardfork::Cancun => SpecId::CANCUN,
        }
    }
}

/// Chain parameters: identifier, active rule set and the base-fee activation height.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    pub chain_id: u64,
    #[serde(default)]
    pub hardfork: Hardfork,
    /// First block carrying a base fee. `None` means the chain never activates it.
    #[serde(default)]
    pub london_block: Option<u64>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { chain_id: 1, hardfork: Hardfork::Cancun, london_block: Some(0) }
    }
}

impl ChainConfig {
    pub fn spec_id(&self) -> SpecId {
        self.hardfork.spec_id()
    }

    pub fn is_london(&self, number: u64) -> bool {
        self.london_block.is_some_and(|fork| number >= fork)
    }

    /// Base fee of the block following `parent` under the EIP-1559 update rule.
    ///
    /// The fork block itself starts at the initial base fee.
    pub fn next_base_fee(&self, parent: &Header) -> u64 {
        if !self.is_london(parent.number) {
            return INITIAL_BASE_FEE;
        }
        let parent_base_fee = parent.base_fee_per_gas.unwrap_or(INITIAL_BASE_FEE);
        calc_next_block_base_fee(
            parent.gas_used,
            parent.gas_limit,
            parent_base_fee,
            BaseFeeParams::ethereum(),
        )
    }
}

/// Initial allocation for a freshly created chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genesis {
    #[serde(default)]
    pub alloc: BTreeMap<Address, GenesisAccount>,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default)]
    pub base_fee: Option<u64>,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub coinbase: Address,
    #[serde(default)]
    pub difficulty: U256,
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    #[serde(default)]
    pub balance: U256,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub code: Option<Bytes>,
    #[serde(default)]
    pub storage: BTreeMap<B256, B256>,
}
