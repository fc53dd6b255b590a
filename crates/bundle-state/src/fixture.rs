//! JSON chain fixtures: a genesis allocation plus blocks of raw transactions.
//!
//! ```json
//! {
//!   "config": { "chainId": 1, "hardfork": "cancun", "londonBlock": 0 },
//!   "genesis": { "alloc": { "0x…": { "balance": "0xde0b6b3a7640000" } } },
//!   "blocks": [ { "transactions": ["0x02f8…"] } ]
//! }
//! ```

use std::path::Path;

use alloy::primitives::{Address, Bytes};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::{ChainConfig, Genesis};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainFixture {
    #[serde(default)]
    pub config: ChainConfig,
    pub genesis: Genesis,
    #[serde(default)]
    pub blocks: Vec<BlockFixture>,
}

/// One block to mine on top of the previous one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockFixture {
    #[serde(default)]
    pub coinbase: Option<Address>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub transactions: Vec<Bytes>,
}

impl ChainFixture {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).wrap_err("failed to parse chain fixture")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_json(&json)
    }
}
