//! Decoding of revert payloads returned by reverted executions.

use alloy::primitives::Bytes;
use alloy::sol_types::{Panic, Revert, SolError};
use serde::{Deserialize, Serialize};

/// Revert output as reported to callers: the decoded message when the
/// payload is a standard `Error(string)` or `Panic(uint256)`, raw bytes
/// otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RevertReason {
    Decoded(String),
    Raw(Bytes),
}

impl RevertReason {
    /// `None` when the execution reverted without output.
    pub fn decode(output: &Bytes) -> Option<Self> {
        if output.is_empty() {
            return None;
        }
        if let Ok(revert) = Revert::abi_decode(output, true) {
            return Some(RevertReason::Decoded(revert.reason));
        }
        if let Ok(panic) = Panic::abi_decode(output, true) {
            return Some(RevertReason::Decoded(format!("panic code {:#x}", panic.code)));
        }
        Some(RevertReason::Raw(output.clone()))
    }
}
