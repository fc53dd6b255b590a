//! Errors surfaced by the simulator to its callers.

use std::time::Duration;

use alloy::primitives::B256;
use thiserror::Error;

/// Everything that aborts a request. Reverts and halts inside a transaction
/// are not errors; they are recorded in the per-transaction result.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("bundle missing txs")]
    EmptyBundle,

    #[error("bundle missing blockNumber")]
    MissingBlockNumber,

    #[error("transaction {index} is malformed: {reason}")]
    MalformedTransaction { index: usize, reason: String },

    #[error("state unavailable: {0}")]
    StateUnavailable(String),

    #[error("invalid state override: {0}")]
    StateOverride(String),

    /// The engine refused the transaction (nonce, balance, fee cap, gas pool).
    #[error("could not apply tx {index} [{hash}]: {reason}")]
    Apply { index: usize, hash: B256, reason: String },

    #[error("invalid call arguments at index {index}: {reason}")]
    InvalidArgs { index: usize, reason: String },

    #[error("call {index} could not be executed: {reason}")]
    Call { index: usize, reason: String },

    #[error("execution aborted (timeout = {0:?})")]
    Timeout(Duration),

    #[error("transaction {0} not found")]
    TransactionNotFound(B256),

    #[error("unknown tracer {0:?}")]
    UnknownTracer(String),

    #[error("chain store: {0}")]
    Chain(String),

    #[error("failed to encode result: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl SimError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SimError::Timeout(_))
    }
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;
