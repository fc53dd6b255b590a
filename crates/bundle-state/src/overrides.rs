//! Per-request account overrides applied to a working state copy.

use std::collections::BTreeMap;

use alloy::primitives::{Address, Bytes, B256, U256};
use eyre::{bail, Result};
use revm::db::AccountState;
use revm::primitives::Bytecode;
use revm::Database;
use serde::{Deserialize, Serialize};

use crate::chain::WorkingState;

/// Replacement values for one account. Unset fields keep the stored value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    /// Replaces the whole storage of the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BTreeMap<B256, B256>>,
    /// Patches individual slots, leaving the rest intact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_diff: Option<BTreeMap<B256, B256>>,
}

/// Address-keyed set of account overrides.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateOverride(pub BTreeMap<Address, AccountOverride>);

impl StateOverride {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Writes the overrides into `state`. The underlying snapshot is untouched.
    ///
    /// # Errors
    /// Fails if an account sets both `state` and `stateDiff`.
    pub fn apply(&self, state: &mut WorkingState) -> Result<()> {
        for (address, account) in &self.0 {
            if account.state.is_some() && account.state_diff.is_some() {
                bail!("account {address} has both 'state' and 'stateDiff'");
            }

            let mut info = state.basic(*address)?.unwrap_or_default();
            if let Some(nonce) = account.nonce {
                info.nonce = nonce;
            }
            if let Some(balance) = account.balance {
                info.balance = balance;
            }
            if let Some(code) = &account.code {
                let bytecode = Bytecode::new_raw(code.clone());
                info.code_hash = bytecode.hash_slow();
                info.code = Some(bytecode);
            }
            state.insert_account_info(*address, info);
            // A lookup of a missing account caches it as non-existent, which
            // would hide the overridden fields from every later read.
            if let Some(cached) = state.accounts.get_mut(address) {
                if cached.account_state == AccountState::NotExisting {
                    cached.account_state = AccountState::Touched;
                }
            }

            if let Some(slots) = &account.state {
                let storage = slots.iter().map(|(slot, value)| (word(slot), word(value))).collect();
                state.replace_account_storage(*address, storage)?;
            }
            if let Some(diff) = &account.state_diff {
                for (slot, value) in diff {
                    state.insert_account_storage(*address, word(slot), word(value))?;
                }
            }
        }
        Ok(())
    }
}

fn word(value: &B256) -> U256 {
    U256::from_be_slice(value.as_slice())
}
