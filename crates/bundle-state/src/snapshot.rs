//! Immutable in-memory account state for a single block.
//!
//! A [`SnapshotDb`] is never mutated once it has been published to the chain
//! store. Simulations wrap it in a `CacheDB` so every request gets its own
//! throwaway working copy while sharing the snapshot through an `Arc`.

use std::collections::HashMap;
use std::convert::Infallible;

use alloy::primitives::{Address, B256, U256};
use revm::db::{AccountState, CacheDB, DatabaseRef};
use revm::primitives::{AccountInfo, Bytecode, KECCAK_EMPTY};

use crate::types::Genesis;

/// Read-only state of every account at one block.
#[derive(Clone, Debug, Default)]
pub struct SnapshotDb {
    /// Account headers (balance, nonce, code hash)
    accounts: HashMap<Address, AccountInfo>,
    /// Storage (address -> (slot -> value)); absent slots read as zero
    storage: HashMap<Address, HashMap<U256, U256>>,
    /// Contract code keyed by code hash
    contracts: HashMap<B256, Bytecode>,
    /// Hashes of this block and its ancestors, for BLOCKHASH
    block_hashes: HashMap<u64, B256>,
}

impl SnapshotDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the state described by a genesis allocation.
    pub fn from_genesis(genesis: &Genesis) -> Self {
        let mut db = Self::new();
        for (address, account) in &genesis.alloc {
            let mut info = AccountInfo { balance: account.balance, nonce: account.nonce, ..Default::default() };
            if let Some(code) = account.code.as_ref().filter(|code| !code.is_empty()) {
                let bytecode = Bytecode::new_raw(code.clone());
                info.code_hash = bytecode.hash_slow();
                info.code = Some(bytecode);
            }
            db.insert_account(*address, info);
            for (slot, value) in &account.storage {
                db.set_storage(*address, U256::from_be_slice(slot.as_slice()), U256::from_be_slice(value.as_slice()));
            }
        }
        db
    }

    /// Pre-populate the account table from a map.
    ///
    /// Code carried by the infos is indexed by hash as well.
    pub fn with_accounts(mut self, accounts: HashMap<Address, AccountInfo>) -> Self {
        for (address, info) in accounts {
            self.insert_account(address, info);
        }
        self
    }

    /// Pre-populate storage from a map.
    pub fn with_storage(mut self, storage: HashMap<Address, HashMap<U256, U256>>) -> Self {
        self.storage = storage;
        self
    }

    pub fn insert_account(&mut self, address: Address, info: AccountInfo) {
        if let Some(code) = info.code.as_ref().filter(|code| !code.is_empty()) {
            self.contracts.entry(info.code_hash).or_insert_with(|| code.clone());
        }
        self.accounts.insert(address, info);
    }

    pub fn set_storage(&mut self, address: Address, slot: U256, value: U256) {
        self.storage.entry(address).or_default().insert(slot, value);
    }

    pub fn insert_block_hash(&mut self, number: u64, hash: B256) {
        self.block_hashes.insert(number, hash);
    }

    pub fn account(&self, address: &Address) -> Option<&AccountInfo> {
        self.accounts.get(address)
    }

    pub fn balance(&self, address: &Address) -> U256 {
        self.accounts.get(address).map(|info| info.balance).unwrap_or_default()
    }

    pub fn storage_at(&self, address: &Address, slot: U256) -> U256 {
        self.storage.get(address).and_then(|slots| slots.get(&slot)).copied().unwrap_or_default()
    }

    /// Produces the successor snapshot: this state with every change recorded
    /// in `working` folded in.
    ///
    /// Accounts the working copy marks as non-existent (self-destructed or
    /// never created) are dropped. Storage-cleared accounts lose all slots
    /// before their new slots are written.
    pub fn apply_changes<ExtDB>(&self, working: &CacheDB<ExtDB>) -> Self {
        let mut next = self.clone();

        for (address, account) in &working.accounts {
            match account.account_state {
                AccountState::NotExisting => {
                    next.accounts.remove(address);
                    next.storage.remove(address);
                    continue;
                }
                AccountState::StorageCleared => {
                    next.storage.remove(address);
                }
                AccountState::Touched | AccountState::None => {}
            }

            next.insert_account(*address, account.info.clone());
            if !account.storage.is_empty() {
                let slots = next.storage.entry(*address).or_default();
                for (slot, value) in &account.storage {
                    slots.insert(*slot, *value);
                }
            }
        }

        for (hash, code) in &working.contracts {
            if *hash != KECCAK_EMPTY && !hash.is_zero() {
                next.contracts.entry(*hash).or_insert_with(|| code.clone());
            }
        }

        next
    }
}

impl DatabaseRef for SnapshotDb {
    type Error = Infallible;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        Ok(self.accounts.get(&address).cloned())
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        Ok(self.contracts.get(&code_hash).cloned().unwrap_or_default())
    }

    fn storage_ref(&self, address: Address, slot: U256) -> Result<U256, Self::Error> {
        Ok(self.storage_at(&address, slot))
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        Ok(self.block_hashes.get(&number).copied().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GenesisAccount;
    use alloy::primitives::{address, Bytes};
    use revm::{Database, DatabaseCommit};
    use std::sync::Arc;

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0000000000000000000000000000000000000b0b");

    #[test]
    fn test_genesis_allocation() {
        let mut genesis = Genesis::default();
        genesis.alloc.insert(
            ALICE,
            GenesisAccount {
                balance: U256::from(1_000),
                nonce: 3,
                code: Some(Bytes::from_static(&[0x60, 0x00])),
                storage: [(B256::with_last_byte(1), B256::with_last_byte(9))].into_iter().collect(),
            },
        );

        let db = SnapshotDb::from_genesis(&genesis);
        let info = db.basic_ref(ALICE).unwrap().unwrap();
        assert_eq!(info.balance, U256::from(1_000));
        assert_eq!(info.nonce, 3);
        assert_ne!(info.code_hash, KECCAK_EMPTY);
        assert_eq!(db.code_by_hash_ref(info.code_hash).unwrap().original_bytes().as_ref(), &[0x60, 0x00]);
        assert_eq!(db.storage_ref(ALICE, U256::from(1)).unwrap(), U256::from(9));
    }

    #[test]
    fn test_missing_storage_reads_zero() {
        let db = SnapshotDb::new();
        assert_eq!(db.storage_ref(BOB, U256::from(5)).unwrap(), U256::ZERO);
        assert!(db.basic_ref(BOB).unwrap().is_none());
    }

    #[test]
    fn test_apply_changes_leaves_parent_untouched() {
        let parent = Arc::new(SnapshotDb::new().with_accounts(HashMap::from([(
            ALICE,
            AccountInfo { balance: U256::from(500), ..Default::default() },
        )])));

        let mut working = CacheDB::new(Arc::clone(&parent));
        let mut alice = working.basic(ALICE).unwrap().unwrap();
        alice.balance = U256::from(200);
        working.insert_account_info(ALICE, alice);
        working.insert_account_info(BOB, AccountInfo { balance: U256::from(300), ..Default::default() });
        working.insert_account_storage(BOB, U256::from(1), U256::from(42)).unwrap();

        let child = parent.apply_changes(&working);
        assert_eq!(child.balance(&ALICE), U256::from(200));
        assert_eq!(child.balance(&BOB), U256::from(300));
        assert_eq!(child.storage_at(&BOB, U256::from(1)), U256::from(42));

        assert_eq!(parent.balance(&ALICE), U256::from(500));
        assert!(parent.account(&BOB).is_none());
    }

    #[test]
    fn test_apply_changes_drops_destroyed_accounts() {
        let parent = Arc::new(SnapshotDb::new().with_accounts(HashMap::from([(
            ALICE,
            AccountInfo { balance: U256::from(1), ..Default::default() },
        )])));

        let mut working = CacheDB::new(Arc::clone(&parent));
        let mut account = revm::primitives::Account::from(AccountInfo::default());
        account.mark_touch();
        account.mark_selfdestruct();
        working.commit(HashMap::from([(ALICE, account)]).into_iter().collect());

        let child = parent.apply_changes(&working);
        assert!(child.account(&ALICE).is_none());
    }
}
