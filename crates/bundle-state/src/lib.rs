//! bundle-state: the account/state store consumed by the bundle simulator.
//!
//! Holds immutable per-block state snapshots, the headers and transactions
//! that produced them, and the state-override plumbing applied to working
//! copies before simulation.

pub mod chain;
pub mod fixture;
pub mod overrides;
pub mod snapshot;
pub mod types;

pub use chain::{ChainStore, IndexedTransaction, StateProvider, StoredBlock, WorkingState};
pub use fixture::{BlockFixture, ChainFixture};
pub use overrides::{AccountOverride, StateOverride};
pub use snapshot::SnapshotDb;
pub use types::{BlockSelector, ChainConfig, Genesis, GenesisAccount, Hardfork};
