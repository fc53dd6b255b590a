//! bundle-sim: speculative bundle simulation and value-transfer tracing.
//!
//! Runs ordered bundles of signed transactions against a historical state on
//! a synthetic next block, reports gas and coinbase economics per
//! transaction and per bundle, estimates gas for unsigned call bundles, and
//! traces native-currency movement of included transactions.

pub mod api;
pub mod args;
pub mod bundle_hash;
pub mod config;
pub mod deadline;
pub mod economics;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod executor;
pub mod header;
pub mod miner;
pub mod results;
pub mod revert;
pub mod serde_helpers;
pub mod tracer;

pub use api::BundleApi;
pub use args::{CallBundleArgs, EstimateGasBundleArgs, TraceConfig, TransactionArgs};
pub use config::SimConfig;
pub use error::SimError;
pub use results::{BundleResult, GasEstimate, PerTxResult};
pub use tracer::{TracerHandle, TracerResult, TransferFrame, TransferTrace, TransferTracer, TRANSFER_TRACER};
