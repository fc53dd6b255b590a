mod store;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use bundle_sim::config::{DEFAULT_GAS_CAP, DEFAULT_TIMEOUT};
use bundle_sim::header::HeaderOverrides;
use bundle_sim::miner::mine_block;
use bundle_sim::{BundleApi, BundleResult, CallBundleArgs, EstimateGasBundleArgs, SimConfig, TraceConfig, TRANSFER_TRACER};
use bundle_state::{BlockSelector, ChainFixture, ChainStore};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use crate::store::SimulationStore;

#[derive(Debug, Clone)]
struct AppContext {
    db_path: PathBuf,
    sim: SimConfig,
}

#[derive(Parser, Debug)]
#[command(name = "bundle-sim")]
#[command(about = "Speculative bundle simulator and value-transfer tracer")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[arg(long = "db", global = true, default_value = "data/bundles.sqlite")]
    db_path: PathBuf,

    /// Global gas cap for estimation calls (0 disables). Falls back to BUNDLE_SIM_GAS_CAP.
    #[arg(long, global = true)]
    gas_cap: Option<u64>,

    /// Default per-request timeout in milliseconds (0 disables).
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate a bundle of signed transactions on top of a fixture chain.
    CallBundle(CallBundleCmd),
    /// Estimate gas for a bundle of unsigned calls.
    Estimate(EstimateCmd),
    /// Trace the value transfers of a fixture transaction.
    Trace(TraceCmd),
    /// Show the revert payload of a fixture transaction, if any.
    TxError(TxErrorCmd),
    /// Check whether an address holds code.
    HasCode(HasCodeCmd),
    /// List recently recorded bundle simulations.
    History(HistoryCmd),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Args, Debug)]
struct CallBundleCmd {
    #[arg(long)]
    fixture: PathBuf,

    /// JSON file holding the call-bundle arguments.
    #[arg(long)]
    bundle: PathBuf,

    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Skip writing the result to the history database.
    #[arg(long)]
    no_record: bool,
}

#[derive(Args, Debug)]
struct EstimateCmd {
    #[arg(long)]
    fixture: PathBuf,

    #[arg(long)]
    request: PathBuf,

    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,
}

#[derive(Args, Debug)]
struct TraceCmd {
    #[arg(long)]
    fixture: PathBuf,

    #[arg(long)]
    tx: B256,

    #[arg(long, default_value = TRANSFER_TRACER)]
    tracer: String,
}

#[derive(Args, Debug)]
struct TxErrorCmd {
    #[arg(long)]
    fixture: PathBuf,

    #[arg(long)]
    tx: B256,
}

#[derive(Args, Debug)]
struct HasCodeCmd {
    #[arg(long)]
    fixture: PathBuf,

    #[arg(long)]
    address: Address,

    #[arg(long, default_value = "latest")]
    block: BlockSelector,
}

#[derive(Args, Debug)]
struct HistoryCmd {
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    let ctx = AppContext { db_path: cli.db_path, sim: sim_config(cli.gas_cap, cli.timeout_ms)? };

    match cli.command {
        Commands::CallBundle(args) => handle_call_bundle(&ctx, args).await,
        Commands::Estimate(args) => handle_estimate(&ctx, args).await,
        Commands::Trace(args) => handle_trace(&ctx, args).await,
        Commands::TxError(args) => handle_tx_error(&ctx, args).await,
        Commands::HasCode(args) => handle_has_code(&ctx, args).await,
        Commands::History(args) => handle_history(&ctx, args),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn sim_config(gas_cap: Option<u64>, timeout_ms: Option<u64>) -> Result<SimConfig> {
    let gas_cap = match gas_cap {
        Some(cap) => cap,
        None => match std::env::var("BUNDLE_SIM_GAS_CAP") {
            Ok(raw) => raw.parse().wrap_err("BUNDLE_SIM_GAS_CAP must be an integer")?,
            Err(_) => DEFAULT_GAS_CAP,
        },
    };
    let default_timeout = timeout_ms.map(Duration::from_millis).unwrap_or(DEFAULT_TIMEOUT);
    Ok(SimConfig { default_timeout, gas_cap })
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).wrap_err_with(|| format!("failed to parse {}", path.display()))
}

/// Builds the fixture chain, mining its blocks behind a spinner.
async fn load_chain(ctx: &AppContext, path: &Path) -> Result<BundleApi<ChainStore>> {
    let fixture: ChainFixture = read_json(path).await?;
    let store = ChainStore::new(fixture.config.clone(), &fixture.genesis);

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}").wrap_err("failed to create progress style")?);
    pb.enable_steady_tick(Duration::from_millis(100));

    for (i, block) in fixture.blocks.iter().enumerate() {
        pb.set_message(format!("mining fixture block {}/{}", i + 1, fixture.blocks.len()));
        let overrides = HeaderOverrides { coinbase: block.coinbase, timestamp: block.timestamp, ..Default::default() };
        mine_block(&store, &block.transactions, &overrides)
            .wrap_err_with(|| format!("failed to mine fixture block {}", i + 1))?;
    }
    pb.finish_with_message(format!("chain ready at block {}", store.head_number()));

    info!(fixture = %path.display(), head = store.head_number(), "fixture chain loaded");
    Ok(BundleApi::new(Arc::new(store), ctx.sim.clone()))
}

async fn handle_call_bundle(ctx: &AppContext, args: CallBundleCmd) -> Result<()> {
    let api = load_chain(ctx, &args.fixture).await?;
    let request: CallBundleArgs = read_json(&args.bundle).await?;
    let block_number = request.block_number;

    let result = api.call_bundle(request).wrap_err("bundle simulation failed")?;

    if !args.no_record {
        ensure_parent_dir(&ctx.db_path)?;
        let store = SimulationStore::open(&ctx.db_path)?;
        let id = store.record(block_number, &result)?;
        info!(id, db_path = %ctx.db_path.display(), "recorded simulation");
    }

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => print_bundle(&result),
    }
    Ok(())
}

fn print_bundle(result: &BundleResult) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["#", "Tx Hash (truncated)", "Gas Used", "Gas Fees", "To Coinbase", "Status"]);

    for (i, tx) in result.results.iter().enumerate() {
        let status = match (&tx.error_message, &tx.revert_reason) {
            (None, _) => "ok".to_string(),
            (Some(error), Some(reason)) => format!("{error}: {}", serde_json::to_string(reason).unwrap_or_default()),
            (Some(error), None) => error.clone(),
        };
        table.add_row(vec![
            i.to_string(),
            truncate_hash(&tx.hash.to_string()),
            tx.gas_used.to_string(),
            format_eth(tx.gas_fees_paid),
            format_eth(tx.eth_sent_to_coinbase),
            status,
        ]);
    }
    println!("{table}");

    let mut summary = Table::new();
    summary.load_preset(UTF8_BORDERS_ONLY);
    summary.set_header(vec!["Metric", "Value"]);
    summary.add_row(vec!["Bundle hash".to_string(), result.bundle_hash.to_string()]);
    summary.add_row(vec!["State block".to_string(), result.state_block_number.to_string()]);
    summary.add_row(vec!["Total gas used".to_string(), result.total_gas_used.to_string()]);
    summary.add_row(vec!["Coinbase diff".to_string(), format!("{} wei ({})", result.coinbase_diff, format_eth(result.coinbase_diff))]);
    summary.add_row(vec!["Gas fees".to_string(), format_eth(result.gas_fees)]);
    summary.add_row(vec!["ETH sent to coinbase".to_string(), format_eth(result.eth_sent_to_coinbase)]);
    summary.add_row(vec!["Bundle gas price".to_string(), format!("{} wei", result.bundle_gas_price)]);
    println!("{summary}");
}

async fn handle_estimate(ctx: &AppContext, args: EstimateCmd) -> Result<()> {
    let api = load_chain(ctx, &args.fixture).await?;
    let request: EstimateGasBundleArgs = read_json(&args.request).await?;
    let estimates = api.estimate_gas_bundle(request).wrap_err("gas estimation failed")?;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&estimates)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["#", "Gas Used"]);
            for (i, estimate) in estimates.iter().enumerate() {
                table.add_row(vec![i.to_string(), estimate.gas_used.to_string()]);
            }
            println!("{table}");
        }
    }
    Ok(())
}

async fn handle_trace(ctx: &AppContext, args: TraceCmd) -> Result<()> {
    let api = load_chain(ctx, &args.fixture).await?;
    let config = TraceConfig {
        tracer: Some(args.tracer),
        timeout: Some(ctx.sim.default_timeout.as_millis() as u64),
    };
    let result = api.trace_transaction(args.tx, config).wrap_err("trace failed")?;

    println!("{}", serde_json::to_string_pretty(&result.output)?);
    if let Some(error) = result.error {
        return Err(eyre!("trace stopped early: {error}"));
    }
    Ok(())
}

async fn handle_tx_error(ctx: &AppContext, args: TxErrorCmd) -> Result<()> {
    let api = load_chain(ctx, &args.fixture).await?;
    match api.transaction_error(args.tx, None)? {
        Some(payload) => println!("{payload}"),
        None => println!("no revert"),
    }
    Ok(())
}

async fn handle_has_code(ctx: &AppContext, args: HasCodeCmd) -> Result<()> {
    let api = load_chain(ctx, &args.fixture).await?;
    println!("{}", api.has_code(args.address, args.block)?);
    Ok(())
}

fn handle_history(ctx: &AppContext, args: HistoryCmd) -> Result<()> {
    if !ctx.db_path.exists() {
        return Err(eyre!("no history database at {}", ctx.db_path.display()));
    }
    let store = SimulationStore::open(&ctx.db_path)?;
    let records = store.recent(args.limit)?;

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Recorded", "Bundle Hash (truncated)", "Block", "State Block", "Txs", "Gas Used", "Coinbase Diff"]);
    for record in &records {
        let coinbase_diff = record
            .coinbase_diff
            .parse::<U256>()
            .map(format_eth)
            .unwrap_or_else(|_| record.coinbase_diff.clone());
        table.add_row(vec![
            record.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            truncate_hash(&record.bundle_hash),
            record.block_number.to_string(),
            record.state_block_number.to_string(),
            record.tx_count.to_string(),
            record.total_gas_used.to_string(),
            coinbase_diff,
        ]);
    }
    println!("{table}");
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).wrap_err_with(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn truncate_hash(hash: &str) -> String {
    if hash.len() <= 14 {
        return hash.to_string();
    }
    format!("{}…{}", &hash[..10], &hash[hash.len() - 4..])
}

/// Formats a wei amount as ETH with six decimals.
fn format_eth(wei: U256) -> String {
    let wei_per_eth = U256::from(1_000_000_000_000_000_000u128);
    let scale = U256::from(1_000_000u64);

    let whole = wei / wei_per_eth;
    let fractional = ((wei % wei_per_eth) * scale) / wei_per_eth;

    format!("{whole}.{:06} ETH", fractional.saturating_to::<u64>())
}
