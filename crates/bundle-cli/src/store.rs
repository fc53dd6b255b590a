//! SQLite history of simulated bundles.
//!
//! One row per successful `call-bundle` run, so results can be compared
//! across fixture revisions without re-running them.

use std::path::Path;

use bundle_sim::BundleResult;
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use rusqlite::{params, Connection};

/// A row of the `simulated_bundles` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationRecord {
    pub id: i64,
    pub bundle_hash: String,
    pub block_number: u64,
    pub state_block_number: u64,
    pub tx_count: usize,
    pub total_gas_used: u64,
    /// Decimal wei.
    pub coinbase_diff: String,
    pub recorded_at: DateTime<Utc>,
}

pub struct SimulationStore {
    conn: Connection,
}

impl SimulationStore {
    /// Creates or opens the history database with WAL mode enabled.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrations fail.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).wrap_err_with(|| format!("failed to open {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let store = Self { conn };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS simulated_bundles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bundle_hash TEXT NOT NULL,
                block_number INTEGER NOT NULL,
                state_block_number INTEGER NOT NULL,
                tx_count INTEGER NOT NULL,
                total_gas_used INTEGER NOT NULL,
                coinbase_diff TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_simulated_bundles_hash
                ON simulated_bundles (bundle_hash);
            ",
        )?;
        Ok(())
    }

    /// Stores one simulation outcome and returns its row id.
    pub fn record(&self, block_number: u64, result: &BundleResult) -> Result<i64> {
        self.conn.execute(
            "
            INSERT INTO simulated_bundles (
                bundle_hash, block_number, state_block_number, tx_count,
                total_gas_used, coinbase_diff, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                result.bundle_hash.to_string(),
                block_number as i64,
                result.state_block_number as i64,
                result.results.len() as i64,
                result.total_gas_used as i64,
                result.coinbase_diff.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent records first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SimulationRecord>> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, bundle_hash, block_number, state_block_number, tx_count,
                   total_gas_used, coinbase_diff, recorded_at
            FROM simulated_bundles
            ORDER BY id DESC
            LIMIT ?1
            ",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, bundle_hash, block_number, state_block_number, tx_count, total_gas_used, coinbase_diff, recorded_at) =
                row?;
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .wrap_err_with(|| format!("bad timestamp in row {id}"))?
                .with_timezone(&Utc);
            records.push(SimulationRecord {
                id,
                bundle_hash,
                block_number: block_number as u64,
                state_block_number: state_block_number as u64,
                tx_count: tx_count as usize,
                total_gas_used: total_gas_used as u64,
                coinbase_diff,
                recorded_at,
            });
        }
        Ok(records)
    }
}
