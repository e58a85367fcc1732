//! SQLite record of tuning runs: every evaluated configuration, its result,
//! and which results improved on the best so far.
//!
//! Configurations are stored as base64(zstd(json)). The replayer only needs
//! the read side; the batch evaluator fills it.

use std::{path::Path, sync::Mutex};

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use rusqlite::{params, Connection, OptionalExtension};
use smb_core::Configuration;

use crate::harness::EvaluationResult;
use crate::util::now_unix_ms;

const ZSTD_LEVEL: i32 = 3;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS tuning_run (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        representation  TEXT NOT NULL,
        fitness         TEXT NOT NULL,
        started_at      INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS configuration (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        data            TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS result (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        tuning_run_id     INTEGER NOT NULL REFERENCES tuning_run(id),
        configuration_id  INTEGER NOT NULL REFERENCES configuration(id),
        state             TEXT NOT NULL,
        score             REAL,
        won               INTEGER,
        x_pos             INTEGER,
        frames            INTEGER,
        was_new_best      INTEGER NOT NULL DEFAULT 0,
        collection_date   INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_result_run_best ON result(tuning_run_id, was_new_best);";

pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open SQLite at {}", path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )
        .context("failed to set pragmas")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().context("failed to open SQLite")?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("failed to create history schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("history store mutex poisoned"))
    }

    pub fn create_tuning_run(&self, representation: &str, fitness: &str) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tuning_run (representation, fitness, started_at) VALUES (?1, ?2, ?3)",
            params![representation, fitness, now_unix_ms()],
        )
        .context("insert tuning run failed")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn tuning_run_exists(&self, run_id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM tuning_run WHERE id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()
            .context("tuning run lookup failed")?;
        Ok(found.is_some())
    }

    pub fn record_configuration(&self, configuration: &Configuration) -> Result<i64> {
        let data = encode_configuration(configuration)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO configuration (data) VALUES (?1)",
            params![data],
        )
        .context("insert configuration failed")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn record_result(
        &self,
        run_id: i64,
        configuration_id: i64,
        result: &EvaluationResult,
        was_new_best: bool,
    ) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO result (
                tuning_run_id, configuration_id, state, score,
                won, x_pos, frames, was_new_best, collection_date
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
            params![
                run_id,
                configuration_id,
                result.state.as_str(),
                result.score.is_finite().then_some(result.score),
                result.outcome.map(|o| o.won()),
                result.outcome.map(|o| i64::from(o.x_pos)),
                result.outcome.map(|o| i64::from(o.frames)),
                was_new_best,
                now_unix_ms(),
            ],
        )
        .context("insert result failed")?;
        Ok(conn.last_insert_rowid())
    }

    /// Configurations that set a new best in `run_id`, oldest first.
    pub fn new_best_configuration_ids(&self, run_id: i64) -> Result<Vec<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT configuration_id FROM result
                 WHERE tuning_run_id = ?1 AND was_new_best = 1
                 ORDER BY collection_date, id",
            )
            .context("prepare new-best query failed")?;
        let ids = stmt
            .query_map(params![run_id], |row| row.get::<_, i64>(0))
            .context("new-best query failed")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("reading new-best rows failed")?;
        Ok(ids)
    }

    pub fn load_configuration(&self, configuration_id: i64) -> Result<Configuration> {
        let data: Option<String> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT data FROM configuration WHERE id = ?1",
                params![configuration_id],
                |row| row.get(0),
            )
            .optional()
            .context("configuration lookup failed")?
        };
        let data = data.ok_or_else(|| anyhow!("configuration {configuration_id} not found"))?;
        decode_configuration(&data)
            .with_context(|| format!("configuration {configuration_id} is unreadable"))
    }
}

pub fn encode_configuration(configuration: &Configuration) -> Result<String> {
    let json = serde_json::to_vec(configuration).context("failed to serialize configuration")?;
    let compressed =
        zstd::encode_all(json.as_slice(), ZSTD_LEVEL).context("zstd compress failed")?;
    Ok(BASE64_STANDARD.encode(compressed))
}

pub fn decode_configuration(data: &str) -> Result<Configuration> {
    let compressed = BASE64_STANDARD
        .decode(data.trim())
        .context("configuration is not valid base64")?;
    let json = zstd::decode_all(compressed.as_slice()).context("zstd decompress failed")?;
    serde_json::from_slice(&json).context("configuration json is invalid")
}
