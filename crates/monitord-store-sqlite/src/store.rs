// crates/monitord-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite State Store
// Description: Durable StateStore backed by SQLite WAL.
// Purpose: Persist probe/rule continuity state, sent-alert and cooldown
//          markers, and run history across restarts.
// Dependencies: monitord-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Single-writer SQLite store: one connection behind a [`Mutex`], WAL
//! journaling by default. Schema version is tracked in `store_meta` so a
//! future migration can branch on the stored version the way `store_meta`
//! does in the broader monitord schema history.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use monitord_core::identifiers::ProbeId;
use monitord_core::identifiers::RuleId;
use monitord_core::state::DedupRecord;
use monitord_core::state::ProbeState;
use monitord_core::state::RunRecord;
use monitord_core::state::RunStatus;
use monitord_core::time::MillisSinceEpoch;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

const SCHEMA_VERSION: i64 = 1;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_RUN_HISTORY_ROWS: usize = 1_000;

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy, single-file).
    Delete,
}

impl SqliteStoreMode {
    #[must_use]
    const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` synchronous mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced, safe under WAL).
    Normal,
}

impl SqliteSyncMode {
    #[must_use]
    const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` state store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Maximum number of run-history rows retained; oldest rows are
    /// trimmed on insert once this is exceeded.
    #[serde(default = "default_max_run_history_rows")]
    pub max_run_history_rows: usize,
}

const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

const fn default_max_run_history_rows() -> usize {
    DEFAULT_MAX_RUN_HISTORY_ROWS
}

/// Errors from the `SQLite` state store.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Underlying filesystem or connection-level I/O failure.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Persisted JSON failed to decode.
    #[error("sqlite store decode error: {0}")]
    Decode(String),
    /// Configuration or schema-version mismatch.
    #[error("sqlite store invalid: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for monitord_core::error::StoreError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::Decode(message) => Self::Decode(message),
            other => Self::Io(other.to_string()),
        }
    }
}

fn db_err(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

fn now_millis() -> MillisSinceEpoch {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX)).unwrap_or(0)
}

fn validate_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    validate_path(&config.path)?;
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_err)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_err)?;
    connection.execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value())).map_err(db_err)?;
    connection.execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value())).map_err(db_err)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_err)?;
    Ok(())
}

fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_err)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);").map_err(db_err)?;
    let version: Option<i64> = tx.query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0)).optional().map_err(db_err)?;

    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION]).map_err(db_err)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS probe_state (
                    probe_id TEXT PRIMARY KEY,
                    state_json TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS sent_alerts (
                    alert_id TEXT PRIMARY KEY,
                    probe_id TEXT NOT NULL,
                    rule_id TEXT NOT NULL,
                    sent_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_sent_alerts_sent_at ON sent_alerts (sent_at);
                CREATE TABLE IF NOT EXISTS cooldowns (
                    cooldown_key TEXT PRIMARY KEY,
                    last_sent_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS run_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    probe_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    duration_ms INTEGER NOT NULL,
                    error_message TEXT,
                    created_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_run_history_created_at ON run_history (created_at);
                CREATE INDEX IF NOT EXISTS idx_run_history_probe_id ON run_history (probe_id);",
            )
            .map_err(db_err)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::Invalid(format!("unsupported schema version: {value}")));
        }
    }

    tx.commit().map_err(db_err)?;
    Ok(())
}

/// `SQLite`-backed [`monitord_core::traits::StateStore`].
///
/// # Invariants
/// - A single connection is shared behind one [`Mutex`]; this store assumes
///   a single engine instance as its only writer.
pub struct SqliteStateStore {
    connection: Mutex<Connection>,
    max_run_history_rows: usize,
}

impl SqliteStateStore {
    /// Opens (creating if absent) the database at `config.path`, applying
    /// pragmas and initializing/validating the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O, connection, or schema-version
    /// failure.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Mutex::new(connection), max_run_history_rows: config.max_run_history_rows })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Io("state store connection mutex poisoned".to_string()))
    }

    fn trim_run_history(connection: &Connection, max_rows: usize) -> Result<(), SqliteStoreError> {
        #[allow(clippy::cast_possible_wrap)]
        let max_rows = max_rows as i64;
        connection
            .execute(
                "DELETE FROM run_history WHERE id NOT IN (SELECT id FROM run_history ORDER BY created_at DESC LIMIT ?1)",
                params![max_rows],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

impl monitord_core::traits::StateStore for SqliteStateStore {
    fn load_probe_state(&self, probe_id: &ProbeId) -> Result<ProbeState, monitord_core::error::StoreError> {
        let connection = self.lock()?;
        let raw: Option<String> = connection
            .query_row("SELECT state_json FROM probe_state WHERE probe_id = ?1", params![probe_id.as_str()], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        match raw {
            None => Ok(ProbeState::empty()),
            Some(json) => serde_json::from_str(&json).map_err(|err| SqliteStoreError::Decode(err.to_string()).into()),
        }
    }

    fn save_probe_state(&self, probe_id: &ProbeId, state: &ProbeState) -> Result<(), monitord_core::error::StoreError> {
        let json = serde_json::to_string(state).map_err(|err| SqliteStoreError::Decode(err.to_string()))?;
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO probe_state (probe_id, state_json, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (probe_id) DO UPDATE SET state_json = excluded.state_json, updated_at = excluded.updated_at",
                params![probe_id.as_str(), json, now_millis()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn is_alert_sent(&self, alert_id: &str, ttl: Option<Duration>) -> Result<bool, monitord_core::error::StoreError> {
        let connection = self.lock()?;
        let sent_at: Option<i64> = connection.query_row("SELECT sent_at FROM sent_alerts WHERE alert_id = ?1", params![alert_id], |row| row.get(0)).optional().map_err(db_err)?;
        let Some(sent_at) = sent_at else {
            return Ok(false);
        };
        match ttl {
            None => Ok(true),
            Some(ttl) => {
                let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
                Ok(now_millis().saturating_sub(sent_at) < ttl_ms)
            }
        }
    }

    fn record_alert(&self, alert_id: &str, probe_id: &ProbeId, rule_id: &RuleId) -> Result<(), monitord_core::error::StoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO sent_alerts (alert_id, probe_id, rule_id, sent_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (alert_id) DO NOTHING",
                params![alert_id, probe_id.as_str(), rule_id.as_str(), now_millis()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn is_in_cooldown(&self, key: &str, window: Duration) -> Result<bool, monitord_core::error::StoreError> {
        let connection = self.lock()?;
        let last_sent_at: Option<i64> = connection.query_row("SELECT last_sent_at FROM cooldowns WHERE cooldown_key = ?1", params![key], |row| row.get(0)).optional().map_err(db_err)?;
        let Some(last_sent_at) = last_sent_at else {
            return Ok(false);
        };
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        Ok(now_millis().saturating_sub(last_sent_at) < window_ms)
    }

    fn record_cooldown(&self, key: &str) -> Result<(), monitord_core::error::StoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO cooldowns (cooldown_key, last_sent_at) VALUES (?1, ?2)
                 ON CONFLICT (cooldown_key) DO UPDATE SET last_sent_at = excluded.last_sent_at",
                params![key, now_millis()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn record_run(&self, probe_id: &ProbeId, status: RunStatus, duration_ms: u64, error_message: Option<&str>) -> Result<(), monitord_core::error::StoreError> {
        let status_label = match status {
            RunStatus::Success => "success",
            RunStatus::Error => "error",
        };
        #[allow(clippy::cast_possible_wrap)]
        let duration_ms = duration_ms as i64;
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO run_history (probe_id, status, duration_ms, error_message, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![probe_id.as_str(), status_label, duration_ms, error_message, now_millis()],
            )
            .map_err(db_err)?;
        Self::trim_run_history(&connection, self.max_run_history_rows)?;
        Ok(())
    }

    fn recent_alerts(&self, limit: usize) -> Result<Vec<DedupRecord>, monitord_core::error::StoreError> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = limit as i64;
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT alert_id, probe_id, rule_id, sent_at FROM sent_alerts ORDER BY sent_at DESC LIMIT ?1")
            .map_err(db_err)?;
        let rows = statement
            .query_map(params![limit], |row| {
                Ok(DedupRecord {
                    alert_id: row.get(0)?,
                    probe_id: ProbeId::new(row.get::<_, String>(1)?),
                    rule_id: RuleId::new(row.get::<_, String>(2)?),
                    sent_at: row.get(3)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| SqliteStoreError::Db(err.to_string()).into())
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, monitord_core::error::StoreError> {
        #[allow(clippy::cast_possible_wrap)]
        let limit = limit as i64;
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT probe_id, status, duration_ms, error_message, created_at FROM run_history ORDER BY created_at DESC LIMIT ?1")
            .map_err(db_err)?;
        let rows = statement
            .query_map(params![limit], |row| {
                let status_label: String = row.get(1)?;
                let status = if status_label == "success" { RunStatus::Success } else { RunStatus::Error };
                #[allow(clippy::cast_sign_loss)]
                Ok(RunRecord {
                    probe_id: ProbeId::new(row.get::<_, String>(0)?),
                    status,
                    duration_ms: row.get::<_, i64>(2)? as u64,
                    error_message: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| SqliteStoreError::Db(err.to_string()).into())
    }
}
