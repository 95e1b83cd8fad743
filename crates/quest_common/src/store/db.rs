// Database Connection Management for the Quest store

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Database location
#[derive(Debug, Clone)]
pub enum DbLocation {
    /// User mode: $XDG_DATA_HOME/quest/quest.db or ~/.local/share/quest/quest.db
    User,
    /// Explicit path (config file, CLI flag, tests)
    Custom(PathBuf),
}

impl DbLocation {
    pub fn path(&self) -> Result<PathBuf> {
        match self {
            DbLocation::User => {
                let base_dir = dirs::data_dir().context("Could not determine user data directory")?;
                Ok(base_dir.join("quest").join("quest.db"))
            }
            DbLocation::Custom(path) => Ok(path.clone()),
        }
    }

    pub fn from_config(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => DbLocation::Custom(path),
            None => DbLocation::User,
        }
    }
}

/// SQLite-backed store (single connection behind an async mutex)
pub struct QuestStore {
    conn: Arc<Mutex<Connection>>,
}

impl QuestStore {
    /// Open or create the database at the specified location
    pub async fn open(location: DbLocation) -> Result<Self> {
        let db_path = location.path()?;

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        info!("Opening quest database at: {}", db_path.display());

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection> {
            let conn = Connection::open(&db_path).context("Failed to open SQLite database")?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to enable WAL mode")?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .context("Failed to set synchronous mode")?;
            conn.pragma_update(None, "foreign_keys", "ON")
                .context("Failed to enable foreign keys")?;
            // Other processes may hold the write lock briefly
            conn.busy_timeout(Duration::from_secs(5))
                .context("Failed to set busy timeout")?;

            Ok(conn)
        })
        .await??;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.initialize_schema().await?;

        Ok(store)
    }

    /// Create tables, indexes and append-only guards
    async fn initialize_schema(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
            debug!("Quest schema ready");
            Ok(())
        })
        .await
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.blocking_lock();
            f(&mut *conn)
        })
        .await?
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS participants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL,
    display_name TEXT NOT NULL,
    enrolled_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_participants_account ON participants(account_id, id);

CREATE TABLE IF NOT EXISTS score_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_id INTEGER NOT NULL REFERENCES participants(id),
    cohort_id INTEGER NOT NULL,
    score INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_score_cohort ON score_events(cohort_id);
CREATE INDEX IF NOT EXISTS idx_score_participant ON score_events(participant_id);

CREATE TABLE IF NOT EXISTS activity_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    participant_id INTEGER NOT NULL REFERENCES participants(id),
    name TEXT NOT NULL,
    delta INTEGER NOT NULL,
    recorded_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_activity_participant ON activity_events(participant_id);

CREATE TABLE IF NOT EXISTS catalog_items (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    condition TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS completion_records (
    participant_id INTEGER NOT NULL REFERENCES participants(id),
    item_id TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    PRIMARY KEY (participant_id, item_id)
);

CREATE TRIGGER IF NOT EXISTS score_events_no_update BEFORE UPDATE ON score_events
BEGIN SELECT RAISE(ABORT, 'score_events is append-only'); END;
CREATE TRIGGER IF NOT EXISTS score_events_no_delete BEFORE DELETE ON score_events
BEGIN SELECT RAISE(ABORT, 'score_events is append-only'); END;
CREATE TRIGGER IF NOT EXISTS activity_events_no_update BEFORE UPDATE ON activity_events
BEGIN SELECT RAISE(ABORT, 'activity_events is append-only'); END;
CREATE TRIGGER IF NOT EXISTS activity_events_no_delete BEFORE DELETE ON activity_events
BEGIN SELECT RAISE(ABORT, 'activity_events is append-only'); END;
CREATE TRIGGER IF NOT EXISTS completion_records_no_update BEFORE UPDATE ON completion_records
BEGIN SELECT RAISE(ABORT, 'completion_records is append-only'); END;
CREATE TRIGGER IF NOT EXISTS completion_records_no_delete BEFORE DELETE ON completion_records
BEGIN SELECT RAISE(ABORT, 'completion_records is append-only'); END;
";
