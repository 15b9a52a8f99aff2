use crate::durable::DurableStore;
use jot_core::{JotError, JotResult, now_millis};
use jot_fs::WorkspacePaths;
use rusqlite::{Connection, Error as SqlError, ErrorCode, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Durable store backed by a single `kv` table in the workspace state database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn from_workspace(paths: &WorkspacePaths) -> JotResult<Self> {
        Self::open(&paths.state_db_path)
    }

    pub fn open(db_path: &Path) -> JotResult<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };

        let conn = store.connection()?;
        store.initialize_schema(&conn)?;

        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn load(&self, key: &str) -> JotResult<Option<String>> {
        let conn = self.connection()?;
        conn.query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|err| sqlite_error("read key", &self.db_path, err))
    }

    pub fn save(&self, key: &str, value: &str) -> JotResult<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now_millis()],
        )
        .map_err(|err| sqlite_error("write key", &self.db_path, err))?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> JotResult<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|err| sqlite_error("delete key", &self.db_path, err))?;
        Ok(())
    }

    pub fn list_keys(&self) -> JotResult<Vec<String>> {
        let conn = self.connection()?;
        let mut statement = conn
            .prepare("SELECT key FROM kv ORDER BY key")
            .map_err(|err| sqlite_error("list keys", &self.db_path, err))?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| sqlite_error("list keys", &self.db_path, err))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|err| sqlite_error("list keys", &self.db_path, err))?);
        }
        Ok(keys)
    }

    fn connection(&self) -> JotResult<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|err| sqlite_error("open", &self.db_path, err))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|err| sqlite_error("configure", &self.db_path, err))?;
        Ok(conn)
    }

    fn initialize_schema(&self, conn: &Connection) -> JotResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS kv (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL,
                 updated_at INTEGER NOT NULL
             );",
        )
        .map_err(|err| sqlite_error("initialize schema", &self.db_path, err))
    }
}

impl DurableStore for SqliteStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.load(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "durable read failed");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(err) = self.save(key, value) {
            warn!(key, error = %err, "durable write dropped");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = self.delete(key) {
            warn!(key, error = %err, "durable delete dropped");
        }
    }

    fn keys(&self) -> Vec<String> {
        self.list_keys().unwrap_or_else(|err| {
            warn!(error = %err, "durable key listing failed");
            Vec::new()
        })
    }
}

fn sqlite_error(action: &str, db_path: &Path, err: SqlError) -> JotError {
    if let SqlError::SqliteFailure(code, message) = &err
        && (code.code == ErrorCode::DatabaseCorrupt || code.code == ErrorCode::NotADatabase)
    {
        let detail = message.as_deref().unwrap_or("sqlite reported corruption");
        return JotError::io(format!(
            "failed to {action}: state database '{}' is corrupted ({detail}); remove '.jot/state.db' and run `jot notes list --refresh` to rebuild the local mirror",
            db_path.display()
        ));
    }

    JotError::io(format!(
        "failed to {action} using state database '{}': {}",
        db_path.display(),
        err
    ))
}
