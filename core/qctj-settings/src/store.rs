//! Persistent named options.
//!
//! Every value is a whole JSON record that is overwritten on write. The
//! settings blob, license records and telemetry timestamps all live here.

use crate::error::{SettingsError, SettingsResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

pub trait OptionStore: Send + Sync {
    fn get(&self, name: &str) -> SettingsResult<Option<Value>>;

    /// Writes `value`. Returns false when the stored value was already equal.
    fn set(&self, name: &str, value: &Value) -> SettingsResult<bool>;

    /// Returns false when nothing was stored under `name`.
    fn delete(&self, name: &str) -> SettingsResult<bool>;
}

/// Process-local store, used in tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    options: Mutex<HashMap<String, Value>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SettingsResult<MutexGuard<'_, HashMap<String, Value>>> {
        self.options
            .lock()
            .map_err(|_| SettingsError::Storage("option map lock poisoned".into()))
    }
}

impl OptionStore for MemoryOptionStore {
    fn get(&self, name: &str) -> SettingsResult<Option<Value>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn set(&self, name: &str, value: &Value) -> SettingsResult<bool> {
        let previous = self.lock()?.insert(name.to_string(), value.clone());
        Ok(previous.as_ref() != Some(value))
    }

    fn delete(&self, name: &str) -> SettingsResult<bool> {
        Ok(self.lock()?.remove(name).is_some())
    }
}

/// SQLite-backed store with a single `options` table.
pub struct SqliteOptionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOptionStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: &Path) -> SettingsResult<Self> {
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "Opened option store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> SettingsResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SettingsResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS options (
                option_name TEXT PRIMARY KEY NOT NULL,
                option_value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> SettingsResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SettingsError::Storage("connection lock poisoned".into()))
    }

    fn read(conn: &Connection, name: &str) -> SettingsResult<Option<Value>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT option_value FROM options WHERE option_name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(SettingsError::from))
            .transpose()
    }
}

impl OptionStore for SqliteOptionStore {
    fn get(&self, name: &str) -> SettingsResult<Option<Value>> {
        let conn = self.lock()?;
        Self::read(&conn, name)
    }

    fn set(&self, name: &str, value: &Value) -> SettingsResult<bool> {
        let conn = self.lock()?;
        if Self::read(&conn, name)?.as_ref() == Some(value) {
            return Ok(false);
        }
        conn.execute(
            "INSERT INTO options (option_name, option_value) VALUES (?1, ?2)
             ON CONFLICT(option_name) DO UPDATE SET option_value = excluded.option_value",
            params![name, serde_json::to_string(value)?],
        )?;
        Ok(true)
    }

    fn delete(&self, name: &str) -> SettingsResult<bool> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM options WHERE option_name = ?1", params![name])?;
        Ok(removed > 0)
    }
}

impl<T: OptionStore + ?Sized> OptionStore for Arc<T> {
    fn get(&self, name: &str) -> SettingsResult<Option<Value>> {
        (**self).get(name)
    }

    fn set(&self, name: &str, value: &Value) -> SettingsResult<bool> {
        (**self).set(name, value)
    }

    fn delete(&self, name: &str) -> SettingsResult<bool> {
        (**self).delete(name)
    }
}
