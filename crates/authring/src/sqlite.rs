//! SQLite-backed attribute store for hosts that keep attributes locally.

use std::path::Path;

use async_trait::async_trait;
use authring_core::Handle;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info};

use crate::store::{AttributeError, AttributeScope, AttributeStore};

impl From<rusqlite::Error> for AttributeError {
    fn from(err: rusqlite::Error) -> Self {
        AttributeError::Remote(err.to_string())
    }
}

pub struct SqliteAttributeStore {
    conn: Mutex<Connection>,
    owner: Handle,
}

impl SqliteAttributeStore {
    /// Opens (or creates) the database at `path`. Writes are stored under
    /// `owner`.
    pub fn open(path: impl AsRef<Path>, owner: Handle) -> Result<Self, AttributeError> {
        let path = path.as_ref();
        info!(owner = %owner, path = %path.display(), "Opening attribute database");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AttributeError::Remote(e.to_string()))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::with_connection(conn, owner)
    }

    pub fn open_in_memory(owner: Handle) -> Result<Self, AttributeError> {
        Self::with_connection(Connection::open_in_memory()?, owner)
    }

    fn with_connection(conn: Connection, owner: Handle) -> Result<Self, AttributeError> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            owner,
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), AttributeError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS attributes (
                owner BLOB NOT NULL,
                name TEXT NOT NULL,
                scope INTEGER NOT NULL,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
                PRIMARY KEY (owner, name, scope)
            );
            "#,
        )?;
        Ok(())
    }

    /// Writes an attribute of any user, for importing contacts' public keys.
    pub fn insert(
        &self,
        owner: Handle,
        name: &str,
        scope: AttributeScope,
        value: &[u8],
    ) -> Result<(), AttributeError> {
        self.conn.lock().execute(
            r#"
            INSERT INTO attributes (owner, name, scope, value) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (owner, name, scope)
            DO UPDATE SET value = excluded.value, updated_at = strftime('%s', 'now')
            "#,
            params![owner.as_bytes().as_slice(), name, scope.as_i64(), value],
        )?;
        Ok(())
    }
}

#[async_trait]
impl AttributeStore for SqliteAttributeStore {
    async fn get(
        &self,
        owner: Handle,
        name: &str,
        scope: AttributeScope,
    ) -> Result<Vec<u8>, AttributeError> {
        let value: Option<Vec<u8>> = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM attributes WHERE owner = ?1 AND name = ?2 AND scope = ?3",
                params![owner.as_bytes().as_slice(), name, scope.as_i64()],
                |row| row.get(0),
            )
            .optional()?;
        value.ok_or(AttributeError::NotFound)
    }

    async fn set(
        &self,
        name: &str,
        value: &[u8],
        scope: AttributeScope,
    ) -> Result<(), AttributeError> {
        debug!(attribute = name, len = value.len(), "Storing attribute");
        self.insert(self.owner, name, scope, value)
    }
}
