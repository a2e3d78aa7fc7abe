//! # Relational Store
//!
//! The local SQLite database is the fast query path for the UI. It is a
//! cache of what the vehicle folders hold: every row can be rebuilt from the
//! sidecars (see `sync`).
//!
//! A single [`Connection`] sits behind a mutex. [`Database::read`] and
//! [`Database::write`] borrow it for the duration of a closure, so callers
//! never interleave. `write` runs the closure in a transaction that commits
//! when it returns `Ok` and rolls back otherwise.
//!
//! Foreign keys are enforced: deleting a `vehicle` row deletes its
//! `file_metadata` rows.

use crate::error::Result;
use rusqlite::{Connection, Transaction};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

pub mod migrations;
pub mod records;

pub use records::{FileMetadataRecord, VehicleRecord};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (creating if needed) the database at `path` and brings its
    /// schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "database opened");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::apply_migrations(&mut conn, migrations::MIGRATIONS)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn)
    }

    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}
