//! SQLite connection management.

use rusqlite::{Connection, OpenFlags, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::schema::{SCHEMA, SCHEMA_VERSION};
use crate::error::{Result, StoreError};

/// The single connection backing an open store.
///
/// A writable `Database` holds an exclusive SQLite lock for its whole lifetime,
/// so no second writer can open the same file.
pub struct Database {
    conn: Connection,
    path: PathBuf,
    read_only: bool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::ZERO)?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA locking_mode = EXCLUSIVE;")?;
        conn.execute_batch("BEGIN EXCLUSIVE; COMMIT;")
            .map_err(|e| lock_error(e, path))?;

        let db = Self {
            conn,
            path: path.to_path_buf(),
            read_only: false,
        };
        db.initialize()?;
        Ok(db)
    }

    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StoreError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "store file does not exist"),
            ));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::ZERO)?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
            read_only: true,
        };
        db.check_version().map_err(|e| lock_error_from(e, path))?;
        Ok(db)
    }

    fn initialize(&self) -> Result<()> {
        self.check_version()?;
        self.conn.execute_batch(SCHEMA)?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    fn check_version(&self) -> Result<()> {
        let found: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Starts the transaction every write must run inside.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(self.conn.transaction()?)
    }

    /// Reclaims space freed by deleted rows. Must run outside a transaction.
    pub fn vacuum(&self) -> Result<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

fn lock_error(err: rusqlite::Error, path: &Path) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ffi, _)
            if matches!(
                ffi.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) =>
        {
            StoreError::Locked {
                path: path.to_path_buf(),
            }
        }
        other => other.into(),
    }
}

fn lock_error_from(err: StoreError, path: &Path) -> StoreError {
    match err {
        StoreError::Database(inner) => lock_error(inner, path),
        other => other,
    }
}
