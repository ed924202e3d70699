//! Schema & storage layer.
//!
//! Row-level operations over the dataset tables. Write functions take a
//! [`rusqlite::Transaction`] supplied by the caller and never commit; read
//! functions take any [`rusqlite::Connection`] (a transaction derefs to one).
//! Constraint violations surface as [`StoreError::Constraint`].
//!
//! [`StoreError::Constraint`]: crate::error::StoreError::Constraint

mod schema;
mod sqlite;
pub mod assignments;
pub mod categories;
pub mod command_log;
pub mod images;
pub mod prefix_captions;
pub mod tags;

use rusqlite::Connection;

use crate::error::Result;

pub use schema::{SCHEMA, SCHEMA_VERSION};
pub use sqlite::Database;

/// True when the store holds no dataset rows and no history.
pub fn is_fresh(conn: &Connection) -> Result<bool> {
    let count: i64 = conn.query_row(
        r#"
        SELECT (SELECT COUNT(*) FROM images)
             + (SELECT COUNT(*) FROM tags)
             + (SELECT COUNT(*) FROM categories)
             + (SELECT COUNT(*) FROM prefix_captions)
             + (SELECT COUNT(*) FROM command_log)
        "#,
        [],
        |row| row.get(0),
    )?;
    Ok(count == 0)
}
