//! Append-only command log backing undo/redo.
//!
//! Payloads are opaque JSON here; the command engine owns their format.

use rusqlite::{Connection, OptionalExtension, Row, Transaction};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRow {
    pub seq: i64,
    pub forward: String,
    pub inverse: String,
    pub description: String,
    pub undone: bool,
}

fn row_to_log(row: &Row) -> rusqlite::Result<LogRow> {
    Ok(LogRow {
        seq: row.get(0)?,
        forward: row.get(1)?,
        inverse: row.get(2)?,
        description: row.get(3)?,
        undone: row.get(4)?,
    })
}

const COLUMNS: &str = "seq, forward, inverse, description, undone";

pub fn append(tx: &Transaction, forward: &str, inverse: &str, description: &str) -> Result<i64> {
    tx.execute(
        "INSERT INTO command_log (forward, inverse, description) VALUES (?, ?, ?)",
        rusqlite::params![forward, inverse, description],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Drops the whole redo stack. Returns the number of discarded entries.
pub fn clear_redo(tx: &Transaction) -> Result<usize> {
    Ok(tx.execute("DELETE FROM command_log WHERE undone = 1", [])?)
}

pub fn set_undone(tx: &Transaction, seq: i64, undone: bool) -> Result<bool> {
    let n = tx.execute(
        "UPDATE command_log SET undone = ? WHERE seq = ?",
        rusqlite::params![undone, seq],
    )?;
    Ok(n > 0)
}

/// Removes every entry. Returns the number removed.
pub fn clear(tx: &Transaction) -> Result<usize> {
    Ok(tx.execute("DELETE FROM command_log", [])?)
}

/// Most recently applied entry.
pub fn top_undo(conn: &Connection) -> Result<Option<LogRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM command_log WHERE undone = 0 ORDER BY seq DESC LIMIT 1"),
            [],
            row_to_log,
        )
        .optional()?;
    Ok(row)
}

/// Most recently undone entry.
pub fn top_redo(conn: &Connection) -> Result<Option<LogRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM command_log WHERE undone = 1 ORDER BY seq ASC LIMIT 1"),
            [],
            row_to_log,
        )
        .optional()?;
    Ok(row)
}

/// Number of entries on the (undo, redo) stacks.
pub fn depths(conn: &Connection) -> Result<(usize, usize)> {
    let (undo, redo): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(undone = 0), 0), COALESCE(SUM(undone = 1), 0) FROM command_log",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((undo as usize, redo as usize))
}
