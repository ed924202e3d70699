//! Undo/redo stacks over the persisted command log.
//!
//! Log rows with `undone = 0` form the undo stack (top is the highest `seq`),
//! rows with `undone = 1` the redo stack (top is the lowest `seq`). Recording a
//! new command discards the redo stack.

use rusqlite::Transaction;

use super::Command;
use crate::db;
use crate::db::command_log::LogRow;
use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A decoded log row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub seq: i64,
    pub forward: Command,
    pub inverse: Command,
    pub description: String,
}

impl LogEntry {
    fn decode(row: LogRow) -> Result<Self> {
        Ok(Self {
            seq: row.seq,
            forward: serde_json::from_str(&row.forward)?,
            inverse: serde_json::from_str(&row.inverse)?,
            description: row.description,
        })
    }

    pub fn apply(&self, tx: &Transaction, direction: Direction) -> Result<()> {
        match direction {
            Direction::Forward => self.forward.execute(tx),
            Direction::Backward => self.inverse.execute(tx),
        }
    }
}

/// Appends an executed command to the log and clears the redo stack.
pub fn record(tx: &Transaction, command: &Command) -> Result<i64> {
    let discarded = db::command_log::clear_redo(tx)?;
    if discarded > 0 {
        tracing::debug!(discarded, "Redo history discarded");
    }
    let forward = serde_json::to_string(command)?;
    let inverse = serde_json::to_string(&command.inverse())?;
    db::command_log::append(tx, &forward, &inverse, &command.description())
}

/// Reverts the most recent command. Returns its description.
pub fn undo(tx: &Transaction) -> Result<String> {
    let row = db::command_log::top_undo(tx)?.ok_or(StoreError::NothingToUndo)?;
    let entry = LogEntry::decode(row)?;
    entry.apply(tx, Direction::Backward)?;
    db::command_log::set_undone(tx, entry.seq, true)?;
    Ok(entry.description)
}

/// Re-applies the most recently undone command. Returns its description.
pub fn redo(tx: &Transaction) -> Result<String> {
    let row = db::command_log::top_redo(tx)?.ok_or(StoreError::NothingToRedo)?;
    let entry = LogEntry::decode(row)?;
    entry.apply(tx, Direction::Forward)?;
    db::command_log::set_undone(tx, entry.seq, false)?;
    Ok(entry.description)
}

/// Drops all history. Returns the number of discarded entries.
pub fn compact(tx: &Transaction) -> Result<usize> {
    db::command_log::clear(tx)
}
