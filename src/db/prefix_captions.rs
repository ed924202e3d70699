//! Dataset-wide prefix captions.

use rusqlite::{Connection, Transaction};
use std::collections::BTreeSet;

use crate::error::Result;

pub fn insert(tx: &Transaction, text: &str) -> Result<()> {
    tx.execute("INSERT OR IGNORE INTO prefix_captions (text) VALUES (?)", [text])?;
    Ok(())
}

pub fn all(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT text FROM prefix_captions")?;
    let texts = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;
    Ok(texts)
}
