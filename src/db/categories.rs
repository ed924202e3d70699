//! Category rows.

use rusqlite::{Connection, OptionalExtension, Row, Transaction};

use crate::error::Result;
use crate::model::{Category, CategoryId};

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        required: row.get(2)?,
    })
}

pub fn insert(tx: &Transaction, category: &Category) -> Result<()> {
    tx.execute(
        "INSERT INTO categories (id, name, required) VALUES (?, ?, ?)",
        rusqlite::params![category.id, category.name, category.required],
    )?;
    Ok(())
}

pub fn delete(tx: &Transaction, id: CategoryId) -> Result<bool> {
    let n = tx.execute("DELETE FROM categories WHERE id = ?", [id])?;
    Ok(n > 0)
}

pub fn set_required(tx: &Transaction, id: CategoryId, required: bool) -> Result<bool> {
    let n = tx.execute(
        "UPDATE categories SET required = ? WHERE id = ?",
        rusqlite::params![required, id],
    )?;
    Ok(n > 0)
}

pub fn get(conn: &Connection, id: CategoryId) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, name, required FROM categories WHERE id = ?",
            [id],
            row_to_category,
        )
        .optional()?;
    Ok(category)
}

pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Category>> {
    let category = conn
        .query_row(
            "SELECT id, name, required FROM categories WHERE name = ?",
            [name],
            row_to_category,
        )
        .optional()?;
    Ok(category)
}

pub fn all(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name, required FROM categories ORDER BY name")?;
    let categories = stmt
        .query_map([], row_to_category)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(categories)
}
