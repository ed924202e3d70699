//! Image/tag assignment rows.

use rusqlite::{Connection, Transaction};
use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{Assignment, CategoryId, ImageId, TagId};

pub fn insert(tx: &Transaction, a: Assignment) -> Result<()> {
    tx.execute(
        "INSERT INTO assignments (image_id, tag_id) VALUES (?, ?)",
        rusqlite::params![a.image, a.tag],
    )?;
    Ok(())
}

pub fn delete(tx: &Transaction, a: Assignment) -> Result<bool> {
    let n = tx.execute(
        "DELETE FROM assignments WHERE image_id = ? AND tag_id = ?",
        rusqlite::params![a.image, a.tag],
    )?;
    Ok(n > 0)
}

pub fn exists(conn: &Connection, a: Assignment) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM assignments WHERE image_id = ? AND tag_id = ?",
        rusqlite::params![a.image, a.tag],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn for_image(conn: &Connection, image: ImageId) -> Result<Vec<Assignment>> {
    let mut stmt = conn.prepare(
        "SELECT image_id, tag_id FROM assignments WHERE image_id = ? ORDER BY tag_id",
    )?;
    let rows = stmt
        .query_map([image], |row| {
            Ok(Assignment {
                image: row.get(0)?,
                tag: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn for_tag(conn: &Connection, tag: TagId) -> Result<Vec<Assignment>> {
    let mut stmt = conn.prepare(
        "SELECT image_id, tag_id FROM assignments WHERE tag_id = ? ORDER BY image_id",
    )?;
    let rows = stmt
        .query_map([tag], |row| {
            Ok(Assignment {
                image: row.get(0)?,
                tag: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn all(conn: &Connection) -> Result<Vec<Assignment>> {
    let mut stmt = conn.prepare("SELECT image_id, tag_id FROM assignments")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Assignment {
                image: row.get(0)?,
                tag: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Required categories the image currently has at least one tag from.
pub fn required_coverage(conn: &Connection, image: ImageId) -> Result<BTreeSet<CategoryId>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT DISTINCT c.id
        FROM assignments a
        JOIN tags t ON t.id = a.tag_id
        JOIN categories c ON c.id = t.category_id
        WHERE a.image_id = ? AND c.required = 1
        "#,
    )?;
    let ids = stmt
        .query_map([image], |row| row.get(0))?
        .collect::<rusqlite::Result<BTreeSet<CategoryId>>>()?;
    Ok(ids)
}
