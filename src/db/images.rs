//! Image rows.

use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use std::path::PathBuf;

use crate::error::Result;
use crate::model::{Image, ImageId};

const COLUMNS: &str = "id, name, path, source_uri";

fn row_to_image(row: &Row) -> rusqlite::Result<Image> {
    Ok(Image {
        id: row.get(0)?,
        name: row.get(1)?,
        path: PathBuf::from(row.get::<_, String>(2)?),
        source_uri: row.get(3)?,
    })
}

pub fn insert(tx: &Transaction, image: &Image) -> Result<()> {
    tx.execute(
        "INSERT INTO images (id, name, path, source_uri) VALUES (?, ?, ?, ?)",
        rusqlite::params![
            image.id,
            image.name,
            image.path.to_string_lossy(),
            image.source_uri,
        ],
    )?;
    Ok(())
}

/// Returns whether a row was deleted.
pub fn delete(tx: &Transaction, id: ImageId) -> Result<bool> {
    let n = tx.execute("DELETE FROM images WHERE id = ?", [id])?;
    Ok(n > 0)
}

pub fn get(conn: &Connection, id: ImageId) -> Result<Option<Image>> {
    let image = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM images WHERE id = ?"),
            [id],
            row_to_image,
        )
        .optional()?;
    Ok(image)
}

pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Image>> {
    let image = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM images WHERE name = ?"),
            [name],
            row_to_image,
        )
        .optional()?;
    Ok(image)
}

/// All images ordered by name.
pub fn all(conn: &Connection) -> Result<Vec<Image>> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM images ORDER BY name"))?;
    let images = stmt
        .query_map([], row_to_image)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(images)
}
