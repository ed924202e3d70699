//! Tag rows.

use rusqlite::{Connection, OptionalExtension, Row, Transaction};

use crate::error::Result;
use crate::model::{CategoryId, Tag, TagId};

fn row_to_tag(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        text: row.get(1)?,
        category: row.get(2)?,
    })
}

pub fn insert(tx: &Transaction, tag: &Tag) -> Result<()> {
    tx.execute(
        "INSERT INTO tags (id, text, category_id) VALUES (?, ?, ?)",
        rusqlite::params![tag.id, tag.text, tag.category],
    )?;
    Ok(())
}

pub fn delete(tx: &Transaction, id: TagId) -> Result<bool> {
    let n = tx.execute("DELETE FROM tags WHERE id = ?", [id])?;
    Ok(n > 0)
}

pub fn update_text(tx: &Transaction, id: TagId, text: &str) -> Result<bool> {
    let n = tx.execute(
        "UPDATE tags SET text = ? WHERE id = ?",
        rusqlite::params![text, id],
    )?;
    Ok(n > 0)
}

pub fn update_category(tx: &Transaction, id: TagId, category: Option<CategoryId>) -> Result<bool> {
    let n = tx.execute(
        "UPDATE tags SET category_id = ? WHERE id = ?",
        rusqlite::params![category, id],
    )?;
    Ok(n > 0)
}

pub fn get(conn: &Connection, id: TagId) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(
            "SELECT id, text, category_id FROM tags WHERE id = ?",
            [id],
            row_to_tag,
        )
        .optional()?;
    Ok(tag)
}

pub fn find_by_text(conn: &Connection, text: &str) -> Result<Option<Tag>> {
    let tag = conn
        .query_row(
            "SELECT id, text, category_id FROM tags WHERE text = ?",
            [text],
            row_to_tag,
        )
        .optional()?;
    Ok(tag)
}

/// Tags belonging to a category, ordered by text.
pub fn in_category(conn: &Connection, category: CategoryId) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT id, text, category_id FROM tags WHERE category_id = ? ORDER BY text",
    )?;
    let tags = stmt
        .query_map([category], row_to_tag)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tags)
}

/// All tags ordered by text.
pub fn all(conn: &Connection) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare("SELECT id, text, category_id FROM tags ORDER BY text")?;
    let tags = stmt
        .query_map([], row_to_tag)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::tempdir;

    #[test]
    fn test_rename_and_lookup() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("set.db")).unwrap();
        let tag = Tag {
            id: TagId::new(),
            text: "red".to_string(),
            category: None,
        };

        let tx = db.transaction().unwrap();
        insert(&tx, &tag).unwrap();
        assert!(update_text(&tx, tag.id, "crimson").unwrap());
        assert!(find_by_text(&tx, "red").unwrap().is_none());
        assert_eq!(find_by_text(&tx, "crimson").unwrap().map(|t| t.id), Some(tag.id));
        tx.commit().unwrap();

        assert_eq!(all(db.conn()).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_category_violates_foreign_key() {
        let dir = tempdir().unwrap();
        let mut db = Database::open(&dir.path().join("set.db")).unwrap();
        let tx = db.transaction().unwrap();
        let tag = Tag {
            id: TagId::new(),
            text: "red".to_string(),
            category: Some(CategoryId::new()),
        };
        assert!(matches!(
            insert(&tx, &tag),
            Err(crate::error::StoreError::Constraint { .. })
        ));
    }
}
