//! Read-only projections of the store.
//!
//! The worker rebuilds an immutable [`Snapshot`] after each committed command
//! and hands it to readers as an `Arc`. Readers never lock the database and
//! never wait on queued writes; they see the latest published version.

use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};

use crate::db;
use crate::error::Result;
use crate::model::{Category, CategoryId, Image, ImageId, Tag, TagId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Initial projections are being built from persisted data.
    Loading,
    /// Ready for commands.
    Idle,
}

/// A tag together with its derived assignment count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSummary {
    pub tag: Tag,
    pub assignment_count: usize,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: u64,
    pub status: Status,
    /// Ordered by name.
    pub images: Vec<Image>,
    /// Ordered by text.
    pub tags: Vec<TagSummary>,
    /// Ordered by name.
    pub categories: Vec<Category>,
    pub image_tags: BTreeMap<ImageId, BTreeSet<TagId>>,
    pub tag_images: BTreeMap<TagId, BTreeSet<ImageId>>,
    pub prefix_captions: BTreeSet<String>,
    pub selected: Option<ImageId>,
    pub undo_description: Option<String>,
    pub redo_description: Option<String>,
    pub undo_depth: usize,
    pub redo_depth: usize,
}

impl Snapshot {
    pub fn loading() -> Self {
        Self {
            version: 0,
            status: Status::Loading,
            images: Vec::new(),
            tags: Vec::new(),
            categories: Vec::new(),
            image_tags: BTreeMap::new(),
            tag_images: BTreeMap::new(),
            prefix_captions: BTreeSet::new(),
            selected: None,
            undo_description: None,
            redo_description: None,
            undo_depth: 0,
            redo_depth: 0,
        }
    }

    /// Full rebuild from the tables. A selection pointing at a vanished image is dropped.
    pub fn build(conn: &Connection, version: u64, selected: Option<ImageId>) -> Result<Self> {
        let images = db::images::all(conn)?;
        let tags = db::tags::all(conn)?;
        let categories = db::categories::all(conn)?;

        let mut image_tags: BTreeMap<ImageId, BTreeSet<TagId>> =
            images.iter().map(|i| (i.id, BTreeSet::new())).collect();
        let mut tag_images: BTreeMap<TagId, BTreeSet<ImageId>> =
            tags.iter().map(|t| (t.id, BTreeSet::new())).collect();
        for a in db::assignments::all(conn)? {
            image_tags.entry(a.image).or_default().insert(a.tag);
            tag_images.entry(a.tag).or_default().insert(a.image);
        }

        let tags = tags
            .into_iter()
            .map(|tag| {
                let assignment_count = tag_images.get(&tag.id).map_or(0, BTreeSet::len);
                TagSummary { tag, assignment_count }
            })
            .collect();

        let selected = selected.filter(|id| image_tags.contains_key(id));
        let undo = db::command_log::top_undo(conn)?;
        let redo = db::command_log::top_redo(conn)?;
        let (undo_depth, redo_depth) = db::command_log::depths(conn)?;

        Ok(Self {
            version,
            status: Status::Idle,
            images,
            tags,
            categories,
            image_tags,
            tag_images,
            prefix_captions: db::prefix_captions::all(conn)?,
            selected,
            undo_description: undo.map(|r| r.description),
            redo_description: redo.map(|r| r.description),
            undo_depth,
            redo_depth,
        })
    }

    pub fn image(&self, id: ImageId) -> Option<&Image> {
        self.images.iter().find(|i| i.id == id)
    }

    pub fn image_by_name(&self, name: &str) -> Option<&Image> {
        self.images.iter().find(|i| i.name == name)
    }

    pub fn tag(&self, id: TagId) -> Option<&TagSummary> {
        self.tags.iter().find(|t| t.tag.id == id)
    }

    pub fn tag_by_text(&self, text: &str) -> Option<&TagSummary> {
        self.tags.iter().find(|t| t.tag.text == text)
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Tags assigned to an image, ordered by text.
    pub fn tags_of(&self, image: ImageId) -> Vec<&Tag> {
        let Some(ids) = self.image_tags.get(&image) else {
            return Vec::new();
        };
        self.tags
            .iter()
            .filter(|t| ids.contains(&t.tag.id))
            .map(|t| &t.tag)
            .collect()
    }

    /// Tag texts of an image, ordered.
    pub fn tag_texts_of(&self, image: ImageId) -> Vec<&str> {
        self.tags_of(image).into_iter().map(|t| t.text.as_str()).collect()
    }

    pub fn selected_image(&self) -> Option<&Image> {
        self.selected.and_then(|id| self.image(id))
    }

    /// Tags on the selected image; empty without a selection.
    pub fn assigned_tags(&self) -> Vec<&Tag> {
        self.selected.map(|id| self.tags_of(id)).unwrap_or_default()
    }

    /// Tags not on the selected image; empty without a selection.
    pub fn unassigned_tags(&self) -> Vec<&Tag> {
        let Some(id) = self.selected else {
            return Vec::new();
        };
        let assigned = self.image_tags.get(&id);
        self.tags
            .iter()
            .filter(|t| !assigned.is_some_and(|set| set.contains(&t.tag.id)))
            .map(|t| &t.tag)
            .collect()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_depth > 0
    }

    pub fn can_redo(&self) -> bool {
        self.redo_depth > 0
    }
}
