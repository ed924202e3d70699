use rusqlite::Transaction;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::db;
use crate::error::Result;
use crate::model::{Assignment, Image, ImageId, Tag, TagId};
use crate::projection::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetImage {
    /// Relative file name without extension, `/`-separated.
    pub name: String,
    pub path: PathBuf,
}

/// An in-memory dataset, as scanned from disk or read from a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    pub images: BTreeMap<ImageId, DatasetImage>,
    pub tags: BTreeMap<TagId, String>,
    pub assignments: BTreeSet<Assignment>,
    pub prefix_captions: BTreeSet<String>,
}

/// ID-free view of a dataset: what two datasets must agree on to hold the same data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    /// Image name to the texts of its tags.
    pub images: BTreeMap<String, BTreeSet<String>>,
    pub tags: BTreeSet<String>,
    pub prefix_captions: BTreeSet<String>,
}

impl Dataset {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.tags.is_empty() && self.prefix_captions.is_empty()
    }

    pub fn image_by_name(&self, name: &str) -> Option<ImageId> {
        self.images
            .iter()
            .find(|(_, image)| image.name == name)
            .map(|(id, _)| *id)
    }

    pub fn tag_by_text(&self, text: &str) -> Option<TagId> {
        self.tags
            .iter()
            .find(|(_, t)| t.as_str() == text)
            .map(|(id, _)| *id)
    }

    pub fn content(&self) -> Content {
        let mut images: BTreeMap<String, BTreeSet<String>> = self
            .images
            .values()
            .map(|image| (image.name.clone(), BTreeSet::new()))
            .collect();
        for a in &self.assignments {
            if let (Some(image), Some(text)) = (self.images.get(&a.image), self.tags.get(&a.tag)) {
                images
                    .entry(image.name.clone())
                    .or_default()
                    .insert(text.clone());
            }
        }
        Content {
            images,
            tags: self.tags.values().cloned().collect(),
            prefix_captions: self.prefix_captions.clone(),
        }
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            images: snapshot
                .images
                .iter()
                .map(|image| {
                    (
                        image.id,
                        DatasetImage {
                            name: image.name.clone(),
                            path: image.path.clone(),
                        },
                    )
                })
                .collect(),
            tags: snapshot
                .tags
                .iter()
                .map(|t| (t.tag.id, t.tag.text.clone()))
                .collect(),
            assignments: snapshot
                .image_tags
                .iter()
                .flat_map(|(&image, tags)| tags.iter().map(move |&tag| Assignment { image, tag }))
                .collect(),
            prefix_captions: snapshot.prefix_captions.clone(),
        }
    }

    /// Inserts every row inside `tx`. The tables are expected to be empty.
    pub fn write(&self, tx: &Transaction) -> Result<()> {
        for (id, image) in &self.images {
            db::images::insert(
                tx,
                &Image {
                    id: *id,
                    name: image.name.clone(),
                    path: image.path.clone(),
                    source_uri: None,
                },
            )?;
        }
        for (id, text) in &self.tags {
            db::tags::insert(
                tx,
                &Tag {
                    id: *id,
                    text: text.clone(),
                    category: None,
                },
            )?;
        }
        for a in &self.assignments {
            db::assignments::insert(tx, *a)?;
        }
        for text in &self.prefix_captions {
            db::prefix_captions::insert(tx, text)?;
        }
        Ok(())
    }
}
