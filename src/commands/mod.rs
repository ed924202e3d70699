//! Reversible mutation commands.
//!
//! A [`Command`] is a fully resolved description of one mutation: it carries
//! every row it writes or removes, so its inverse can be computed without
//! consulting the database. Commands come in inverse pairs (`AddTags` /
//! `DeleteTags`, `Assign` / `Unassign`, ...) or are self-inverse with swapped
//! values (`RenameTag`, `SetRequired`, `SetTagCategory`).
//!
//! Executing a command first checks that the rows it expects are present in
//! exactly the recorded state. If not, it fails with
//! [`StoreError::InconsistentHistory`] and the caller's transaction rolls back.

pub mod history;
pub mod resolve;

pub use history::{Direction, LogEntry};
pub use resolve::Resolved;

use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::db;
use crate::error::{Result, StoreError};
use crate::model::{Assignment, Category, CategoryId, Image, ImageId, Tag, TagId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    AddTags {
        tags: Vec<Tag>,
        assignments: Vec<Assignment>,
    },
    DeleteTags {
        tags: Vec<Tag>,
        assignments: Vec<Assignment>,
    },
    RenameTag {
        id: TagId,
        from: String,
        to: String,
    },
    SetTagCategory {
        tag: TagId,
        text: String,
        from: Option<CategoryId>,
        to: Option<CategoryId>,
    },
    AddImages {
        images: Vec<Image>,
        assignments: Vec<Assignment>,
    },
    DeleteImages {
        images: Vec<Image>,
        assignments: Vec<Assignment>,
    },
    Assign {
        assignments: Vec<Assignment>,
    },
    Unassign {
        assignments: Vec<Assignment>,
    },
    AddCategory {
        category: Category,
        members: Vec<TagId>,
    },
    RemoveCategory {
        category: Category,
        members: Vec<TagId>,
    },
    SetRequired {
        id: CategoryId,
        name: String,
        from: bool,
        to: bool,
    },
}

fn inconsistent(what: impl Into<String>) -> StoreError {
    StoreError::InconsistentHistory(what.into())
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("1 {}", one)
    } else {
        format!("{} {}", n, many)
    }
}

impl Command {
    /// The command that exactly reverts this one.
    pub fn inverse(&self) -> Command {
        match self.clone() {
            Command::AddTags { tags, assignments } => Command::DeleteTags { tags, assignments },
            Command::DeleteTags { tags, assignments } => Command::AddTags { tags, assignments },
            Command::RenameTag { id, from, to } => Command::RenameTag { id, from: to, to: from },
            Command::SetTagCategory { tag, text, from, to } => Command::SetTagCategory {
                tag,
                text,
                from: to,
                to: from,
            },
            Command::AddImages { images, assignments } => {
                Command::DeleteImages { images, assignments }
            }
            Command::DeleteImages { images, assignments } => {
                Command::AddImages { images, assignments }
            }
            Command::Assign { assignments } => Command::Unassign { assignments },
            Command::Unassign { assignments } => Command::Assign { assignments },
            Command::AddCategory { category, members } => {
                Command::RemoveCategory { category, members }
            }
            Command::RemoveCategory { category, members } => {
                Command::AddCategory { category, members }
            }
            Command::SetRequired { id, name, from, to } => Command::SetRequired {
                id,
                name,
                from: to,
                to: from,
            },
        }
    }

    /// Menu text, e.g. "Add tag 'red'".
    pub fn description(&self) -> String {
        match self {
            Command::AddTags { tags, .. } => match tags.as_slice() {
                [tag] => format!("Add tag '{}'", tag.text),
                _ => format!("Add {}", plural(tags.len(), "tag", "tags")),
            },
            Command::DeleteTags { tags, .. } => match tags.as_slice() {
                [tag] => format!("Delete tag '{}'", tag.text),
                _ => format!("Delete {}", plural(tags.len(), "tag", "tags")),
            },
            Command::RenameTag { from, to, .. } => format!("Rename tag '{}' to '{}'", from, to),
            Command::SetTagCategory { text, to, .. } => match to {
                Some(_) => format!("Set category of tag '{}'", text),
                None => format!("Clear category of tag '{}'", text),
            },
            Command::AddImages { images, .. } => match images.as_slice() {
                [image] => format!("Add image '{}'", image.name),
                _ => format!("Add {}", plural(images.len(), "image", "images")),
            },
            Command::DeleteImages { images, .. } => match images.as_slice() {
                [image] => format!("Delete image '{}'", image.name),
                _ => format!("Delete {}", plural(images.len(), "image", "images")),
            },
            Command::Assign { assignments } => {
                let (images, tags) = distinct_counts(assignments);
                format!(
                    "Assign {} to {}",
                    plural(tags, "tag", "tags"),
                    plural(images, "image", "images")
                )
            }
            Command::Unassign { assignments } => {
                let (images, tags) = distinct_counts(assignments);
                format!(
                    "Unassign {} from {}",
                    plural(tags, "tag", "tags"),
                    plural(images, "image", "images")
                )
            }
            Command::AddCategory { category, .. } => format!("Add category '{}'", category.name),
            Command::RemoveCategory { category, .. } => {
                format!("Remove category '{}'", category.name)
            }
            Command::SetRequired { name, to, .. } => {
                if *to {
                    format!("Mark category '{}' as required", name)
                } else {
                    format!("Mark category '{}' as optional", name)
                }
            }
        }
    }

    /// Applies the command inside `tx`.
    pub fn execute(&self, tx: &Transaction) -> Result<()> {
        match self {
            Command::AddTags { tags, assignments } => {
                for tag in tags {
                    if db::tags::get(tx, tag.id)?.is_some() {
                        return Err(inconsistent(format!("tag {} already exists", tag.id)));
                    }
                    if db::tags::find_by_text(tx, &tag.text)?.is_some() {
                        return Err(StoreError::Duplicate {
                            kind: "tag",
                            name: tag.text.clone(),
                        });
                    }
                    db::tags::insert(tx, tag)?;
                }
                insert_assignments(tx, assignments)
            }
            Command::DeleteTags { tags, assignments } => {
                let recorded = group_by(assignments, |a| a.tag);
                for tag in tags {
                    if db::tags::get(tx, tag.id)?.as_ref() != Some(tag) {
                        return Err(inconsistent(format!("tag '{}' changed", tag.text)));
                    }
                    let current: BTreeSet<Assignment> =
                        db::assignments::for_tag(tx, tag.id)?.into_iter().collect();
                    if current != recorded.get(&tag.id).cloned().unwrap_or_default() {
                        return Err(inconsistent(format!(
                            "assignments of tag '{}' changed",
                            tag.text
                        )));
                    }
                    for a in current {
                        db::assignments::delete(tx, a)?;
                    }
                    db::tags::delete(tx, tag.id)?;
                }
                Ok(())
            }
            Command::RenameTag { id, from, to } => {
                let tag = db::tags::get(tx, *id)?
                    .ok_or_else(|| inconsistent(format!("tag {} is missing", id)))?;
                if &tag.text != from {
                    return Err(inconsistent(format!("tag '{}' was renamed", from)));
                }
                if let Some(owner) = db::tags::find_by_text(tx, to)? {
                    if owner.id != *id {
                        return Err(StoreError::Duplicate {
                            kind: "tag",
                            name: to.clone(),
                        });
                    }
                }
                db::tags::update_text(tx, *id, to)?;
                Ok(())
            }
            Command::SetTagCategory { tag, text, from, to } => {
                let current = db::tags::get(tx, *tag)?
                    .ok_or_else(|| inconsistent(format!("tag '{}' is missing", text)))?;
                if current.category != *from {
                    return Err(inconsistent(format!("category of tag '{}' changed", text)));
                }
                db::tags::update_category(tx, *tag, *to)?;
                Ok(())
            }
            Command::AddImages { images, assignments } => {
                for image in images {
                    if db::images::get(tx, image.id)?.is_some() {
                        return Err(inconsistent(format!("image {} already exists", image.id)));
                    }
                    if db::images::find_by_name(tx, &image.name)?.is_some() {
                        return Err(StoreError::Duplicate {
                            kind: "image",
                            name: image.name.clone(),
                        });
                    }
                    db::images::insert(tx, image)?;
                }
                insert_assignments(tx, assignments)
            }
            Command::DeleteImages { images, assignments } => {
                let recorded = group_by(assignments, |a| a.image);
                for image in images {
                    if db::images::get(tx, image.id)?.as_ref() != Some(image) {
                        return Err(inconsistent(format!("image '{}' changed", image.name)));
                    }
                    let current: BTreeSet<Assignment> =
                        db::assignments::for_image(tx, image.id)?.into_iter().collect();
                    if current != recorded.get(&image.id).cloned().unwrap_or_default() {
                        return Err(inconsistent(format!(
                            "assignments of image '{}' changed",
                            image.name
                        )));
                    }
                    for a in current {
                        db::assignments::delete(tx, a)?;
                    }
                    db::images::delete(tx, image.id)?;
                }
                Ok(())
            }
            Command::Assign { assignments } => insert_assignments(tx, assignments),
            Command::Unassign { assignments } => {
                for a in assignments {
                    if !db::assignments::delete(tx, *a)? {
                        return Err(inconsistent(format!(
                            "tag {} is not assigned to image {}",
                            a.tag, a.image
                        )));
                    }
                }
                Ok(())
            }
            Command::AddCategory { category, members } => {
                if db::categories::get(tx, category.id)?.is_some() {
                    return Err(inconsistent(format!(
                        "category {} already exists",
                        category.id
                    )));
                }
                if db::categories::find_by_name(tx, &category.name)?.is_some() {
                    return Err(StoreError::Duplicate {
                        kind: "category",
                        name: category.name.clone(),
                    });
                }
                db::categories::insert(tx, category)?;
                for member in members {
                    let tag = db::tags::get(tx, *member)?
                        .ok_or_else(|| inconsistent(format!("tag {} is missing", member)))?;
                    if tag.category.is_some() {
                        return Err(inconsistent(format!(
                            "tag '{}' already has a category",
                            tag.text
                        )));
                    }
                    db::tags::update_category(tx, *member, Some(category.id))?;
                }
                Ok(())
            }
            Command::RemoveCategory { category, members } => {
                if db::categories::get(tx, category.id)?.as_ref() != Some(category) {
                    return Err(inconsistent(format!(
                        "category '{}' changed",
                        category.name
                    )));
                }
                let current: BTreeSet<TagId> = db::tags::in_category(tx, category.id)?
                    .into_iter()
                    .map(|t| t.id)
                    .collect();
                if current != members.iter().copied().collect::<BTreeSet<_>>() {
                    return Err(inconsistent(format!(
                        "members of category '{}' changed",
                        category.name
                    )));
                }
                for member in members {
                    db::tags::update_category(tx, *member, None)?;
                }
                db::categories::delete(tx, category.id)?;
                Ok(())
            }
            Command::SetRequired { id, name, from, to } => {
                let category = db::categories::get(tx, *id)?
                    .ok_or_else(|| inconsistent(format!("category '{}' is missing", name)))?;
                if category.required != *from {
                    return Err(inconsistent(format!(
                        "required flag of '{}' changed",
                        name
                    )));
                }
                db::categories::set_required(tx, *id, *to)?;
                Ok(())
            }
        }
    }

    /// Images whose required-category coverage this command can shrink.
    fn coverage_scope(&self, tx: &Transaction) -> Result<BTreeSet<ImageId>> {
        let scope = match self {
            Command::Unassign { assignments } | Command::DeleteTags { assignments, .. } => {
                assignments.iter().map(|a| a.image).collect()
            }
            Command::SetTagCategory { tag, from: Some(_), .. } => db::assignments::for_tag(tx, *tag)?
                .into_iter()
                .map(|a| a.image)
                .collect(),
            _ => BTreeSet::new(),
        };
        Ok(scope)
    }

    /// Executes a freshly issued command, rejecting it if it would leave an
    /// image without a tag from a required category it was covered by before.
    /// Undo and redo go through [`Command::execute`] directly.
    pub fn execute_validated(&self, tx: &Transaction) -> Result<()> {
        let before = self
            .coverage_scope(tx)?
            .into_iter()
            .map(|image| Ok((image, db::assignments::required_coverage(tx, image)?)))
            .collect::<Result<Vec<_>>>()?;

        self.execute(tx)?;

        for (image, covered) in before {
            let after = db::assignments::required_coverage(tx, image)?;
            if let Some(lost) = covered.difference(&after).next() {
                let image_name = db::images::get(tx, image)?
                    .map(|i| i.name)
                    .unwrap_or_else(|| image.to_string());
                let category_name = db::categories::get(tx, *lost)?
                    .map(|c| c.name)
                    .unwrap_or_else(|| lost.to_string());
                return Err(StoreError::RequiredCategory {
                    image: image_name,
                    category: category_name,
                });
            }
        }
        Ok(())
    }
}

fn insert_assignments(tx: &Transaction, assignments: &[Assignment]) -> Result<()> {
    for a in assignments {
        if db::assignments::exists(tx, *a)? {
            return Err(inconsistent(format!(
                "tag {} is already assigned to image {}",
                a.tag, a.image
            )));
        }
        db::assignments::insert(tx, *a)?;
    }
    Ok(())
}

fn group_by<K: Ord>(
    assignments: &[Assignment],
    key: impl Fn(&Assignment) -> K,
) -> BTreeMap<K, BTreeSet<Assignment>> {
    let mut groups: BTreeMap<K, BTreeSet<Assignment>> = BTreeMap::new();
    for a in assignments {
        groups.entry(key(a)).or_default().insert(*a);
    }
    groups
}

fn distinct_counts(assignments: &[Assignment]) -> (usize, usize) {
    let images: BTreeSet<ImageId> = assignments.iter().map(|a| a.image).collect();
    let tags: BTreeSet<TagId> = assignments.iter().map(|a| a.tag).collect();
    (images.len(), tags.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn tag(text: &str) -> Tag {
        Tag {
            id: TagId::new(),
            text: text.to_string(),
            category: None,
        }
    }

    fn image(name: &str) -> Image {
        Image {
            id: ImageId::new(),
            name: name.to_string(),
            path: PathBuf::from(format!("/data/{name}.png")),
            source_uri: None,
        }
    }

    #[test]
    fn test_inverse_is_involution() {
        let red = tag("red");
        let commands = vec![
            Command::AddTags {
                tags: vec![red.clone()],
                assignments: vec![],
            },
            Command::RenameTag {
                id: red.id,
                from: "red".to_string(),
                to: "crimson".to_string(),
            },
            Command::SetRequired {
                id: CategoryId::new(),
                name: "subject".to_string(),
                from: false,
                to: true,
            },
        ];
        for command in commands {
            assert_eq!(command.inverse().inverse(), command);
        }
    }

    #[test]
    fn test_descriptions() {
        let add = Command::AddTags {
            tags: vec![tag("red")],
            assignments: vec![],
        };
        assert_eq!(add.description(), "Add tag 'red'");
        let assign = Command::Assign {
            assignments: vec![Assignment {
                image: ImageId::new(),
                tag: TagId::new(),
            }],
        };
        assert_eq!(assign.description(), "Assign 1 tag to 1 image");
    }

    #[test]
    fn test_delete_then_inverse_restores_assignments() {
        let dir = tempdir().unwrap();
        let mut database = Database::open(&dir.path().join("set.db")).unwrap();
        let x = image("x");
        let red = tag("red");
        let a = Assignment {
            image: x.id,
            tag: red.id,
        };

        let tx = database.transaction().unwrap();
        Command::AddImages {
            images: vec![x.clone()],
            assignments: vec![],
        }
        .execute(&tx)
        .unwrap();
        Command::AddTags {
            tags: vec![red.clone()],
            assignments: vec![],
        }
        .execute(&tx)
        .unwrap();
        Command::Assign { assignments: vec![a] }.execute(&tx).unwrap();

        let delete = Command::DeleteTags {
            tags: vec![red.clone()],
            assignments: vec![a],
        };
        delete.execute(&tx).unwrap();
        assert!(db::tags::get(&tx, red.id).unwrap().is_none());

        delete.inverse().execute(&tx).unwrap();
        assert!(db::assignments::exists(&tx, a).unwrap());
    }

    #[test]
    fn test_stale_inverse_is_rejected() {
        let dir = tempdir().unwrap();
        let mut database = Database::open(&dir.path().join("set.db")).unwrap();
        let red = tag("red");

        let tx = database.transaction().unwrap();
        let add = Command::AddTags {
            tags: vec![red.clone()],
            assignments: vec![],
        };
        add.execute(&tx).unwrap();
        db::tags::update_text(&tx, red.id, "blue").unwrap();

        assert!(matches!(
            add.inverse().execute(&tx),
            Err(StoreError::InconsistentHistory(_))
        ));
    }

    #[test]
    fn test_required_category_blocks_unassign() {
        let dir = tempdir().unwrap();
        let mut database = Database::open(&dir.path().join("set.db")).unwrap();
        let x = image("x");
        let subject = Category {
            id: CategoryId::new(),
            name: "subject".to_string(),
            required: true,
        };
        let mut cat = tag("cat");
        cat.category = Some(subject.id);
        let a = Assignment {
            image: x.id,
            tag: cat.id,
        };

        let tx = database.transaction().unwrap();
        db::categories::insert(&tx, &subject).unwrap();
        db::images::insert(&tx, &x).unwrap();
        db::tags::insert(&tx, &cat).unwrap();
        db::assignments::insert(&tx, a).unwrap();

        let err = Command::Unassign { assignments: vec![a] }
            .execute_validated(&tx)
            .unwrap_err();
        assert!(matches!(err, StoreError::RequiredCategory { ref category, .. } if category == "subject"));
    }
}
