//! Turns caller requests into concrete [`Command`]s.
//!
//! Resolution reads the current rows inside the worker's transaction, so the
//! command it yields is exact: tags that already exist, assignments already
//! present and assignments already absent are filtered out. A request that
//! changes nothing resolves to `command: None` and is not logged.

use rusqlite::Connection;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::Command;
use crate::config::Config;
use crate::db;
use crate::error::{Result, StoreError};
use crate::model::{
    normalize_image_name, normalize_name, validate_tag_text, Assignment, Category, CategoryId,
    Image, ImageId, NewImage, Tag, TagId,
};

/// Outcome of resolving one request.
#[derive(Debug)]
pub struct Resolved<T> {
    pub command: Option<Command>,
    pub output: T,
    /// Files written while resolving; removed again if the command fails.
    pub created_files: Vec<PathBuf>,
}

impl<T> Resolved<T> {
    fn unchanged(output: T) -> Self {
        Self {
            command: None,
            output,
            created_files: Vec::new(),
        }
    }

    fn change(command: Command, output: T) -> Self {
        Self {
            command: Some(command),
            output,
            created_files: Vec::new(),
        }
    }

    /// Converts the output, keeping the command and created files.
    pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<Resolved<U>> {
        let output = match f(self.output) {
            Ok(output) => output,
            Err(e) => {
                remove_files(&self.created_files);
                return Err(e);
            }
        };
        Ok(Resolved {
            command: self.command,
            output,
            created_files: self.created_files,
        })
    }
}

fn existing_tag(conn: &Connection, id: TagId) -> Result<Tag> {
    db::tags::get(conn, id)?.ok_or_else(|| StoreError::not_found("tag", id))
}

fn existing_image(conn: &Connection, id: ImageId) -> Result<Image> {
    db::images::get(conn, id)?.ok_or_else(|| StoreError::not_found("image", id))
}

fn existing_category(conn: &Connection, id: CategoryId) -> Result<Category> {
    db::categories::get(conn, id)?.ok_or_else(|| StoreError::not_found("category", id))
}

/// Adding text that already exists returns the existing ID.
pub fn add_tags(conn: &Connection, texts: &[String]) -> Result<Resolved<Vec<TagId>>> {
    let mut ids = Vec::with_capacity(texts.len());
    let mut new_tags: Vec<Tag> = Vec::new();

    for text in texts {
        validate_tag_text(text)?;
        if let Some(tag) = db::tags::find_by_text(conn, text)? {
            ids.push(tag.id);
        } else if let Some(tag) = new_tags.iter().find(|t| &t.text == text) {
            ids.push(tag.id);
        } else {
            let tag = Tag {
                id: TagId::new(),
                text: text.clone(),
                category: None,
            };
            ids.push(tag.id);
            new_tags.push(tag);
        }
    }

    if new_tags.is_empty() {
        return Ok(Resolved::unchanged(ids));
    }
    Ok(Resolved::change(
        Command::AddTags {
            tags: new_tags,
            assignments: Vec::new(),
        },
        ids,
    ))
}

pub fn rename_tag(conn: &Connection, id: TagId, text: &str) -> Result<Resolved<()>> {
    validate_tag_text(text)?;
    let tag = existing_tag(conn, id)?;
    if tag.text == text {
        return Ok(Resolved::unchanged(()));
    }
    if db::tags::find_by_text(conn, text)?.is_some() {
        return Err(StoreError::Duplicate {
            kind: "tag",
            name: text.to_string(),
        });
    }
    Ok(Resolved::change(
        Command::RenameTag {
            id,
            from: tag.text,
            to: text.to_string(),
        },
        (),
    ))
}

pub fn delete_tags(conn: &Connection, ids: &[TagId]) -> Result<Resolved<()>> {
    let ids: BTreeSet<TagId> = ids.iter().copied().collect();
    if ids.is_empty() {
        return Ok(Resolved::unchanged(()));
    }
    let mut tags = Vec::with_capacity(ids.len());
    let mut assignments = Vec::new();
    for id in ids {
        tags.push(existing_tag(conn, id)?);
        assignments.extend(db::assignments::for_tag(conn, id)?);
    }
    Ok(Resolved::change(Command::DeleteTags { tags, assignments }, ()))
}

pub fn set_tag_category(
    conn: &Connection,
    tag: TagId,
    category: Option<CategoryId>,
) -> Result<Resolved<()>> {
    let current = existing_tag(conn, tag)?;
    if let Some(id) = category {
        existing_category(conn, id)?;
    }
    if current.category == category {
        return Ok(Resolved::unchanged(()));
    }
    Ok(Resolved::change(
        Command::SetTagCategory {
            tag,
            text: current.text,
            from: current.category,
            to: category,
        },
        (),
    ))
}

/// Checks that the file exists and decodes as an image.
pub fn validate_image_file(path: &Path) -> Result<()> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| StoreError::io(path, e))?
        .with_guessed_format()
        .map_err(|e| StoreError::io(path, e))?;
    reader.decode().map_err(|source| StoreError::ImageFormat {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn prepare_image(request: &NewImage) -> Result<Image> {
    validate_image_file(&request.path)?;
    let path = request
        .path
        .canonicalize()
        .map_err(|e| StoreError::io(&request.path, e))?;
    let name = match &request.name {
        Some(name) => normalize_image_name(name)?,
        None => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            normalize_image_name(&stem)?
        }
    };
    Ok(Image {
        id: ImageId::new(),
        name,
        path,
        source_uri: request.source_uri.clone(),
    })
}

/// Copies each image into `library`, pointing the image at its copy.
fn copy_into_library(images: &mut [Image], library: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(library).map_err(|e| StoreError::io(library, e))?;
    let mut created = Vec::with_capacity(images.len());
    for image in images.iter_mut() {
        let file_name = match image.path.extension() {
            Some(ext) => format!("{}.{}", image.id, ext.to_string_lossy()),
            None => image.id.to_string(),
        };
        let target = library.join(file_name);
        if let Err(e) = std::fs::copy(&image.path, &target) {
            remove_files(&created);
            return Err(StoreError::io(&target, e));
        }
        created.push(target.clone());
        image.path = target;
    }
    Ok(created)
}

pub fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove copied image");
        }
    }
}

/// Deletes library copies that no image row points at any more. Only files
/// named after an image ID are touched. Returns the number removed.
pub fn prune_library(conn: &Connection, library: &Path) -> Result<usize> {
    let entries = match std::fs::read_dir(library) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StoreError::io(library, e)),
    };
    let referenced: BTreeSet<PathBuf> = db::images::all(conn)?
        .into_iter()
        .map(|image| image.path)
        .collect();

    let mut orphaned = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(library, e))?;
        let path = entry.path();
        let is_copy = entry.file_type().map(|t| t.is_file()).unwrap_or(false)
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| uuid::Uuid::parse_str(stem).is_ok());
        if !is_copy || referenced.contains(&path) {
            continue;
        }
        if let Ok(canonical) = path.canonicalize() {
            if referenced.contains(&canonical) {
                continue;
            }
        }
        orphaned.push(path);
    }

    remove_files(&orphaned);
    Ok(orphaned.len())
}

pub fn add_images(
    conn: &Connection,
    config: &Config,
    requests: &[NewImage],
) -> Result<Resolved<Vec<ImageId>>> {
    let mut images: Vec<Image> = Vec::with_capacity(requests.len());
    for request in requests {
        let image = prepare_image(request)?;
        if db::images::find_by_name(conn, &image.name)?.is_some()
            || images.iter().any(|i| i.name == image.name)
        {
            return Err(StoreError::Duplicate {
                kind: "image",
                name: image.name,
            });
        }
        images.push(image);
    }

    if images.is_empty() {
        return Ok(Resolved::unchanged(Vec::new()));
    }

    let created_files = if config.images.copy_on_add {
        copy_into_library(&mut images, &config.library_dir())?
    } else {
        Vec::new()
    };
    let ids = images.iter().map(|i| i.id).collect();
    Ok(Resolved {
        command: Some(Command::AddImages {
            images,
            assignments: Vec::new(),
        }),
        output: ids,
        created_files,
    })
}

pub fn delete_images(conn: &Connection, ids: &[ImageId]) -> Result<Resolved<()>> {
    let ids: BTreeSet<ImageId> = ids.iter().copied().collect();
    if ids.is_empty() {
        return Ok(Resolved::unchanged(()));
    }
    let mut images = Vec::with_capacity(ids.len());
    let mut assignments = Vec::new();
    for id in ids {
        images.push(existing_image(conn, id)?);
        assignments.extend(db::assignments::for_image(conn, id)?);
    }
    Ok(Resolved::change(Command::DeleteImages { images, assignments }, ()))
}

/// Every (image, tag) pair of the request, after checking both sides exist.
fn pairs(conn: &Connection, images: &[ImageId], tags: &[TagId]) -> Result<BTreeSet<Assignment>> {
    let images: BTreeSet<ImageId> = images.iter().copied().collect();
    let tags: BTreeSet<TagId> = tags.iter().copied().collect();
    for image in &images {
        existing_image(conn, *image)?;
    }
    for tag in &tags {
        existing_tag(conn, *tag)?;
    }
    Ok(images
        .iter()
        .flat_map(|&image| tags.iter().map(move |&tag| Assignment { image, tag }))
        .collect())
}

pub fn assign(conn: &Connection, images: &[ImageId], tags: &[TagId]) -> Result<Resolved<()>> {
    let mut assignments = Vec::new();
    for a in pairs(conn, images, tags)? {
        if !db::assignments::exists(conn, a)? {
            assignments.push(a);
        }
    }
    if assignments.is_empty() {
        return Ok(Resolved::unchanged(()));
    }
    Ok(Resolved::change(Command::Assign { assignments }, ()))
}

pub fn unassign(conn: &Connection, images: &[ImageId], tags: &[TagId]) -> Result<Resolved<()>> {
    let mut assignments = Vec::new();
    for a in pairs(conn, images, tags)? {
        if db::assignments::exists(conn, a)? {
            assignments.push(a);
        }
    }
    if assignments.is_empty() {
        return Ok(Resolved::unchanged(()));
    }
    Ok(Resolved::change(Command::Unassign { assignments }, ()))
}

pub fn add_category(conn: &Connection, name: &str, required: bool) -> Result<Resolved<CategoryId>> {
    let name = normalize_name("category", name)?;
    if db::categories::find_by_name(conn, &name)?.is_some() {
        return Err(StoreError::Duplicate {
            kind: "category",
            name,
        });
    }
    let category = Category {
        id: CategoryId::new(),
        name,
        required,
    };
    let id = category.id;
    Ok(Resolved::change(
        Command::AddCategory {
            category,
            members: Vec::new(),
        },
        id,
    ))
}

pub fn remove_category(conn: &Connection, id: CategoryId) -> Result<Resolved<()>> {
    let category = existing_category(conn, id)?;
    let members = db::tags::in_category(conn, id)?
        .into_iter()
        .map(|t| t.id)
        .collect();
    Ok(Resolved::change(Command::RemoveCategory { category, members }, ()))
}

pub fn set_category_required(
    conn: &Connection,
    id: CategoryId,
    required: bool,
) -> Result<Resolved<()>> {
    let category = existing_category(conn, id)?;
    if category.required == required {
        return Ok(Resolved::unchanged(()));
    }
    Ok(Resolved::change(
        Command::SetRequired {
            id,
            name: category.name,
            from: category.required,
            to: required,
        },
        (),
    ))
}
