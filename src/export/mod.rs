//! Export to an import-compatible directory.
//!
//! For every image, `<name>.<caption ext>` holds the prefix captions followed
//! by the image's tag texts, sorted, joined by `",\n"` with a trailing newline.
//! Images are optionally byte-copied to `<name>.<ext>`. Each file is written to
//! a temporary file in its target directory and renamed into place, so readers
//! never observe a partial file.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Result, StoreError};
use crate::events::EventBus;
use crate::model::{image_name_path, Image};
use crate::projection::Snapshot;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub copy_images: bool,
    pub caption_extension: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    pub images: usize,
    pub captions: usize,
}

/// Caption file body for one image.
pub fn caption_text(snapshot: &Snapshot, image: &Image) -> String {
    let lines: Vec<&str> = snapshot
        .prefix_captions
        .iter()
        .map(String::as_str)
        .chain(snapshot.tag_texts_of(image.id))
        .collect();
    if lines.is_empty() {
        return String::new();
    }
    let mut text = lines.join(",\n");
    text.push('\n');
    text
}

/// Writes `target` through a temporary file in the same directory.
fn write_atomic(target: &Path, write: impl FnOnce(&mut File) -> io::Result<()>) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    write(temp.as_file_mut())
        .and_then(|_| temp.as_file_mut().flush())
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| StoreError::io(target, e))?;
    temp.persist(target)
        .map_err(|e| StoreError::io(target, e.error))?;
    Ok(())
}

/// `dir/<name>` for a stored image name. Names that would leave `dir` are refused.
fn name_target(dir: &Path, image: &Image) -> Result<PathBuf> {
    image_name_path(&image.name)
        .map(|relative| dir.join(relative))
        .ok_or_else(|| StoreError::InvalidName {
            kind: "image",
            name: image.name.clone(),
        })
}

fn with_extension_appended(base: PathBuf, ext: &OsStr) -> PathBuf {
    let mut name = base.into_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

fn image_target(dir: &Path, image: &Image) -> Result<PathBuf> {
    let base = name_target(dir, image)?;
    Ok(match image.path.extension() {
        Some(ext) => with_extension_appended(base, ext),
        None => base,
    })
}

fn caption_target(dir: &Path, image: &Image, extension: &str) -> Result<PathBuf> {
    Ok(with_extension_appended(
        name_target(dir, image)?,
        OsStr::new(extension),
    ))
}

fn export_image(
    snapshot: &Snapshot,
    image: &Image,
    dir: &Path,
    options: &ExportOptions,
    summary: &mut ExportSummary,
) -> Result<()> {
    if options.copy_images {
        let mut source =
            File::open(&image.path).map_err(|e| StoreError::io(&image.path, e))?;
        write_atomic(&image_target(dir, image)?, |out| {
            io::copy(&mut source, out).map(|_| ())
        })?;
        summary.images += 1;
    }

    let text = caption_text(snapshot, image);
    write_atomic(&caption_target(dir, image, &options.caption_extension)?, |out| {
        out.write_all(text.as_bytes())
    })?;
    summary.captions += 1;
    Ok(())
}

/// Exports every image of `snapshot` into `dir`. Stops at the first failure,
/// which is also published on `events`.
pub fn export_directory(
    snapshot: &Snapshot,
    dir: &Path,
    options: &ExportOptions,
    events: &EventBus,
) -> Result<ExportSummary> {
    tracing::info!(directory = %dir.display(), images = snapshot.images.len(), "Exporting dataset");
    events.info(format!("Exporting {} images to {}", snapshot.images.len(), dir.display()));

    let mut summary = ExportSummary::default();
    let total = snapshot.images.len();
    for (index, image) in snapshot.images.iter().enumerate() {
        let progress = (index + 1) as f32 / total as f32;
        if let Err(err) = export_image(snapshot, image, dir, options, &mut summary) {
            events.error_at(&err, Some(progress));
            return Err(err);
        }
        events.progress(format!("Exported {}", image.name), progress);
    }

    tracing::info!(
        directory = %dir.display(),
        images = summary.images,
        captions = summary.captions,
        "Export complete"
    );
    events.info(format!("Exported {} caption files", summary.captions));
    Ok(summary)
}
