//! Directory import and content-addressed merge.
//!
//! Each directory is scanned into a [`Dataset`]: image files matching the
//! configured extensions, their sibling caption files and an optional prefix
//! file. Image IDs derive from absolute paths and tag IDs from tag text, so
//! rescanning the same tree yields the same IDs. Per-item failures are
//! published as they happen and counted; the caller turns a non-zero count
//! into one aggregate failure once everything has been processed.

pub mod caption;
pub mod dataset;
pub mod discovery;
pub mod merge;

use std::path::{Component, Path, PathBuf};

use crate::config::ImportConfig;
use crate::error::{Result, StoreError};
use crate::events::EventBus;
use crate::model::{Assignment, ImageId, TagId};

pub use dataset::{Content, Dataset, DatasetImage};
pub use discovery::discover_images;
pub use merge::merge;

/// Totals written by a completed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportSummary {
    pub images: usize,
    pub tags: usize,
    pub assignments: usize,
    pub prefix_captions: usize,
}

impl ImportSummary {
    pub fn of(dataset: &Dataset) -> Self {
        Self {
            images: dataset.images.len(),
            tags: dataset.tags.len(),
            assignments: dataset.assignments.len(),
            prefix_captions: dataset.prefix_captions.len(),
        }
    }
}

/// A scanned directory and the number of per-item failures seen on the way.
#[derive(Debug, Default)]
pub struct Scan {
    pub dataset: Dataset,
    pub failures: usize,
}

/// `nested/photo.png` under `root` becomes `nested/photo`.
fn image_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let parts: Vec<String> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn check_image(path: &Path) -> std::result::Result<(), String> {
    image::ImageReader::open(path)
        .map_err(|e| e.to_string())?
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Scans one directory. Only a missing or unreadable root is returned as an error;
/// everything else is published on `events` and counted.
pub fn scan_directory(directory: &Path, config: &ImportConfig, events: &EventBus) -> Result<Scan> {
    let root = directory
        .canonicalize()
        .map_err(|e| StoreError::io(directory, e))?;
    tracing::info!(directory = %root.display(), "Scanning import directory");

    let mut scan = Scan::default();
    let fail = |scan: &mut Scan, err: StoreError, progress: Option<f32>| {
        tracing::warn!(code = %err.code(), error = %err, "Import item failed");
        events.error_at(&err, progress);
        scan.failures += 1;
    };

    let discovered = discover_images(&root, &config.image_extensions);
    for err in discovered.errors {
        fail(&mut scan, err, None);
    }

    let prefix_path = root.join(&config.prefix_file);
    if prefix_path.is_file() {
        match caption::read_captions(&prefix_path) {
            Ok(parsed) => {
                scan.dataset.prefix_captions.extend(parsed.tags);
                for err in parsed.errors {
                    fail(&mut scan, err, None);
                }
            }
            Err(err) => fail(&mut scan, err, None),
        }
    }

    let total = discovered.images.len();
    for (index, path) in discovered.images.iter().enumerate() {
        let progress = (index + 1) as f32 / total as f32;

        let Some(name) = image_name(&root, path) else {
            fail(
                &mut scan,
                StoreError::File {
                    path: path.clone(),
                    reason: "cannot derive an image name".to_string(),
                },
                Some(progress),
            );
            continue;
        };
        if scan.dataset.image_by_name(&name).is_some() {
            fail(
                &mut scan,
                StoreError::File {
                    path: path.clone(),
                    reason: format!("another image is already named '{}'", name),
                },
                Some(progress),
            );
            continue;
        }
        if let Err(reason) = check_image(path) {
            fail(
                &mut scan,
                StoreError::File {
                    path: path.clone(),
                    reason,
                },
                Some(progress),
            );
            continue;
        }

        let image = ImageId::from_path(path);
        scan.dataset.images.insert(
            image,
            DatasetImage {
                name: name.clone(),
                path: path.clone(),
            },
        );

        let caption_path = path.with_extension(&config.caption_extension);
        if caption_path.is_file() {
            match caption::read_captions(&caption_path) {
                Ok(parsed) => {
                    for text in parsed.tags {
                        let tag = TagId::from_text(&text);
                        scan.dataset.tags.insert(tag, text);
                        scan.dataset.assignments.insert(Assignment { image, tag });
                    }
                    for err in parsed.errors {
                        fail(&mut scan, err, Some(progress));
                    }
                }
                Err(err) => fail(&mut scan, err, Some(progress)),
            }
        }

        events.progress(format!("Imported {}", name), progress);
    }

    tracing::info!(
        directory = %root.display(),
        images = scan.dataset.images.len(),
        tags = scan.dataset.tags.len(),
        failures = scan.failures,
        "Scan complete"
    );
    Ok(scan)
}

/// Scans every directory and merges the results left to right, so the first
/// directory's identities win. Fails with [`StoreError::Import`] if any item failed.
pub fn load_directories(
    directories: &[PathBuf],
    config: &ImportConfig,
    events: &EventBus,
) -> Result<Dataset> {
    let mut failures = 0;
    let mut merged: Option<Dataset> = None;

    for directory in directories {
        let scan = scan_directory(directory, config, events)?;
        failures += scan.failures;
        merged = Some(match merged {
            Some(acc) => merge(&acc, &scan.dataset),
            None => scan.dataset,
        });
    }

    if failures > 0 {
        return Err(StoreError::Import { failures });
    }
    Ok(merged.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::tempdir;

    fn write_image(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        image::RgbImage::new(2, 2).save(path).unwrap();
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scan_reads_captions_and_prefix() {
        let dir = tempdir().unwrap();
        write_image(&dir.path().join("a.png"));
        fs::write(dir.path().join("a.caption"), "cat\ncat\ndog\n").unwrap();
        write_image(&dir.path().join("sub/b.PNG"));
        fs::write(dir.path().join("sub/b.caption"), "dog,\n").unwrap();
        fs::write(dir.path().join("_prefix.txt"), "photo\n").unwrap();

        let events = EventBus::new(64);
        let scan = scan_directory(dir.path(), &ImportConfig::default(), &events).unwrap();
        assert_eq!(scan.failures, 0);

        let content = scan.dataset.content();
        assert_eq!(content.tags, set(&["cat", "dog"]));
        assert_eq!(content.images["a"], set(&["cat", "dog"]));
        assert_eq!(content.images["sub/b"], set(&["dog"]));
        assert_eq!(content.prefix_captions, set(&["photo"]));
        assert_eq!(
            scan.dataset.tag_by_text("dog"),
            Some(TagId::from_text("dog"))
        );
    }

    #[test]
    fn test_failures_are_collected() {
        let dir = tempdir().unwrap();
        write_image(&dir.path().join("good.png"));
        fs::write(dir.path().join("good.caption"), "ok\n'bad\n").unwrap();
        fs::write(dir.path().join("broken.png"), b"garbage").unwrap();

        let events = EventBus::new(64);
        let mut rx = events.subscribe();
        let scan = scan_directory(dir.path(), &ImportConfig::default(), &events).unwrap();
        assert_eq!(scan.failures, 2);
        assert_eq!(scan.dataset.images.len(), 1);

        let mut codes = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let Some(err) = event.as_error() {
                codes.push(err.code.clone());
            }
        }
        codes.sort();
        assert_eq!(codes, vec!["error-caption", "error-file"]);

        let err = load_directories(
            &[dir.path().to_path_buf()],
            &ImportConfig::default(),
            &events,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Import { failures: 2 }));
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let dir = tempdir().unwrap();
        let events = EventBus::new(4);
        let err = scan_directory(&dir.path().join("nope"), &ImportConfig::default(), &events)
            .unwrap_err();
        assert_eq!(err.code().as_str(), "error-io");
    }

    #[test]
    fn test_scan_merged_with_empty_keeps_content() {
        let dir = tempdir().unwrap();
        write_image(&dir.path().join("a.png"));
        fs::write(dir.path().join("a.caption"), "cat\n").unwrap();

        let events = EventBus::new(16);
        let scanned = scan_directory(dir.path(), &ImportConfig::default(), &events)
            .unwrap()
            .dataset;
        assert_eq!(merge(&scanned, &Dataset::default()), scanned);
    }
}
