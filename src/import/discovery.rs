use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::StoreError;

/// Image files found under a directory, plus entries that could not be read.
#[derive(Debug, Default)]
pub struct Discovered {
    pub images: Vec<PathBuf>,
    pub errors: Vec<StoreError>,
}

/// Recursively finds files whose extension matches one of `extensions`,
/// case-insensitively.
pub fn discover_images(directory: &Path, extensions: &[String]) -> Discovered {
    let mut found = Discovered::default();

    for entry in WalkDir::new(directory).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| directory.to_path_buf());
                found.errors.push(StoreError::File {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let path = entry.path();

        if entry.file_type().is_file() {
            if let Some(ext) = path.extension() {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                    found.images.push(path.to_path_buf());
                }
            }
        }
    }

    // Sort by path for consistent ordering
    found.images.sort();

    found
}
