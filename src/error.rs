//! Error types for the dataset store.
//!
//! Every failure carries a machine-readable [`ErrorCode`] plus a string-keyed
//! attribute map so that an error event can be rendered without reaching back
//! into store internals.

use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Machine-readable error codes published on the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Io,
    ImageFormat,
    Import,
    Caption,
    File,
    Generic,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Io => "error-io",
            ErrorCode::ImageFormat => "error-image-format",
            ErrorCode::Import => "error-import",
            ErrorCode::Caption => "error-caption",
            ErrorCode::File => "error-file",
            ErrorCode::Generic => "error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot decode image {}: {source}", path.display())]
    ImageFormat {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Import failed with {failures} error(s)")]
    Import { failures: usize },

    #[error("Invalid caption '{text}' in {} line {line}: {reason}", file.display())]
    Caption {
        file: PathBuf,
        line: usize,
        text: String,
        reason: String,
    },

    #[error("Cannot process {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },

    #[error("Invalid tag text '{text}': {reason}")]
    InvalidTagText { text: String, reason: String },

    #[error("Invalid {kind} name '{name}'")]
    InvalidName { kind: &'static str, name: String },

    #[error("{kind} '{name}' already exists")]
    Duplicate { kind: &'static str, name: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("Image '{image}' would be left without a tag from required category '{category}'")]
    RequiredCategory { image: String, category: String },

    #[error("Constraint violated: {constraint}")]
    Constraint { constraint: String, message: String },

    #[error("Inconsistent history: {0}")]
    InconsistentHistory(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Store is read-only")]
    ReadOnly,

    #[error("Store at {} is locked by another writer", path.display())]
    Locked { path: PathBuf },

    #[error("Store schema version {found} is newer than supported version {supported}")]
    SchemaVersion { found: i32, supported: i32 },

    #[error("Import requires an empty store")]
    NotFresh,

    #[error("Store is closed")]
    Closed,

    #[error("Command was abandoned before completion")]
    Cancelled,

    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound { kind, id: id.to_string() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Io { .. } => ErrorCode::Io,
            StoreError::ImageFormat { .. } => ErrorCode::ImageFormat,
            StoreError::Import { .. } => ErrorCode::Import,
            StoreError::Caption { .. } => ErrorCode::Caption,
            StoreError::File { .. } => ErrorCode::File,
            _ => ErrorCode::Generic,
        }
    }

    /// Structured context for diagnostics.
    pub fn attributes(&self) -> BTreeMap<String, String> {
        let mut attrs = BTreeMap::new();
        let mut put = |k: &str, v: String| {
            attrs.insert(k.to_string(), v);
        };
        match self {
            StoreError::Io { path, .. }
            | StoreError::ImageFormat { path, .. }
            | StoreError::File { path, .. }
            | StoreError::Locked { path } => put("path", path.display().to_string()),
            StoreError::Import { failures } => put("failures", failures.to_string()),
            StoreError::Caption { file, line, text, .. } => {
                put("file", file.display().to_string());
                put("line", line.to_string());
                put("text", text.clone());
            }
            StoreError::InvalidTagText { text, .. } => put("text", text.clone()),
            StoreError::InvalidName { kind, name } | StoreError::Duplicate { kind, name } => {
                put("kind", kind.to_string());
                put("name", name.clone());
            }
            StoreError::NotFound { kind, id } => {
                put("kind", kind.to_string());
                put("id", id.clone());
            }
            StoreError::RequiredCategory { image, category } => {
                put("image", image.clone());
                put("category", category.clone());
            }
            StoreError::Constraint { constraint, .. } => put("constraint", constraint.clone()),
            StoreError::SchemaVersion { found, supported } => {
                put("found", found.to_string());
                put("supported", supported.to_string());
            }
            _ => {}
        }
        attrs
    }

    /// Optional hint shown next to the error.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            StoreError::Io { .. } => Some("Check that the file exists and is readable"),
            StoreError::ImageFormat { .. } => Some("Use a valid PNG or JPEG file"),
            StoreError::Import { .. } => Some("Fix the reported files and run the import again"),
            StoreError::Caption { .. } | StoreError::InvalidTagText { .. } => Some(
                "Tags may contain letters, digits, apostrophes, underscores, hyphens and single inner spaces",
            ),
            StoreError::RequiredCategory { .. } => {
                Some("Assign another tag from the required category first")
            }
            StoreError::Locked { .. } => Some("Close the other process or open the store read-only"),
            StoreError::ReadOnly => Some("Reopen the store with write access"),
            StoreError::NotFresh => Some("Import into a new store file"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi, Some(message)) = &err {
            if ffi.code == rusqlite::ErrorCode::ConstraintViolation {
                return StoreError::Constraint {
                    constraint: constraint_identity(message),
                    message: message.clone(),
                };
            }
        }
        StoreError::Database(err)
    }
}

/// Extracts the violated constraint from an SQLite message such as
/// `UNIQUE constraint failed: tags.text`.
fn constraint_identity(message: &str) -> String {
    match message.split_once("constraint failed:") {
        Some((_, rest)) => rest.trim().to_string(),
        None if message.starts_with("FOREIGN KEY") => "FOREIGN KEY".to_string(),
        None => message.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
