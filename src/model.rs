//! Core dataset entities and identifier types.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::error::StoreError;

/// Namespace for content-addressed tag IDs.
const TAG_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_3a8e_52d4_4b0a_9e1c_7d2f_0b84_a511);
/// Namespace for path-derived image IDs.
const IMAGE_NAMESPACE: Uuid = Uuid::from_u128(0x2b9e_71c4_0f3a_4e6d_8a57_c1d0_94e3_2f68);

/// Declares an opaque UUID-backed identifier stored as TEXT.
macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// A freshly generated random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0.to_string()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                let text = value.as_str()?;
                Uuid::parse_str(text)
                    .map($name)
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

id_type!(ImageId);
id_type!(TagId);
id_type!(CategoryId);

impl TagId {
    /// Deterministic ID derived from tag text, so identical text always maps to
    /// the same tag across images and imports.
    pub fn from_text(text: &str) -> Self {
        TagId(Uuid::new_v5(&TAG_NAMESPACE, text.as_bytes()))
    }
}

impl ImageId {
    /// Deterministic ID derived from an image file's absolute path.
    pub fn from_path(path: &std::path::Path) -> Self {
        ImageId(Uuid::new_v5(
            &IMAGE_NAMESPACE,
            path.to_string_lossy().as_bytes(),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub name: String,
    pub path: PathBuf,
    pub source_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub text: String,
    pub category: Option<CategoryId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub required: bool,
}

/// One (image, tag) pair of the many-to-many relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Assignment {
    pub image: ImageId,
    pub tag: TagId,
}

/// Request payload for adding an image.
#[derive(Debug, Clone, Default)]
pub struct NewImage {
    pub path: PathBuf,
    /// Defaults to the file stem.
    pub name: Option<String>,
    pub source_uri: Option<String>,
}

impl NewImage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_source(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }
}

/// Checks tag text against the caption grammar.
///
/// Allowed: letters, digits, `'`, `_`, `-` and single spaces between words.
/// The text may not start with a quote character.
pub fn validate_tag_text(text: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| StoreError::InvalidTagText {
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let first = text.chars().next().ok_or_else(|| invalid("empty"))?;
    if first == '\'' || first == '"' {
        return Err(invalid("starts with a quote"));
    }
    if text.trim() != text {
        return Err(invalid("leading or trailing whitespace"));
    }
    if text.contains("  ") {
        return Err(invalid("repeated spaces"));
    }
    if let Some(c) = text
        .chars()
        .find(|c| !(c.is_alphanumeric() || matches!(c, '\'' | '_' | '-' | ' ')))
    {
        return Err(invalid(&format!("character '{}' is not allowed", c)));
    }
    Ok(())
}

/// Trims and checks a category or image name.
pub fn normalize_name(kind: &'static str, name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Location of an image name relative to a dataset root, or `None` if the
/// name is absolute or has `.`/`..` segments.
pub fn image_name_path(name: &str) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            _ => return None,
        }
    }
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

/// Trims an image name and checks that it stays below a dataset root.
pub fn normalize_image_name(name: &str) -> Result<String, StoreError> {
    let trimmed = normalize_name("image", name)?;
    if image_name_path(&trimmed).is_none() {
        return Err(StoreError::InvalidName {
            kind: "image",
            name: name.to_string(),
        });
    }
    Ok(trimmed)
}
