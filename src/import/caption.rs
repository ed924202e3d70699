//! Caption file parsing.
//!
//! One tag per line. Commas are stripped and surrounding whitespace trimmed;
//! blank lines are skipped. The result is de-duplicated and sorted.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::StoreError;
use crate::model::validate_tag_text;

/// Tags parsed from one caption file, with per-line failures kept aside.
#[derive(Debug, Default)]
pub struct Parsed {
    pub tags: BTreeSet<String>,
    pub errors: Vec<StoreError>,
}

pub fn parse_captions(file: &Path, content: &str) -> Parsed {
    let mut parsed = Parsed::default();

    for (index, raw) in content.lines().enumerate() {
        let text = raw.replace(',', "");
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        match validate_tag_text(text) {
            Ok(()) => {
                parsed.tags.insert(text.to_string());
            }
            Err(StoreError::InvalidTagText { reason, .. }) => {
                parsed.errors.push(StoreError::Caption {
                    file: file.to_path_buf(),
                    line: index + 1,
                    text: text.to_string(),
                    reason,
                });
            }
            Err(other) => parsed.errors.push(other),
        }
    }

    parsed
}

pub fn read_captions(file: &Path) -> Result<Parsed, StoreError> {
    let content = std::fs::read_to_string(file).map_err(|e| StoreError::File {
        path: file.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(parse_captions(file, &content))
}
