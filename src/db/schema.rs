/// Bumped whenever `SCHEMA` changes shape; stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

pub const SCHEMA: &str = r#"
-- Images: one row per dataset image
CREATE TABLE IF NOT EXISTS images (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    path TEXT NOT NULL,
    source_uri TEXT,
    added_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);

-- Categories: named tag groups, optionally required on every image
CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    required INTEGER NOT NULL DEFAULT 0
);

-- Tags (captions)
CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    text TEXT NOT NULL UNIQUE,
    category_id TEXT,
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE INDEX IF NOT EXISTS idx_tags_category ON tags(category_id);

-- Image to tag assignments. No cascades: commands snapshot and delete
-- assignments explicitly so the deletion can be undone.
CREATE TABLE IF NOT EXISTS assignments (
    image_id TEXT NOT NULL,
    tag_id TEXT NOT NULL,
    PRIMARY KEY (image_id, tag_id),
    FOREIGN KEY (image_id) REFERENCES images(id),
    FOREIGN KEY (tag_id) REFERENCES tags(id)
);

CREATE INDEX IF NOT EXISTS idx_assignments_tag ON assignments(tag_id);

-- Dataset-wide captions written ahead of every exported caption file
CREATE TABLE IF NOT EXISTS prefix_captions (
    text TEXT PRIMARY KEY
);

-- Undo/redo history. Rows with undone = 0 form the undo stack (top = highest
-- seq), rows with undone = 1 form the redo stack (top = lowest seq).
CREATE TABLE IF NOT EXISTS command_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    forward TEXT NOT NULL,      -- JSON command
    inverse TEXT NOT NULL,      -- JSON command undoing `forward`
    description TEXT NOT NULL,
    undone INTEGER NOT NULL DEFAULT 0,
    applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;
