use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub images: ImageConfig,

    #[serde(default)]
    pub events: EventConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,

    #[serde(default = "default_caption_extension")]
    pub caption_extension: String,

    /// Per-directory file whose lines become dataset-wide prefix captions.
    #[serde(default = "default_prefix_file")]
    pub prefix_file: String,
}

fn default_image_extensions() -> Vec<String> {
    vec!["png".to_string(), "jpg".to_string(), "jpeg".to_string()]
}

fn default_caption_extension() -> String {
    "caption".to_string()
}

fn default_prefix_file() -> String {
    "_prefix.txt".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
            caption_extension: default_caption_extension(),
            prefix_file: default_prefix_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Byte-copy image files next to the written caption files.
    #[serde(default = "default_copy_images")]
    pub copy_images: bool,
}

fn default_copy_images() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            copy_images: default_copy_images(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImageConfig {
    /// Copy added images into the library directory instead of referencing them in place.
    #[serde(default)]
    pub copy_on_add: bool,

    /// Where copied images live. Defaults to `<db stem>.images` beside the database.
    #[serde(default)]
    pub library_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Buffer size of the broadcast channel; slower subscribers lag instead of blocking.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("captionset")
        .join("dataset.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            import: ImportConfig::default(),
            export: ExportConfig::default(),
            images: ImageConfig::default(),
            events: EventConfig::default(),
        }
    }
}

impl Config {
    /// Configuration for a store at `db_path` with every other setting defaulted.
    pub fn for_store(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Default::default()
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Directory that receives copied images.
    pub fn library_dir(&self) -> PathBuf {
        self.images.library_dir.clone().unwrap_or_else(|| {
            let stem = self
                .db_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "dataset".to_string());
            self.db_path.with_file_name(format!("{}.images", stem))
        })
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("CAPTIONSET_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("captionset")
            .join("config.toml")
    }
}
