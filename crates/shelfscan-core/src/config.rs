use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::file_import::default_extensions;

/// Root application configuration, loaded from `~/.config/shelfscan/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub comics: ComicsConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Suffixes recognized as books, matched case-insensitively in order.
    pub extensions: Vec<String>,
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComicsConfig {
    /// Archive entries with these suffixes count as pages.
    pub image_extensions: Vec<String>,
    /// Directory names whose entries are never pages.
    pub ignored_directories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub enabled: bool,
    /// Catalog sources queried in order: `google_books`, `open_library`.
    pub sources: Vec<String>,
    pub google_books_url: String,
    pub open_library_url: String,
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_api_key: Option<String>,
    /// Env var consulted when `google_api_key` is unset.
    pub google_api_key_env: String,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            recursive: true,
        }
    }
}

impl Default for ComicsConfig {
    fn default() -> Self {
        Self {
            image_extensions: [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ignored_directories: vec!["__MACOSX".to_string()],
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: vec!["google_books".to_string()],
            google_books_url: "https://www.googleapis.com/books/v1".to_string(),
            open_library_url: "https://openlibrary.org".to_string(),
            timeout_secs: 10,
            google_api_key: None,
            google_api_key_env: "SHELFSCAN_GOOGLE_API_KEY".to_string(),
        }
    }
}

impl CatalogConfig {
    /// API key from the config file, else from the configured env var.
    /// A blank key in either place counts as unset.
    pub fn resolve_google_api_key(&self) -> Option<String> {
        fn usable(key: &str) -> Option<String> {
            let key = key.trim();
            (!key.is_empty()).then(|| key.to_string())
        }

        self.google_api_key
            .as_deref()
            .and_then(usable)
            .or_else(|| std::env::var(&self.google_api_key_env).ok().as_deref().and_then(usable))
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl AppConfig {
    /// Standard config file path: `~/.config/shelfscan/config.toml`
    pub fn config_path() -> PathBuf {
        // Allow override via env var
        if let Ok(path) = std::env::var("SHELFSCAN_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("shelfscan")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }
}
