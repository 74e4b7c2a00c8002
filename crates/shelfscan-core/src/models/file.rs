use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// An input file resolved to an absolute path, with its lowercase extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    path: PathBuf,
    extension: String,
}

impl FileHandle {
    /// Resolve `path` against the filesystem. Fails when the file does not exist.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CoreError::FileNotFound(path.display().to_string()));
        }
        let path = path.canonicalize()?;
        Ok(Self::from_path(path))
    }

    /// Build a handle without touching the filesystem.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        Self { path, extension }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercase extension including the leading dot, or empty.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// File name without its final extension.
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Upper-cased extension without the dot, e.g. `AZW3`.
    pub fn format_tag(&self) -> String {
        self.extension.trim_start_matches('.').to_uppercase()
    }
}

/// Which extractor a file is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    Epub,
    ComicZip,
    ComicRar,
    Generic,
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Epub => "epub",
            Self::ComicZip => "comic_zip",
            Self::ComicRar => "comic_rar",
            Self::Generic => "generic",
        };
        write!(f, "{s}")
    }
}

impl FormatKind {
    /// Map an already-matched extension (with or without the dot) to a kind.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "epub" => Self::Epub,
            "cbz" => Self::ComicZip,
            "cbr" => Self::ComicRar,
            _ => Self::Generic,
        }
    }

    pub fn is_comic(&self) -> bool {
        matches!(self, Self::ComicZip | Self::ComicRar)
    }

    /// Container tag for comic kinds.
    pub fn comic_tag(&self) -> Option<&'static str> {
        match self {
            Self::ComicZip => Some("CBZ"),
            Self::ComicRar => Some("CBR"),
            _ => None,
        }
    }
}
