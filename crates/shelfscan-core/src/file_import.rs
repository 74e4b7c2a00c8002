use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::filename::FilenameParser;
use crate::models::{FileHandle, FormatKind};

/// Recognized book and comic suffixes, in match order.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".epub", ".pdf", ".mobi", ".lrf", ".azw", ".azw3", ".cbr", ".cbz",
];

pub fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

/// Classify a file name by case-insensitive suffix match against `allowed`.
///
/// Returns `None` when the name is not a recognized book or comic.
pub fn classify<S: AsRef<str>>(filename: &str, allowed: &[S]) -> Option<FormatKind> {
    let lower = filename.to_lowercase();
    allowed
        .iter()
        .map(|ext| ext.as_ref().to_lowercase())
        .find(|ext| !ext.is_empty() && lower.ends_with(ext.as_str()))
        .map(|ext| FormatKind::from_extension(&ext))
}

/// Check if a path looks like a book file.
pub fn is_book_file<S: AsRef<str>>(path: &Path, allowed: &[S]) -> bool {
    path.file_name()
        .map(|name| classify(&name.to_string_lossy(), allowed).is_some())
        .unwrap_or(false)
}

/// Collect book files under `dir`, sorted by path.
pub fn scan_directory<S: AsRef<str>>(
    dir: &Path,
    recursive: bool,
    allowed: &[S],
) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(CoreError::DirectoryNotFound(dir.display().to_string()));
    }

    let mut found = Vec::new();
    collect_books(dir, recursive, allowed, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_books<S: AsRef<str>>(
    dir: &Path,
    recursive: bool,
    allowed: &[S],
    found: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        let path = entry.path();

        if path.is_dir() {
            if recursive && let Err(e) = collect_books(&path, true, allowed, found) {
                warn!("skipping {}: {e}", path.display());
            }
        } else if path.is_file() && is_book_file(&path, allowed) {
            found.push(path);
        }
    }
    Ok(())
}

/// Shape of a collection, derived from file names alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionStats {
    pub total: usize,
    pub authors: BTreeSet<String>,
    pub formats: BTreeMap<String, usize>,
}

/// Summarize a set of book paths: distinct filename authors and extension counts.
pub fn analyze_collection<S: AsRef<str>>(
    paths: &[PathBuf],
    allowed: &[S],
    parser: &FilenameParser,
) -> CollectionStats {
    let mut stats = CollectionStats::default();

    for path in paths {
        let handle = FileHandle::from_path(path.clone());
        let Some(kind) = classify(&handle.file_name(), allowed) else {
            continue;
        };
        stats.total += 1;
        *stats
            .formats
            .entry(handle.extension().to_string())
            .or_insert(0) += 1;

        let parsed = parser.parse(&handle.base_name(), kind.is_comic());
        if let Some(author) = parsed.known_author() {
            stats.authors.insert(author.to_string());
        }
    }

    stats
}
