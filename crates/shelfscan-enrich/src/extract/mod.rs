use std::path::Path;

use shelfscan_core::{ComicsConfig, FormatKind, MetadataRecord};

pub mod comic;
pub mod comic_info;
pub mod epub;

pub use comic::{ArchiveBackend, ArchiveScan, ComicArchiveExtractor, EntryFilter, ZipBackend};
pub use comic_info::{COMIC_INFO_ENTRY, parse_comic_info};
pub use epub::{EpubMetadataExtractor, parse_opf};

#[cfg(feature = "rar")]
pub use comic::RarBackend;

/// Optional archive backends available to this build, resolved once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveCapabilities {
    pub rar: bool,
}

impl ArchiveCapabilities {
    pub fn detect() -> Self {
        Self {
            rar: cfg!(feature = "rar"),
        }
    }
}

/// Embedded-metadata layer for one classified file.
pub trait FormatExtractor: Send + Sync {
    fn extract(&self, path: &Path, kind: FormatKind) -> MetadataRecord;
}

/// EPUB packages and comic archives; other formats carry no embedded layer.
pub struct DefaultFormatExtractor {
    epub: EpubMetadataExtractor,
    comic: ComicArchiveExtractor,
}

impl DefaultFormatExtractor {
    pub fn new(capabilities: ArchiveCapabilities, comics: &ComicsConfig) -> Self {
        Self {
            epub: EpubMetadataExtractor::new(),
            comic: ComicArchiveExtractor::new(capabilities, comics),
        }
    }
}

impl FormatExtractor for DefaultFormatExtractor {
    fn extract(&self, path: &Path, kind: FormatKind) -> MetadataRecord {
        match kind {
            FormatKind::Epub => self.epub.extract(path),
            FormatKind::ComicZip | FormatKind::ComicRar => self.comic.extract(path, kind),
            FormatKind::Generic => MetadataRecord::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_follows_build_features() {
        assert_eq!(ArchiveCapabilities::detect().rar, cfg!(feature = "rar"));
    }

    #[test]
    fn generic_formats_have_no_embedded_layer() {
        let extractor =
            DefaultFormatExtractor::new(ArchiveCapabilities::default(), &ComicsConfig::default());
        let record = extractor.extract(Path::new("/nowhere/book.pdf"), FormatKind::Generic);
        assert!(record.is_empty());
    }
}
