use std::fs::File;
use std::io::Read;
use std::path::Path;

use shelfscan_core::{ComicsConfig, FormatKind, MetadataRecord};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::enrichment::merge::MergeLayer;
use crate::error::{EnrichError, Result};
use crate::extract::ArchiveCapabilities;
use crate::extract::comic_info::{COMIC_INFO_ENTRY, parse_comic_info};

/// Decides which archive entries count as pages.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    image_extensions: Vec<String>,
    ignored_directories: Vec<String>,
}

impl EntryFilter {
    pub fn from_config(config: &ComicsConfig) -> Self {
        Self {
            image_extensions: config
                .image_extensions
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            ignored_directories: config.ignored_directories.clone(),
        }
    }

    /// True for image files outside metadata-noise directories that are not
    /// resource forks.
    pub fn is_page(&self, entry_name: &str) -> bool {
        let mut components = entry_name
            .split(['/', '\\'])
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>();
        let Some(base) = components.pop() else {
            return false;
        };
        if base.starts_with("._") {
            return false;
        }
        if components
            .iter()
            .any(|dir| self.ignored_directories.iter().any(|ignored| ignored == dir))
        {
            return false;
        }
        let lower = base.to_lowercase();
        self.image_extensions.iter().any(|ext| lower.ends_with(ext))
    }
}

/// What a walk over an archive found so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveScan {
    pub image_entries: u32,
    pub comic_info: Option<Vec<u8>>,
}

impl ArchiveScan {
    fn visit(&mut self, filter: &EntryFilter, name: &str) {
        if filter.is_page(name) {
            self.image_entries += 1;
        }
    }
}

/// One archive container format.
pub trait ArchiveBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Walk every entry of `path`, filling `scan` as it goes. On error `scan`
    /// keeps whatever was gathered before the failure.
    fn scan(&self, path: &Path, filter: &EntryFilter, scan: &mut ArchiveScan) -> Result<()>;
}

pub struct ZipBackend;

impl ArchiveBackend for ZipBackend {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn scan(&self, path: &Path, filter: &EntryFilter, scan: &mut ArchiveScan) -> Result<()> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| EnrichError::ContainerRead(path.display().to_string(), e.to_string()))?;

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if name == COMIC_INFO_ENTRY && scan.comic_info.is_none() {
                let mut bytes = Vec::new();
                entry.read_to_end(&mut bytes)?;
                scan.comic_info = Some(bytes);
            }
            scan.visit(filter, &name);
        }
        Ok(())
    }
}

#[cfg(feature = "rar")]
pub struct RarBackend;

#[cfg(feature = "rar")]
impl ArchiveBackend for RarBackend {
    fn name(&self) -> &'static str {
        "rar"
    }

    fn scan(&self, path: &Path, filter: &EntryFilter, scan: &mut ArchiveScan) -> Result<()> {
        let container = |e: unrar::error::UnrarError| {
            EnrichError::ContainerRead(path.display().to_string(), e.to_string())
        };

        let mut archive = unrar::Archive::new(path)
            .open_for_processing()
            .map_err(container)?;
        while let Some(header) = archive.read_header().map_err(container)? {
            let entry = header.entry();
            let name = entry.filename.to_string_lossy().replace('\\', "/");
            let is_dir = entry.is_directory();

            archive = if !is_dir && name == COMIC_INFO_ENTRY && scan.comic_info.is_none() {
                let (bytes, rest) = header.read().map_err(container)?;
                scan.comic_info = Some(bytes);
                rest
            } else {
                header.skip().map_err(container)?
            };
            if !is_dir {
                scan.visit(filter, &name);
            }
        }
        Ok(())
    }
}

/// Page count and embedded `ComicInfo.xml` from CBZ/CBR archives.
pub struct ComicArchiveExtractor {
    #[cfg_attr(not(feature = "rar"), allow(dead_code))]
    capabilities: ArchiveCapabilities,
    filter: EntryFilter,
}

impl ComicArchiveExtractor {
    pub fn new(capabilities: ArchiveCapabilities, config: &ComicsConfig) -> Self {
        Self {
            capabilities,
            filter: EntryFilter::from_config(config),
        }
    }

    fn backend(&self, kind: FormatKind) -> Result<Box<dyn ArchiveBackend>> {
        match kind {
            FormatKind::ComicZip => Ok(Box::new(ZipBackend)),
            FormatKind::ComicRar => self.rar_backend(),
            other => Err(EnrichError::UnsupportedFormat(other.to_string())),
        }
    }

    #[cfg(feature = "rar")]
    fn rar_backend(&self) -> Result<Box<dyn ArchiveBackend>> {
        if self.capabilities.rar {
            Ok(Box::new(RarBackend))
        } else {
            Err(EnrichError::MissingCapability("rar".to_string()))
        }
    }

    #[cfg(not(feature = "rar"))]
    fn rar_backend(&self) -> Result<Box<dyn ArchiveBackend>> {
        Err(EnrichError::MissingCapability("rar".to_string()))
    }

    /// Embedded layer for a comic archive. `file_format` is always set;
    /// everything else degrades to what could be read.
    pub fn extract(&self, path: &Path, kind: FormatKind) -> MetadataRecord {
        let mut record = MetadataRecord {
            file_format: kind.comic_tag().map(ToOwned::to_owned),
            ..Default::default()
        };

        let backend = match self.backend(kind) {
            Ok(backend) => backend,
            Err(err) => {
                warn!(path = %path.display(), "skipping archive inspection: {err}");
                return record;
            }
        };

        let mut scan = ArchiveScan::default();
        if let Err(err) = backend.scan(path, &self.filter, &mut scan) {
            warn!(
                path = %path.display(),
                backend = backend.name(),
                "could not read comic archive: {err}"
            );
        }
        debug!(
            path = %path.display(),
            pages = scan.image_entries,
            comic_info = scan.comic_info.is_some(),
            "scanned comic archive"
        );

        if scan.image_entries > 0 {
            record.page_count = Some(scan.image_entries);
        }
        if let Some(bytes) = scan.comic_info {
            record.apply_layer(parse_comic_info(&bytes));
        }
        record
    }
}
