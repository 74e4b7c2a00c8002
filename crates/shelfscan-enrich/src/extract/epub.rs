use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;
use quick_xml::escape::unescape;
use regex::Regex;
use shelfscan_core::{MetadataRecord, non_empty, year_from_date};
use tracing::warn;
use zip::ZipArchive;

use crate::error::{EnrichError, Result};

static FULL_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"full-path\s*=\s*["']([^"']+)["']"#).expect("valid regex"));
static XML_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<[^>]+>").expect("valid regex"));
static SCHEME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:opf:)?scheme\s*=\s*["']([^"']*)["']"#).expect("valid regex")
});

const CONTAINER_PATH: &str = "META-INF/container.xml";
const ISBN_URN_PREFIX: &str = "urn:isbn:";

/// Reads Dublin Core metadata from the OPF package of an EPUB.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubMetadataExtractor;

impl EpubMetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Embedded layer for `path`. Failures are logged and give an empty record.
    pub fn extract(&self, path: &Path) -> MetadataRecord {
        match read_package(path) {
            Ok(opf_xml) => parse_opf(&opf_xml),
            Err(err) => {
                warn!(path = %path.display(), "could not read EPUB metadata: {err}");
                MetadataRecord::default()
            }
        }
    }
}

fn read_package(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| EnrichError::ContainerRead(path.display().to_string(), e.to_string()))?;

    let from_container = match read_zip_entry_to_string(&mut archive, CONTAINER_PATH) {
        Ok(container_xml) => parse_container_full_path(&container_xml),
        Err(err) => {
            warn!(path = %path.display(), "{err}");
            None
        }
    };
    let opf_path = from_container
        .filter(|p| archive.index_for_name(p).is_some())
        .or_else(|| {
            archive
                .file_names()
                .find(|name| name.to_ascii_lowercase().ends_with(".opf"))
                .map(ToOwned::to_owned)
        })
        .ok_or_else(|| {
            EnrichError::ContainerRead(
                path.display().to_string(),
                "no OPF package in archive".to_string(),
            )
        })?;

    read_zip_entry_to_string(&mut archive, &opf_path)
}

fn parse_container_full_path(container_xml: &str) -> Option<String> {
    FULL_PATH_RE
        .captures(container_xml)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn read_zip_entry_to_string(archive: &mut ZipArchive<File>, name: &str) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| EnrichError::ContainerRead(name.to_string(), e.to_string()))?;
    let mut buffer = String::new();
    entry
        .read_to_string(&mut buffer)
        .map_err(|e| EnrichError::ContainerRead(name.to_string(), e.to_string()))?;
    Ok(buffer)
}

/// Map the `<metadata>` block of an OPF document. First occurrence wins.
pub fn parse_opf(opf_xml: &str) -> MetadataRecord {
    let isbn = capture_all_tags(opf_xml, "dc:identifier")
        .into_iter()
        .find_map(|(attrs, value)| isbn_from_identifier(&attrs, &value));

    MetadataRecord {
        title: capture_first_tag(opf_xml, "dc:title"),
        author: capture_first_tag(opf_xml, "dc:creator"),
        language: capture_first_tag(opf_xml, "dc:language"),
        publisher: capture_first_tag(opf_xml, "dc:publisher"),
        published_year: capture_first_tag(opf_xml, "dc:date").and_then(|d| year_from_date(&d)),
        isbn,
        ..Default::default()
    }
}

fn isbn_from_identifier(attrs: &str, value: &str) -> Option<String> {
    let scheme_is_isbn = SCHEME_RE
        .captures_iter(attrs)
        .filter_map(|caps| caps.get(1))
        .any(|m| m.as_str().to_ascii_lowercase().contains("isbn"));
    if scheme_is_isbn {
        return non_empty(value);
    }

    let prefix = value.get(..ISBN_URN_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(ISBN_URN_PREFIX) {
        return non_empty(&value[ISBN_URN_PREFIX.len()..]);
    }
    None
}

fn capture_first_tag(xml: &str, tag: &str) -> Option<String> {
    capture_all_tags(xml, tag).into_iter().next().map(|(_, text)| text)
}

/// `(attributes, text)` of every non-empty `<tag …>text</tag>` element.
fn capture_all_tags(xml: &str, tag: &str) -> Vec<(String, String)> {
    let pattern = format!(r"(?is)<{tag}\b([^>]*)>(.*?)</{tag}>");
    let Ok(re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    re.captures_iter(xml)
        .filter_map(|caps| {
            let attrs = caps.get(1).map_or("", |m| m.as_str()).to_string();
            let text = clean_text(caps.get(2)?.as_str())?;
            Some((attrs, text))
        })
        .collect()
}

fn clean_text(raw: &str) -> Option<String> {
    let stripped = XML_TAG_RE.replace_all(raw, "");
    let text = unescape(&stripped)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| stripped.to_string());
    non_empty(text)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>The Hobbit</dc:title>
    <dc:title>There and Back Again</dc:title>
    <dc:creator opf:role="aut">J.R.R. Tolkien</dc:creator>
    <dc:creator opf:role="ill">Alan Lee</dc:creator>
    <dc:language>en</dc:language>
    <dc:publisher>Allen &amp; Unwin</dc:publisher>
    <dc:date>1937-09-21</dc:date>
    <dc:identifier id="uuid" opf:scheme="UUID">a1b2c3</dc:identifier>
    <dc:identifier opf:scheme="ISBN">9780261102217</dc:identifier>
  </metadata>
</package>"#;

    fn write_epub(dir: &TempDir, name: &str, entries: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        for (entry, body) in entries {
            zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    #[test]
    fn reads_dublin_core_through_container() {
        let dir = TempDir::new().unwrap();
        let path = write_epub(
            &dir,
            "hobbit.epub",
            &[
                ("mimetype", "application/epub+zip"),
                (CONTAINER_PATH, CONTAINER),
                ("OEBPS/content.opf", OPF),
            ],
        );

        let record = EpubMetadataExtractor::new().extract(&path);
        assert_eq!(record.title.as_deref(), Some("The Hobbit"));
        assert_eq!(record.author.as_deref(), Some("J.R.R. Tolkien"));
        assert_eq!(record.language.as_deref(), Some("en"));
        assert_eq!(record.publisher.as_deref(), Some("Allen & Unwin"));
        assert_eq!(record.published_year, Some(1937));
        assert_eq!(record.isbn.as_deref(), Some("9780261102217"));
        assert_eq!(record.file_format, None);
    }

    #[test]
    fn falls_back_to_first_opf_entry() {
        let dir = TempDir::new().unwrap();
        let path = write_epub(&dir, "no-container.epub", &[("book/package.opf", OPF)]);

        let record = EpubMetadataExtractor::new().extract(&path);
        assert_eq!(record.title.as_deref(), Some("The Hobbit"));
    }

    #[test]
    fn urn_isbn_identifier_is_recognized() {
        let opf = r#"<metadata>
            <dc:identifier id="bookid">urn:uuid:1234</dc:identifier>
            <dc:identifier>urn:isbn:0-441-17271-7</dc:identifier>
        </metadata>"#;
        assert_eq!(parse_opf(opf).isbn.as_deref(), Some("0-441-17271-7"));
    }

    #[test]
    fn short_date_drops_year() {
        let opf = "<metadata><dc:title>Odd</dc:title><dc:date>19</dc:date></metadata>";
        let record = parse_opf(opf);
        assert_eq!(record.title.as_deref(), Some("Odd"));
        assert_eq!(record.published_year, None);
    }

    #[test]
    fn not_a_zip_gives_empty_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.epub");
        std::fs::write(&path, b"definitely not a zip").unwrap();

        assert!(EpubMetadataExtractor::new().extract(&path).is_empty());
    }

    #[test]
    fn missing_package_gives_empty_record() {
        let dir = TempDir::new().unwrap();
        let path = write_epub(&dir, "empty.epub", &[("mimetype", "application/epub+zip")]);

        assert!(EpubMetadataExtractor::new().extract(&path).is_empty());
    }
}
