use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use mockito::{Matcher, Server};
use serde_json::json;
use shelfscan_core::{AppConfig, MetadataRecord};
use shelfscan_enrich::{ArchiveCapabilities, EnrichError, Pipeline};
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles>
</container>"#;

const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:opf="http://www.idpf.org/2007/opf">
    <dc:title>The Hobbit</dc:title>
    <dc:creator>J.R.R. Tolkien</dc:creator>
    <dc:publisher>Allen &amp; Unwin</dc:publisher>
    <dc:date>1937</dc:date>
    <dc:language>en</dc:language>
  </metadata>
</package>"#;

const COMIC_INFO: &str = r#"<?xml version="1.0"?>
<ComicInfo>
  <Title>Detective Comics</Title>
  <Series>Batman</Series>
  <Number>27</Number>
  <Year>1939</Year>
  <Writer>Bob Kane</Writer>
  <Publisher>DC Comics</Publisher>
  <PageCount>64</PageCount>
</ComicInfo>"#;

fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipWriter::new(File::create(&path).unwrap());
    for (entry, body) in entries {
        zip.start_file(*entry, SimpleFileOptions::default()).unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn config_for(catalog_url: Option<&str>) -> AppConfig {
    let mut config = AppConfig::default();
    config.catalog.google_api_key = None;
    config.catalog.google_api_key_env = "SHELFSCAN_TEST_UNSET_API_KEY".to_string();
    match catalog_url {
        Some(url) => config.catalog.google_books_url = url.to_string(),
        None => config.catalog.enabled = false,
    }
    config
}

#[tokio::test]
async fn epub_is_enriched_from_catalog_and_stable_across_runs() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/volumes")
        .match_query(Matcher::UrlEncoded(
            "q".to_string(),
            "intitle:\"The Hobbit\" inauthor:\"J.R.R. Tolkien\"".to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "totalItems": 1,
                "items": [{"volumeInfo": {
                    "title": "The Hobbit",
                    "authors": ["J.R.R. Tolkien"],
                    "publishedDate": "1937-09-21",
                    "publisher": "Houghton Mifflin",
                    "pageCount": 310,
                    "industryIdentifiers": [
                        {"type": "ISBN_13", "identifier": "9780618260300"}
                    ]
                }}]
            })
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let path = write_zip(
        dir.path(),
        "hobbit.epub",
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("OEBPS/content.opf", OPF.as_bytes()),
        ],
    );
    let pipeline =
        Pipeline::from_config(&config_for(Some(&server.url())), ArchiveCapabilities::detect())
            .unwrap();

    let (first, report) = pipeline.process(&path).await.unwrap().unwrap();
    let (second, _) = pipeline.process(&path).await.unwrap().unwrap();
    mock.assert_async().await;

    assert_eq!(first, second);
    assert_eq!(first.title.as_deref(), Some("The Hobbit"));
    assert_eq!(first.author.as_deref(), Some("J.R.R. Tolkien"));
    assert_eq!(first.publisher.as_deref(), Some("Houghton Mifflin"));
    assert_eq!(first.page_count, Some(310));
    assert_eq!(first.isbn.as_deref(), Some("9780618260300"));
    assert_eq!(first.language.as_deref(), Some("en"));
    assert_eq!(first.published_year, Some(1937));
    assert_eq!(first.file_format.as_deref(), Some("EPUB"));
    assert_eq!(report.sources_used, vec!["google_books"]);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn catalog_failure_keeps_local_layers() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/volumes")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let dir = TempDir::new().unwrap();
    let path = write_zip(
        dir.path(),
        "hobbit.epub",
        &[
            ("META-INF/container.xml", CONTAINER.as_bytes()),
            ("OEBPS/content.opf", OPF.as_bytes()),
        ],
    );
    let pipeline =
        Pipeline::from_config(&config_for(Some(&server.url())), ArchiveCapabilities::detect())
            .unwrap();

    let (record, report) = pipeline.process(&path).await.unwrap().unwrap();
    assert_eq!(record.publisher.as_deref(), Some("Allen & Unwin"));
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn offline_comic_uses_embedded_comic_info() {
    let dir = TempDir::new().unwrap();
    let path = write_zip(
        dir.path(),
        "Batman - Detective Comics 027.cbz",
        &[
            ("001.jpg", b"img"),
            ("002.jpg", b"img"),
            ("ComicInfo.xml", COMIC_INFO.as_bytes()),
        ],
    );
    let pipeline = Pipeline::from_config(&config_for(None), ArchiveCapabilities::detect()).unwrap();

    let (record, _) = pipeline.process(&path).await.unwrap().unwrap();
    assert_eq!(record.file_format.as_deref(), Some("CBZ"));
    assert_eq!(record.series.as_deref(), Some("Batman"));
    assert_eq!(record.title.as_deref(), Some("Detective Comics"));
    assert_eq!(record.author.as_deref(), Some("Bob Kane"));
    assert_eq!(record.issue_number, Some(27));
    assert_eq!(record.page_count, Some(64));
    assert_eq!(record.publisher.as_deref(), Some("DC Comics"));
}

#[tokio::test]
async fn offline_comic_without_metadata_falls_back_to_filename() {
    let dir = TempDir::new().unwrap();
    let path = write_zip(
        dir.path(),
        "Batman - Detective Comics 001.cbz",
        &[("001.jpg", b"img"), ("002.png", b"img")],
    );
    let pipeline = Pipeline::from_config(&config_for(None), ArchiveCapabilities::detect()).unwrap();

    let (record, _) = pipeline.process(&path).await.unwrap().unwrap();
    assert_eq!(record.series.as_deref(), Some("Batman"));
    assert_eq!(record.title.as_deref(), Some("Detective Comics"));
    assert_eq!(record.issue_number, Some(1));
    assert_eq!(record.author.as_deref(), Some("Batman #001"));
    assert_eq!(record.page_count, Some(2));
}

#[tokio::test]
async fn batch_reports_missing_and_unsupported_files() {
    let dir = TempDir::new().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, b"not a book").unwrap();
    let paths = vec![dir.path().join("gone.epub"), notes];
    let pipeline = Pipeline::from_config(&config_for(None), ArchiveCapabilities::detect()).unwrap();

    assert!(matches!(
        pipeline.process(&paths[0]).await,
        Err(EnrichError::NotFound(_))
    ));
    assert!(pipeline.process(&paths[1]).await.unwrap().is_none());

    let mut sink: Vec<(PathBuf, MetadataRecord)> = Vec::new();
    let summary = pipeline.process_batch(&paths, &mut sink).await;
    assert_eq!((summary.processed, summary.skipped, summary.failed), (0, 1, 1));
    assert!(sink.is_empty());
}
