use std::time::Duration;

use async_trait::async_trait;
use shelfscan_core::{CatalogConfig, MetadataRecord};
use tracing::{debug, warn};

use crate::enrichment::merge::MergeLayer;
use crate::error::Result;

pub mod google_books;
pub mod open_library;

pub use google_books::{GoogleBooksSource, build_query};
pub use open_library::OpenLibrarySource;

/// A remote book catalog searched by title and author.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Best match for the given terms as a partial record. An empty record
    /// means no match; errors are transport or decoding failures.
    async fn search(&self, title: Option<&str>, author: Option<&str>) -> Result<MetadataRecord>;
}

/// Result of asking every configured source.
#[derive(Debug, Clone, Default)]
pub struct CatalogLookup {
    pub record: MetadataRecord,
    pub sources_used: Vec<String>,
    pub errors: Vec<String>,
}

/// Queries the configured catalog sources in order and folds their answers.
///
/// Failures never escape: a source that errors contributes nothing.
pub struct CatalogClient {
    sources: Vec<Box<dyn CatalogSource>>,
}

impl CatalogClient {
    pub fn new(sources: Vec<Box<dyn CatalogSource>>) -> Self {
        Self { sources }
    }

    /// Build the sources named in `config.sources`; unknown names are skipped.
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let mut sources: Vec<Box<dyn CatalogSource>> = Vec::new();
        for name in &config.sources {
            match name.as_str() {
                "google_books" => sources.push(Box::new(GoogleBooksSource::with_base_url(
                    &config.google_books_url,
                    timeout,
                    config.resolve_google_api_key(),
                )?)),
                "open_library" => sources.push(Box::new(OpenLibrarySource::with_base_url(
                    &config.open_library_url,
                    timeout,
                )?)),
                other => warn!("unknown catalog source '{other}', skipping"),
            }
        }
        Ok(Self::new(sources))
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Catalog layer for `title`/`author` plus which sources answered or failed.
    /// The record is empty when nothing matched or every source failed.
    pub async fn lookup(&self, title: Option<&str>, author: Option<&str>) -> CatalogLookup {
        let mut outcome = CatalogLookup::default();
        let Some(query) = build_query(title, author) else {
            return outcome;
        };
        debug!(%query, "catalog lookup");

        for source in &self.sources {
            match source.search(title, author).await {
                Ok(layer) if layer.is_empty() => {
                    debug!(source = source.name(), "no catalog match");
                }
                Ok(layer) => {
                    outcome.record.apply_layer(layer);
                    outcome.sources_used.push(source.name().to_string());
                }
                Err(err) => {
                    warn!(source = source.name(), "catalog lookup failed: {err}");
                    outcome.errors.push(format!("{}: {err}", source.name()));
                }
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnrichError;

    struct Fixed(&'static str, MetadataRecord);

    #[async_trait]
    impl CatalogSource for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn search(&self, _: Option<&str>, _: Option<&str>) -> Result<MetadataRecord> {
            Ok(self.1.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl CatalogSource for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn search(&self, _: Option<&str>, _: Option<&str>) -> Result<MetadataRecord> {
            Err(EnrichError::ApiError("failing".to_string(), "HTTP 500".to_string()))
        }
    }

    #[tokio::test]
    async fn later_sources_overwrite_earlier_fields() {
        let client = CatalogClient::new(vec![
            Box::new(Fixed(
                "first",
                MetadataRecord {
                    title: Some("Dune".to_string()),
                    publisher: Some("Chilton".to_string()),
                    ..Default::default()
                },
            )),
            Box::new(Failing),
            Box::new(Fixed(
                "second",
                MetadataRecord {
                    publisher: Some("Ace".to_string()),
                    ..Default::default()
                },
            )),
        ]);

        let outcome = client.lookup(Some("Dune"), None).await;
        assert_eq!(outcome.record.title.as_deref(), Some("Dune"));
        assert_eq!(outcome.record.publisher.as_deref(), Some("Ace"));
        assert_eq!(outcome.sources_used, vec!["first", "second"]);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn no_terms_returns_empty() {
        let client = CatalogClient::new(vec![Box::new(Failing)]);
        let outcome = client.lookup(None, Some("")).await;
        assert!(outcome.record.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn from_config_skips_unknown_sources() {
        let config = CatalogConfig {
            sources: vec![
                "google_books".to_string(),
                "library_of_babel".to_string(),
                "open_library".to_string(),
            ],
            ..Default::default()
        };
        let client = CatalogClient::from_config(&config).unwrap();
        assert_eq!(client.sources.len(), 2);
    }
}
