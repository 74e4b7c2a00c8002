use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use shelfscan_core::{MetadataRecord, non_empty};

use crate::error::{EnrichError, Result};
use crate::http::CatalogHttpClient;
use crate::sources::CatalogSource;

const BASE_URL: &str = "https://openlibrary.org";

/// Map one `search.json` doc into a catalog layer.
pub fn record_from_search_doc(v: &Value) -> MetadataRecord {
    let first_str = |key: &str| {
        v.get(key)
            .and_then(Value::as_array)
            .and_then(|arr| arr.iter().filter_map(Value::as_str).find_map(non_empty))
    };

    let author = v
        .get("author_name")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .filter(|name| !name.trim().is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .and_then(non_empty);

    MetadataRecord {
        title: v.get("title").and_then(Value::as_str).and_then(non_empty),
        author,
        published_year: v
            .get("first_publish_year")
            .and_then(Value::as_i64)
            .and_then(|year| i32::try_from(year).ok()),
        publisher: first_str("publisher"),
        page_count: v
            .get("number_of_pages_median")
            .and_then(Value::as_u64)
            .and_then(|pages| u32::try_from(pages).ok())
            .filter(|pages| *pages > 0),
        language: first_str("language"),
        isbn: first_str("isbn"),
        ..Default::default()
    }
}

/// Open Library `search.json` lookup by title and author.
pub struct OpenLibrarySource {
    client: CatalogHttpClient,
    base_url: String,
}

impl OpenLibrarySource {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: CatalogHttpClient::new(timeout, Duration::from_millis(500))?,
            base_url: base_url.to_string(),
        })
    }

    fn search_url(&self, title: Option<&str>, author: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            EnrichError::MetadataParse(format!("invalid URL {}: {e}", self.base_url))
        })?;
        {
            let mut segs = url.path_segments_mut().map_err(|_| {
                EnrichError::MetadataParse("invalid Open Library base URL".to_string())
            })?;
            segs.pop_if_empty();
            segs.push("search.json");
        }
        {
            let mut query = url.query_pairs_mut();
            if let Some(title) = title {
                query.append_pair("title", title);
            }
            if let Some(author) = author {
                query.append_pair("author", author);
            }
            query.append_pair("limit", "1");
        }
        Ok(url)
    }
}

#[async_trait]
impl CatalogSource for OpenLibrarySource {
    fn name(&self) -> &'static str {
        "open_library"
    }

    async fn search(&self, title: Option<&str>, author: Option<&str>) -> Result<MetadataRecord> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let author = author.map(str::trim).filter(|a| !a.is_empty());
        if title.is_none() && author.is_none() {
            return Ok(MetadataRecord::default());
        }

        let url = self.search_url(title, author)?;
        let json: Value = self.client.get_json(url.as_str()).await?;

        Ok(json
            .get("docs")
            .and_then(Value::as_array)
            .and_then(|docs| docs.first())
            .map(record_from_search_doc)
            .unwrap_or_default())
    }
}
