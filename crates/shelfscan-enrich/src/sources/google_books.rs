use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shelfscan_core::{MetadataRecord, non_empty, year_from_date};

use crate::error::Result;
use crate::http::CatalogHttpClient;
use crate::sources::CatalogSource;

const BASE_URL: &str = "https://www.googleapis.com/books/v1";

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct VolumesResponse {
    total_items: u32,
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct Volume {
    volume_info: VolumeInfo,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    authors: Vec<String>,
    published_date: Option<String>,
    publisher: Option<String>,
    page_count: Option<u32>,
    language: Option<String>,
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

impl VolumeInfo {
    fn into_record(self) -> MetadataRecord {
        let author = if self.authors.is_empty() {
            None
        } else {
            non_empty(self.authors.join(", "))
        };
        let isbn = self
            .industry_identifiers
            .into_iter()
            .find(|id| id.kind == "ISBN_13" || id.kind == "ISBN_10")
            .and_then(|id| non_empty(id.identifier));

        MetadataRecord {
            title: self.title.and_then(non_empty),
            author,
            published_year: self.published_date.as_deref().and_then(year_from_date),
            publisher: self.publisher.and_then(non_empty),
            page_count: self.page_count.filter(|pages| *pages > 0),
            language: self.language.and_then(non_empty),
            isbn,
            ..Default::default()
        }
    }
}

fn query_terms(title: Option<&str>, author: Option<&str>) -> Vec<String> {
    [("intitle", title), ("inauthor", author)]
        .into_iter()
        .filter_map(|(field, value)| {
            let value = value?.trim();
            (!value.is_empty()).then(|| format!("{field}:\"{value}\""))
        })
        .collect()
}

/// Quoted field search: `intitle:"…"+inauthor:"…"`. `None` without any term.
pub fn build_query(title: Option<&str>, author: Option<&str>) -> Option<String> {
    let terms = query_terms(title, author);
    (!terms.is_empty()).then(|| terms.join("+"))
}

/// Google Books volumes search.
pub struct GoogleBooksSource {
    client: CatalogHttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksSource {
    pub fn new(timeout: Duration, api_key: Option<String>) -> Result<Self> {
        Self::with_base_url(BASE_URL, timeout, api_key)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration, api_key: Option<String>) -> Result<Self> {
        Ok(Self {
            client: CatalogHttpClient::new(timeout, Duration::from_millis(100))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn search_url(&self, terms: &[String]) -> String {
        // Terms are encoded one by one so the `+` joiner stays literal.
        let q = terms
            .iter()
            .map(|term| urlencoding::encode(term).into_owned())
            .collect::<Vec<_>>()
            .join("+");
        let mut url = format!("{}/volumes?q={q}", self.base_url);
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }
}

#[async_trait]
impl CatalogSource for GoogleBooksSource {
    fn name(&self) -> &'static str {
        "google_books"
    }

    async fn search(&self, title: Option<&str>, author: Option<&str>) -> Result<MetadataRecord> {
        let terms = query_terms(title, author);
        if terms.is_empty() {
            return Ok(MetadataRecord::default());
        }

        let response: VolumesResponse = self.client.get_json(&self.search_url(&terms)).await?;
        if response.total_items == 0 {
            return Ok(MetadataRecord::default());
        }
        Ok(response
            .items
            .into_iter()
            .next()
            .map(|volume| volume.volume_info.into_record())
            .unwrap_or_default())
    }
}
