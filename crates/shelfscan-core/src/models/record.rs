use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Canonical, format-agnostic bibliographic record.
///
/// Every field is optional. The same type carries both partial layers
/// (filename, embedded, catalog) and the merged result; `None` means the
/// source did not produce the field, which is different from an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl MetadataRecord {
    /// The seed layer of a pipeline run: only format tag and source path.
    pub fn base(file_format: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            file_format: non_empty(file_format.into()),
            path: non_empty(path.into()),
            ..Default::default()
        }
    }

    /// True when the record carries no field at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Known title, ignoring empty strings.
    pub fn known_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Known author, ignoring empty strings.
    pub fn known_author(&self) -> Option<&str> {
        self.author.as_deref().filter(|v| !v.trim().is_empty())
    }

    pub fn has_title_or_author(&self) -> bool {
        self.known_title().is_some() || self.known_author().is_some()
    }
}

/// `Some(trimmed)` when the value has visible content.
pub fn non_empty(value: impl AsRef<str>) -> Option<String> {
    let trimmed = value.as_ref().trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a base-10 integer field; anything unparsable is absent.
pub fn parse_number<T: FromStr>(value: &str) -> Option<T> {
    value.trim().parse::<T>().ok()
}

/// Year from the first four characters of a date string (`2017-06-12` → 2017).
pub fn year_from_date(value: &str) -> Option<i32> {
    let prefix: String = value.trim().chars().take(4).collect();
    if prefix.chars().count() < 4 {
        return None;
    }
    prefix.parse::<i32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_record() {
        let record = MetadataRecord::base("EPUB", "/books/a.epub");
        assert_eq!(record.file_format.as_deref(), Some("EPUB"));
        assert_eq!(record.path.as_deref(), Some("/books/a.epub"));
        assert!(record.title.is_none());
        assert!(!record.is_empty());
    }

    #[test]
    fn test_known_fields_ignore_blank_values() {
        let record = MetadataRecord {
            title: Some("  ".to_string()),
            author: Some("Frank Herbert".to_string()),
            ..Default::default()
        };
        assert_eq!(record.known_title(), None);
        assert_eq!(record.known_author(), Some("Frank Herbert"));
        assert!(record.has_title_or_author());
        assert!(!MetadataRecord::default().has_title_or_author());
    }

    #[test]
    fn test_year_from_date() {
        assert_eq!(year_from_date("2017-06-12"), Some(2017));
        assert_eq!(year_from_date("1963"), Some(1963));
        assert_eq!(year_from_date("c. 1900"), None);
        assert_eq!(year_from_date("19"), None);
        assert_eq!(year_from_date(""), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number::<u32>(" 001 "), Some(1));
        assert_eq!(parse_number::<u32>("1.5"), None);
        assert_eq!(parse_number::<i32>("abc"), None);
    }

    #[test]
    fn test_json_skips_absent_fields() {
        let record = MetadataRecord {
            title: Some("Dune".to_string()),
            published_year: Some(1965),
            ..Default::default()
        };
        let json = serde_json::to_string_pretty(&record).unwrap();
        assert!(json.contains("\"published_year\": 1965"));
        assert!(!json.contains("author"));
    }
}
