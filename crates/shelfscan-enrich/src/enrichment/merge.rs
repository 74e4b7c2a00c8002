use shelfscan_core::MetadataRecord;

/// Where a layer came from. Declaration order is application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataSource {
    Filename,
    Embedded,
    Catalog,
}

impl MetadataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filename => "filename",
            Self::Embedded => "embedded",
            Self::Catalog => "catalog",
        }
    }
}

/// Overlay one partial record onto another.
pub trait MergeLayer {
    /// Copy every present, non-empty field of `layer` over `self` and return
    /// the names of the fields that changed. `file_format` is only filled,
    /// never replaced.
    fn apply_layer(&mut self, layer: MetadataRecord) -> Vec<&'static str>;
}

fn overlay_text(
    target: &mut Option<String>,
    value: Option<String>,
    name: &'static str,
    updated: &mut Vec<&'static str>,
) {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return;
    };
    if target.as_deref() != Some(value.as_str()) {
        *target = Some(value);
        updated.push(name);
    }
}

fn overlay_number<T: PartialEq>(
    target: &mut Option<T>,
    value: Option<T>,
    name: &'static str,
    updated: &mut Vec<&'static str>,
) {
    let Some(value) = value else {
        return;
    };
    if target.as_ref() != Some(&value) {
        *target = Some(value);
        updated.push(name);
    }
}

impl MergeLayer for MetadataRecord {
    fn apply_layer(&mut self, layer: MetadataRecord) -> Vec<&'static str> {
        let mut updated = Vec::new();

        overlay_text(&mut self.title, layer.title, "title", &mut updated);
        overlay_text(&mut self.author, layer.author, "author", &mut updated);
        overlay_text(&mut self.series, layer.series, "series", &mut updated);
        overlay_number(&mut self.issue_number, layer.issue_number, "issue_number", &mut updated);
        overlay_text(&mut self.isbn, layer.isbn, "isbn", &mut updated);
        overlay_number(
            &mut self.published_year,
            layer.published_year,
            "published_year",
            &mut updated,
        );
        overlay_text(&mut self.publisher, layer.publisher, "publisher", &mut updated);
        overlay_number(&mut self.page_count, layer.page_count, "page_count", &mut updated);
        overlay_text(&mut self.language, layer.language, "language", &mut updated);
        overlay_text(&mut self.genre, layer.genre, "genre", &mut updated);
        overlay_text(&mut self.summary, layer.summary, "summary", &mut updated);
        overlay_text(&mut self.path, layer.path, "path", &mut updated);

        if self.file_format.as_deref().is_none_or(|f| f.trim().is_empty()) {
            overlay_text(&mut self.file_format, layer.file_format, "file_format", &mut updated);
        }

        updated
    }
}

/// Fold the four pipeline layers in fixed order: base, filename, embedded
/// format metadata, external catalog. Catalog values win for every field the
/// catalog produced.
pub fn merge(
    base: MetadataRecord,
    filename: MetadataRecord,
    format: MetadataRecord,
    external: MetadataRecord,
) -> MetadataRecord {
    let mut merged = base;
    for layer in [filename, format, external] {
        merged.apply_layer(layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author(value: &str) -> MetadataRecord {
        MetadataRecord {
            author: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn external_layer_wins() {
        let merged = merge(
            MetadataRecord::base("EPUB", "/b/x.epub"),
            author("X"),
            author("Y"),
            author("Z"),
        );
        assert_eq!(merged.author.as_deref(), Some("Z"));
    }

    #[test]
    fn absent_and_empty_values_never_erase() {
        let filename = MetadataRecord {
            title: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            ..Default::default()
        };
        let format = MetadataRecord {
            title: Some("".to_string()),
            published_year: Some(1965),
            ..Default::default()
        };
        let merged = merge(
            MetadataRecord::base("EPUB", "/b/x.epub"),
            filename,
            format,
            MetadataRecord::default(),
        );
        assert_eq!(merged.title.as_deref(), Some("Dune"));
        assert_eq!(merged.author.as_deref(), Some("Frank Herbert"));
        assert_eq!(merged.published_year, Some(1965));
        assert_eq!(merged.path.as_deref(), Some("/b/x.epub"));
    }

    #[test]
    fn file_format_is_never_overwritten() {
        let format = MetadataRecord {
            file_format: Some("CBR".to_string()),
            ..Default::default()
        };
        let merged = merge(
            MetadataRecord::base("CBZ", "/c/a.cbz"),
            MetadataRecord::default(),
            format,
            MetadataRecord::default(),
        );
        assert_eq!(merged.file_format.as_deref(), Some("CBZ"));

        let mut empty = MetadataRecord::default();
        let fields = empty.apply_layer(MetadataRecord {
            file_format: Some("CBR".to_string()),
            ..Default::default()
        });
        assert_eq!(fields, vec!["file_format"]);
    }

    #[test]
    fn apply_layer_reports_changed_fields_only() {
        let mut record = MetadataRecord {
            title: Some("Dune".to_string()),
            ..Default::default()
        };
        let fields = record.apply_layer(MetadataRecord {
            title: Some("Dune".to_string()),
            page_count: Some(412),
            ..Default::default()
        });
        assert_eq!(fields, vec!["page_count"]);
    }
}
