pub mod enrichment;
pub mod error;
pub mod extract;
pub mod http;
pub mod sources;

pub use enrichment::{
    BatchSummary, EnrichmentReport, MergeLayer, MetadataSource, MetadataStage, Pipeline,
    RecordSink, merge,
};
pub use error::{EnrichError, Result};
pub use extract::{
    ArchiveCapabilities, ComicArchiveExtractor, EpubMetadataExtractor, FormatExtractor,
    parse_comic_info,
};
pub use sources::{CatalogClient, CatalogSource, GoogleBooksSource, OpenLibrarySource};
