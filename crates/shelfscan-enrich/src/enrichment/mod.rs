pub mod merge;
pub mod pipeline;

pub use merge::{MergeLayer, MetadataSource, merge};
pub use pipeline::{
    BatchSummary, CatalogStage, EnrichmentReport, FilenameStage, FormatStage, MetadataStage,
    Pipeline, RecordSink, StageContext,
};
