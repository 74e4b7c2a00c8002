use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use shelfscan_core::{AppConfig, FileHandle, FilenameParser, FormatKind, MetadataRecord, classify};
use tracing::{debug, info, instrument, warn};

use crate::enrichment::merge::{MergeLayer, MetadataSource, merge};
use crate::error::{EnrichError, Result};
use crate::extract::{ArchiveCapabilities, DefaultFormatExtractor, FormatExtractor};
use crate::sources::CatalogClient;

/// What a single pipeline run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
    pub steps: Vec<String>,
    pub fields_updated: Vec<String>,
    pub sources_used: Vec<String>,
    pub errors: Vec<String>,
}

impl EnrichmentReport {
    fn add_step(&mut self, step: impl Into<String>) {
        self.steps.push(step.into());
    }

    pub fn add_source(&mut self, source: impl Into<String>) {
        push_unique(&mut self.sources_used, source.into());
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    fn add_fields<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = String>,
    {
        for field in fields {
            push_unique(&mut self.fields_updated, field);
        }
    }
}

fn push_unique(target: &mut Vec<String>, value: String) {
    if target.iter().any(|existing| existing == &value) {
        return;
    }
    target.push(value);
}

/// Inputs visible to a stage: the file, its kind and the record merged so far.
pub struct StageContext<'a> {
    pub file: &'a FileHandle,
    pub kind: FormatKind,
    pub merged: &'a MetadataRecord,
}

/// One layer of the resolution pipeline. Stages run in registration order; the
/// layer a stage returns is kept under its [`MetadataSource`], so precedence
/// follows the source, never the position.
#[async_trait]
pub trait MetadataStage: Send + Sync {
    fn source(&self) -> MetadataSource;

    /// Partial record for this layer; an empty record means "nothing to add".
    async fn run(&self, ctx: &StageContext<'_>, report: &mut EnrichmentReport) -> MetadataRecord;
}

// ─── Stages ──────────────────────────────────────────────────────────────────

pub struct FilenameStage {
    parser: FilenameParser,
}

impl FilenameStage {
    pub fn new(parser: FilenameParser) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl MetadataStage for FilenameStage {
    fn source(&self) -> MetadataSource {
        MetadataSource::Filename
    }

    async fn run(&self, ctx: &StageContext<'_>, _: &mut EnrichmentReport) -> MetadataRecord {
        self.parser.parse(&ctx.file.base_name(), ctx.kind.is_comic())
    }
}

pub struct FormatStage {
    extractor: Arc<dyn FormatExtractor>,
}

impl FormatStage {
    pub fn new(extractor: Arc<dyn FormatExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl MetadataStage for FormatStage {
    fn source(&self) -> MetadataSource {
        MetadataSource::Embedded
    }

    async fn run(&self, ctx: &StageContext<'_>, _: &mut EnrichmentReport) -> MetadataRecord {
        self.extractor.extract(ctx.file.path(), ctx.kind)
    }
}

/// Catalog lookup keyed on the title/author merged so far. Skipped when
/// neither is known.
pub struct CatalogStage {
    client: CatalogClient,
}

impl CatalogStage {
    pub fn new(client: CatalogClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataStage for CatalogStage {
    fn source(&self) -> MetadataSource {
        MetadataSource::Catalog
    }

    async fn run(&self, ctx: &StageContext<'_>, report: &mut EnrichmentReport) -> MetadataRecord {
        if !ctx.merged.has_title_or_author() {
            debug!(path = %ctx.file.path().display(), "no title or author, skipping catalog");
            return MetadataRecord::default();
        }

        let lookup = self
            .client
            .lookup(ctx.merged.known_title(), ctx.merged.known_author())
            .await;
        for source in lookup.sources_used {
            report.add_source(source);
        }
        for error in lookup.errors {
            report.add_error(error);
        }
        lookup.record
    }
}

// ─── Sink ────────────────────────────────────────────────────────────────────

/// Downstream consumer of finished records.
pub trait RecordSink {
    fn accept(&mut self, path: &Path, record: MetadataRecord) -> Result<()>;
}

impl RecordSink for Vec<(PathBuf, MetadataRecord)> {
    fn accept(&mut self, path: &Path, record: MetadataRecord) -> Result<()> {
        self.push((path.to_path_buf(), record));
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<String>,
}

impl BatchSummary {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Partial records gathered so far, one slot per source.
#[derive(Debug, Default)]
struct SourceLayers {
    filename: MetadataRecord,
    embedded: MetadataRecord,
    catalog: MetadataRecord,
}

impl SourceLayers {
    fn slot(&mut self, source: MetadataSource) -> &mut MetadataRecord {
        match source {
            MetadataSource::Filename => &mut self.filename,
            MetadataSource::Embedded => &mut self.embedded,
            MetadataSource::Catalog => &mut self.catalog,
        }
    }

    fn merged(&self, base: &MetadataRecord) -> MetadataRecord {
        merge(
            base.clone(),
            self.filename.clone(),
            self.embedded.clone(),
            self.catalog.clone(),
        )
    }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Classify, then fold every registered stage over the base record.
pub struct Pipeline {
    extensions: Vec<String>,
    stages: Vec<Box<dyn MetadataStage>>,
}

impl Pipeline {
    /// A pipeline with no stages; results carry only `file_format` and `path`.
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            extensions,
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: Box<dyn MetadataStage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Filename, format and (unless disabled) catalog stages, in that order.
    pub fn from_config(config: &AppConfig, capabilities: ArchiveCapabilities) -> Result<Self> {
        let extractor = Arc::new(DefaultFormatExtractor::new(capabilities, &config.comics));
        let mut pipeline = Self::new(config.scan.extensions.clone())
            .with_stage(Box::new(FilenameStage::new(FilenameParser::default())))
            .with_stage(Box::new(FormatStage::new(extractor)));

        if config.catalog.enabled {
            let client = CatalogClient::from_config(&config.catalog)?;
            if client.is_empty() {
                warn!("catalog enabled but no usable sources configured");
            } else {
                pipeline = pipeline.with_stage(Box::new(CatalogStage::new(client)));
            }
        }
        Ok(pipeline)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.source().as_str()).collect()
    }

    /// Resolve one file. `Ok(None)` when its extension is not allowed;
    /// `Err(NotFound)` when the path is not a file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn process(&self, path: &Path) -> Result<Option<(MetadataRecord, EnrichmentReport)>> {
        if !path.is_file() {
            return Err(EnrichError::NotFound(path.display().to_string()));
        }
        let file = FileHandle::open(path)?;
        let Some(kind) = classify(&file.file_name(), &self.extensions) else {
            debug!("unsupported extension, skipping");
            return Ok(None);
        };

        let file_format = kind
            .comic_tag()
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| file.format_tag());
        let base = MetadataRecord::base(file_format, file.path().display().to_string());
        let mut layers = SourceLayers::default();
        let mut merged = base.clone();
        let mut report = EnrichmentReport::default();

        for stage in &self.stages {
            let source = stage.source();
            let layer = {
                let ctx = StageContext {
                    file: &file,
                    kind,
                    merged: &merged,
                };
                stage.run(&ctx, &mut report).await
            };
            report.add_step(source.as_str());
            if layer.is_empty() {
                continue;
            }
            layers.slot(source).apply_layer(layer);
            let next = layers.merged(&base);
            let fields = merged.apply_layer(next.clone());
            report.add_fields(fields.into_iter().map(String::from));
            merged = next;
        }

        debug!(steps = ?report.steps, fields = ?report.fields_updated, "resolved");
        Ok(Some((merged, report)))
    }

    /// Process `paths` one at a time, handing each record to `sink`. Per-file
    /// failures are counted and never stop the batch.
    pub async fn process_batch(&self, paths: &[PathBuf], sink: &mut dyn RecordSink) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for path in paths {
            match self.process(path).await {
                Ok(Some((record, _))) => match sink.accept(path, record) {
                    Ok(()) => summary.processed += 1,
                    Err(err) => {
                        warn!(path = %path.display(), "sink rejected record: {err}");
                        summary.failed += 1;
                        summary.failures.push(format!("{}: {err}", path.display()));
                    }
                },
                Ok(None) => summary.skipped += 1,
                Err(err) => {
                    warn!(path = %path.display(), "{err}");
                    summary.failed += 1;
                    summary.failures.push(format!("{}: {err}", path.display()));
                }
            }
        }
        info!(
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            "batch finished"
        );
        summary
    }
}
