use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use shelfscan_core::error::ExitCode;
use shelfscan_core::{AppConfig, FilenameParser, MetadataRecord, analyze_collection, scan_directory};
use shelfscan_enrich::{ArchiveCapabilities, BatchSummary, Pipeline, RecordSink};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "shelfscan",
    about = "Resolve ebook and comic metadata from files, archives and online catalogs",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format. Also enabled by setting SHELFSCAN_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Skip online catalog lookups.
    #[arg(long, global = true)]
    offline: bool,

    /// Use this config file instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve metadata for individual files.
    Process {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Resolve metadata for every book file in a directory.
    Scan {
        dir: PathBuf,
        #[command(flatten)]
        depth: Depth,
    },

    /// Summarize a directory from file names alone.
    Analyze {
        dir: PathBuf,
        #[command(flatten)]
        depth: Depth,
    },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct Depth {
    /// Descend into subdirectories.
    #[arg(long, conflicts_with = "flat")]
    recursive: bool,
    /// Only look at the top-level directory.
    #[arg(long)]
    flat: bool,
}

impl Depth {
    fn resolve(&self, config: &AppConfig) -> bool {
        if self.flat {
            false
        } else {
            self.recursive || config.scan.recursive
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Print the config file location.
    Path,
    /// Write a default config file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

// ─── Output ──────────────────────────────────────────────────────────────────

/// Prints records as they arrive, or holds them for one JSON envelope.
struct OutputSink {
    json: bool,
    records: Vec<MetadataRecord>,
}

impl OutputSink {
    fn new(json: bool) -> Self {
        Self {
            json,
            records: Vec::new(),
        }
    }
}

impl RecordSink for OutputSink {
    fn accept(&mut self, path: &Path, record: MetadataRecord) -> shelfscan_enrich::Result<()> {
        if self.json {
            self.records.push(record);
        } else {
            print_record(path, &record);
        }
        Ok(())
    }
}

fn print_record(path: &Path, record: &MetadataRecord) {
    println!("{}", path.display());
    let text = [
        ("title", record.title.as_deref()),
        ("author", record.author.as_deref()),
        ("series", record.series.as_deref()),
        ("isbn", record.isbn.as_deref()),
        ("publisher", record.publisher.as_deref()),
        ("language", record.language.as_deref()),
        ("genre", record.genre.as_deref()),
        ("format", record.file_format.as_deref()),
    ];
    for (label, value) in text {
        if let Some(value) = value {
            println!("  {label:<10} {value}");
        }
    }
    let numbers = [
        ("issue", record.issue_number.map(i64::from)),
        ("year", record.published_year.map(i64::from)),
        ("pages", record.page_count.map(i64::from)),
    ];
    for (label, value) in numbers {
        if let Some(value) = value {
            println!("  {label:<10} {value}");
        }
    }
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ─── Main ────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json_output = cli.json || std::env::var("SHELFSCAN_JSON").as_deref() == Ok("1");
    let config_path = cli.config.clone().unwrap_or_else(AppConfig::config_path);
    let mut config = AppConfig::load_from(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    if cli.offline {
        config.catalog.enabled = false;
    }

    match cli.command {
        Commands::Process { files } => {
            let pipeline = Pipeline::from_config(&config, ArchiveCapabilities::detect())?;
            let mut sink = OutputSink::new(json_output);
            let summary = pipeline.process_batch(&files, &mut sink).await;
            finish_batch(sink, summary, json_output, start)?;
        }

        Commands::Scan { dir, depth } => {
            let recursive = depth.resolve(&config);
            let files = match scan_directory(&dir, recursive, &config.scan.extensions) {
                Ok(files) => files,
                Err(err) => fail(ExitCode::NotFound, &err.to_string(), json_output, start),
            };
            let pipeline = Pipeline::from_config(&config, ArchiveCapabilities::detect())?;
            let mut sink = OutputSink::new(json_output);
            let summary = pipeline.process_batch(&files, &mut sink).await;
            finish_batch(sink, summary, json_output, start)?;
        }

        Commands::Analyze { dir, depth } => {
            let recursive = depth.resolve(&config);
            let files = match scan_directory(&dir, recursive, &config.scan.extensions) {
                Ok(files) => files,
                Err(err) => fail(ExitCode::NotFound, &err.to_string(), json_output, start),
            };
            let stats =
                analyze_collection(&files, &config.scan.extensions, &FilenameParser::default());
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":stats,"meta":{"duration_ms":dur}}))?;
            } else {
                println!("Files:   {}", stats.total);
                println!("Authors: {}", stats.authors.len());
                for author in &stats.authors {
                    println!("  {author}");
                }
                println!("Formats:");
                for (ext, count) in &stats.formats {
                    println!("  {ext:<6} {count}");
                }
            }
        }

        Commands::Config { action } => {
            let dur = start.elapsed().as_millis();
            match action {
                ConfigAction::Show => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":config,"meta":{"duration_ms":dur}}))?;
                    } else {
                        print!("{}", toml::to_string_pretty(&config)?);
                    }
                }
                ConfigAction::Path => {
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"path":config_path},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("{}", config_path.display());
                    }
                }
                ConfigAction::Init { force } => {
                    if config_path.exists() && !force {
                        fail(
                            ExitCode::InvalidArgs,
                            &format!("{} already exists (use --force)", config_path.display()),
                            json_output,
                            start,
                        );
                    }
                    AppConfig::default().save_to(&config_path)?;
                    if json_output {
                        print_json(&serde_json::json!({"status":"ok","data":{"written":config_path},"meta":{"duration_ms":dur}}))?;
                    } else {
                        println!("Wrote {}", config_path.display());
                    }
                }
            }
        }
    }

    Ok(())
}

fn finish_batch(
    sink: OutputSink,
    summary: BatchSummary,
    json_output: bool,
    start: Instant,
) -> Result<()> {
    let dur = start.elapsed().as_millis();
    if json_output {
        print_json(&batch_envelope(&sink.records, &summary, dur)?)?;
    } else {
        println!(
            "Processed {} file(s), skipped {}, failed {}.",
            summary.processed, summary.skipped, summary.failed
        );
        for failure in &summary.failures {
            eprintln!("  {failure}");
        }
    }

    if !summary.is_clean() {
        std::process::exit(ExitCode::PartialFailure as i32);
    }
    Ok(())
}

fn batch_envelope(
    records: &[MetadataRecord],
    summary: &BatchSummary,
    duration_ms: u128,
) -> Result<serde_json::Value> {
    let status = if summary.is_clean() { "ok" } else { "partial" };
    Ok(serde_json::json!({
        "status": status,
        "data": serde_json::to_value(records).context("serializing records")?,
        "summary": serde_json::to_value(summary).context("serializing batch summary")?,
        "meta": {"duration_ms": duration_ms}
    }))
}

fn fail(code: ExitCode, message: &str, json_output: bool, start: Instant) -> ! {
    let dur = start.elapsed().as_millis();
    if json_output {
        println!(
            "{}",
            serde_json::json!({"status":"error","message":message,"meta":{"duration_ms":dur}})
        );
    } else {
        eprintln!("Error: {message}");
    }
    std::process::exit(code as i32);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> MetadataRecord {
        MetadataRecord {
            title: Some(title.to_string()),
            file_format: Some("EPUB".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn json_sink_collects_records() {
        let mut sink = OutputSink::new(true);
        sink.accept(Path::new("/b/dune.epub"), record("Dune")).unwrap();
        sink.accept(Path::new("/b/emma.epub"), record("Emma")).unwrap();
        assert_eq!(sink.records.len(), 2);
        assert_eq!(sink.records[1].title.as_deref(), Some("Emma"));
    }

    #[test]
    fn envelope_reports_clean_batch() {
        let summary = BatchSummary {
            processed: 1,
            ..Default::default()
        };
        let value = batch_envelope(&[record("Dune")], &summary, 7).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["data"][0]["title"], "Dune");
        assert_eq!(value["data"][0]["file_format"], "EPUB");
        assert_eq!(value["summary"]["processed"], 1);
        assert_eq!(value["meta"]["duration_ms"], 7);
    }

    #[test]
    fn envelope_reports_partial_batch() {
        let summary = BatchSummary {
            processed: 0,
            skipped: 0,
            failed: 1,
            failures: vec!["/b/missing.epub: file not found".to_string()],
        };
        let value = batch_envelope(&[], &summary, 0).unwrap();
        assert_eq!(value["status"], "partial");
        assert_eq!(value["data"], serde_json::json!([]));
        assert_eq!(value["summary"]["failed"], 1);
    }
}
