pub mod config;
pub mod error;
pub mod file_import;
pub mod filename;
pub mod models;

pub use config::{AppConfig, CatalogConfig, ComicsConfig, ScanConfig};
pub use error::{CoreError, Result};
pub use file_import::{
    CollectionStats, DEFAULT_EXTENSIONS, analyze_collection, classify, default_extensions,
    is_book_file, scan_directory,
};
pub use filename::{
    CombinedOrdering, FilenameParser, FixedOrdering, IndicatorOrdering, NameOrder, OrderingGuess,
    OrderingStrategy, parse_filename,
};
pub use models::*;
