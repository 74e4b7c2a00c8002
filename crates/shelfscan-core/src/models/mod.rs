pub mod file;
pub mod record;

pub use file::{FileHandle, FormatKind};
pub use record::{MetadataRecord, non_empty, parse_number, year_from_date};
