use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot read container {0}: {1}")]
    ContainerRead(String, String),

    #[error("metadata parse error: {0}")]
    MetadataParse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("missing capability: {0}")]
    MissingCapability(String),

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Core(#[from] shelfscan_core::CoreError),
}

pub type Result<T> = std::result::Result<T, EnrichError>;
