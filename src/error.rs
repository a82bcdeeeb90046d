use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BundlerError {
    #[error("invalid granule name: {0}")]
    InvalidGranuleName(String),

    #[error("mosaic directory is not an accessible directory: {0}")]
    MosaicDirAccess(Utf8PathBuf),

    #[error("missing timeregex.properties in {0}")]
    MissingTimeRegex(Utf8PathBuf),

    #[error("timeregex.properties does not contain a valid regex: {0}")]
    InvalidTimeRegex(String),

    #[error("failed to load granule index: {0}")]
    IndexLoad(String),

    #[error("missing configuration value: {0}")]
    MissingSetting(&'static str),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("retrieval request failed: {0}")]
    RetrievalHttp(String),

    #[error("retrieval returned status {status}: {message}")]
    RetrievalStatus { status: u16, message: String },

    #[error("archive write failed: {0}")]
    ArchiveWrite(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
