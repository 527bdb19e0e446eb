use thiserror::Error;

/// Failures a caller may want to tell apart.
///
/// Everything else inside a stage is an `anyhow::Error` with context,
/// logged and skipped where it happens.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Corrupted ZIP {name}: {source}")]
    CorruptArchive {
        name: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid run date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
}
