use thiserror::Error;

/// Failures surfaced by extraction, numbering and persistence.
///
/// A field that cannot be located is not an error: locators return `None`
/// and the orchestrator substitutes blanks or zeros.
#[derive(Error, Debug)]
pub enum PorError {
    #[error("Unsupported file type: {extension}")]
    UnsupportedFileType { extension: String },

    #[error("Could not read document: {0}")]
    UnreadableDocument(String),

    #[error("Empty or invalid document")]
    EmptyDocument,

    #[error("File too large ({size} bytes, max {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("PO number must be greater than 0 (got {0})")]
    InvalidOverride(i64),

    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Database error: {0}")]
    Persistence(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for PorError {
    fn from(e: rusqlite::Error) -> Self {
        PorError::Persistence(e.to_string())
    }
}

pub type PorResult<T> = Result<T, PorError>;
