use std::fmt;

/// Errors that reject a whole request or a whole rule load.
///
/// Per-item problems never show up here; they are recorded as
/// [`ItemIssue`](crate::model::ItemIssue)s in the batch's `unmatched` list.
#[derive(Debug)]
pub enum CompensationError {
    /// The batch payload is absent, empty, or not a list.
    InvalidBatch(String),
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (no rule table, empty column name, etc.).
    ConfigValidation(String),
    /// A configured column is missing from a rule CSV header.
    MissingColumn { table: String, column: String },
    /// IO error (file read, CSV framing, etc.).
    Io(String),
}

impl fmt::Display for CompensationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBatch(msg) => write!(f, "invalid batch: {msg}"),
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { table, column } => {
                write!(f, "rule table '{table}': missing column '{column}'")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for CompensationError {}
