use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a session could not be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// The account endpoint could not be reached or answered with a non-success HTTP status.
    Unreachable,
    /// The credentials were rejected.
    Authentication,
    /// The role lacks privileges on the requested warehouse/database/schema.
    Authorization,
    /// The login was refused for another reason reported by the warehouse.
    Rejected,
}

/// Coarse classification of an [`Error`], matching the failure points of the load workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorCategory {
    /// Missing configuration values or invalid identifiers.
    Configuration,
    /// The input file is missing or unreadable.
    FileAccess,
    /// The input file is malformed or does not match the declared schema.
    Format,
    /// The session could not be established.
    Connection,
    /// The upload did not complete.
    Upload,
}

/// Error type returned by loading, session and upload functions.
#[derive(Debug, Error)]
pub enum Error {
    /// The input file could not be opened (e.g. file not found, permission denied).
    #[error("cannot read '{path}': {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error (inconsistent field counts, invalid UTF-8, read failures).
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The input does not conform to the expected shape (empty header, missing columns, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// Missing or invalid configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The session could not be established.
    #[error("connection error ({failure:?}): {message}")]
    Connection {
        failure: ConnectionFailure,
        message: String,
    },

    /// A statement was rejected by the warehouse.
    #[error("statement failed [{code}]: {message}")]
    Statement { code: String, message: String },

    /// The dataset could not be written to the destination table.
    #[error("upload to {table} failed ({rows_committed} rows committed): {message}")]
    Upload {
        table: String,
        message: String,
        rows_committed: u64,
    },

    /// Transport failure talking to an established session.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The warehouse answered with something that could not be understood.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl Error {
    /// Classify this error into an [`ErrorCategory`].
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FileAccess { .. } => ErrorCategory::FileAccess,
            Error::Csv(err) => match err.kind() {
                csv::ErrorKind::Io(_) => ErrorCategory::FileAccess,
                _ => ErrorCategory::Format,
            },
            Error::SchemaMismatch { .. } | Error::ParseError { .. } => ErrorCategory::Format,
            Error::Config { .. } => ErrorCategory::Configuration,
            Error::Connection { .. } => ErrorCategory::Connection,
            Error::Statement { .. }
            | Error::Upload { .. }
            | Error::Http(_)
            | Error::Protocol { .. } => ErrorCategory::Upload,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }
}
