//! Error taxonomy shared by the store, migrator and persistence adapter.
use thiserror::Error;

use crate::cell::CellIdError;

/// Stored content could not be decoded at all. Recovery is an explicit user
/// action: retry the load, or wipe storage and start from defaults.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("stored data under `{key}` is not valid JSON: {source}")]
    Json {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("stored data under `{key}` is double-encoded and its inner payload is not valid JSON: {source}")]
    DoubleEncoded {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage backend could not be read: {0}")]
    Backend(String),
}

/// Caller-supplied input violates an invariant; nothing was changed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    Cell(#[from] CellIdError),
    #[error("cell `{0}` is fixed and cannot carry data")]
    FixedCell(String),
    #[error("day must be at least 1 (got {0})")]
    InvalidDay(i64),
    #[error("selected room `{0}` is not among the offered rooms")]
    SelectionNotOffered(String),
    #[error("letter must be a single character A-Z (got `{0}`)")]
    InvalidLetter(String),
    #[error("import is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("import field `{field}` is malformed: {reason}")]
    MalformedField { field: &'static str, reason: String },
    #[error("import is not a JSON object")]
    NotAnObject,
    #[error("import is not valid JSON: {0}")]
    ImportJson(String),
}

/// Writing to the storage backend failed. In-memory state is kept and the
/// write is retried on the next mutation.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage quota exceeded while writing `{0}`")]
    QuotaExceeded(String),
    #[error("storage backend rejected write to `{key}`: {message}")]
    Backend { key: String, message: String },
    #[error("state could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Umbrella error for [`crate::Tracker`] operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker has not finished loading")]
    NotLoaded,
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl TrackerError {
    /// Stable class name surfaced to the presentation layer.
    #[must_use]
    pub const fn class(&self) -> &'static str {
        match self {
            Self::NotLoaded => "NotLoaded",
            Self::Parse(_) => "ParseError",
            Self::Validation(_) => "ValidationError",
            Self::Persistence(_) => "PersistenceError",
        }
    }
}
