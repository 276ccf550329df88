use std::fmt;

use rusqlite::ErrorCode;

use crate::columns::Field;

/// A required canonical field with no matching header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    pub field: Field,
    pub aliases: Vec<String>,
}

/// Batch-level failures. Anything row-scoped is reported in the
/// [`IngestReport`](crate::model::IngestReport) instead.
#[derive(Debug)]
pub enum IngestError {
    /// One or more required columns are absent from the input. Nothing was ingested.
    Schema { missing: Vec<MissingField> },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty alias list, alias claimed twice, etc.).
    ConfigValidation(String),
    /// The persistence backend itself failed. Rows committed before the failure stay committed.
    Backend(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema { missing } => {
                write!(f, "missing required column(s): ")?;
                for (i, m) in missing.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} (expected one of: {})", m.field, m.aliases.join(", "))?;
                }
                Ok(())
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Backend(msg) => write!(f, "persistence backend error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        Self::Backend(err.to_string())
    }
}

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    /// No entity with the given key.
    NotFound { entity: &'static str, key: String },
    /// Status text that does not name an operation status.
    InvalidStatus(String),
}

impl StoreError {
    /// True when the backend itself is unusable, as opposed to a failure
    /// caused by the data of a single row (constraint violation, bad value).
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DiskFull
                    | ErrorCode::ReadOnly
                    | ErrorCode::PermissionDenied
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::OutOfMemory
                    | ErrorCode::FileLockingProtocolFailed
                    | ErrorCode::InternalMalfunction
            ),
            Self::Sqlite(rusqlite::Error::SqliteSingleThreadedMode) => true,
            _ => false,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::NotFound { entity, key } => write!(f, "{entity} '{key}' not found"),
            Self::InvalidStatus(value) => write!(
                f,
                "invalid status '{value}' (expected not_started, ready, in_progress or completed)"
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}
