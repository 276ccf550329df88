//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                               |
//! |------|-------------------------------------------------------|
//! | 0    | Success                                               |
//! | 1    | General error (unspecified)                           |
//! | 2    | Usage error (bad args, bad status, bad date)          |
//! | 3    | Ingest finished but some rows failed to persist       |
//! | 4    | Schema error: required columns missing from the input |
//! | 5    | Persistence backend failure                           |
//! | 6    | Input file or config could not be read                |
//! | 7    | Referenced job or operation does not exist            |
//!
//! Skipped rows alone do not change the exit code of `ingest`.

use shopflow_ingest::{IngestError, StoreError};

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unparseable status or date.
pub const EXIT_USAGE: u8 = 2;

/// Ingest committed what it could but one or more rows were rolled back.
pub const EXIT_ROW_ERRORS: u8 = 3;

/// Required column(s) missing. Nothing was ingested.
pub const EXIT_SCHEMA: u8 = 4;

/// Database could not be opened, read or written.
pub const EXIT_BACKEND: u8 = 5;

/// Input spreadsheet or config file unreadable or malformed.
pub const EXIT_INPUT: u8 = 6;

/// Job or operation not found.
pub const EXIT_NOT_FOUND: u8 = 7;

pub fn ingest_exit_code(err: &IngestError) -> u8 {
    match err {
        IngestError::Schema { .. } => EXIT_SCHEMA,
        IngestError::ConfigParse(_) | IngestError::ConfigValidation(_) | IngestError::Io(_) => {
            EXIT_INPUT
        }
        IngestError::Backend(_) => EXIT_BACKEND,
    }
}

pub fn store_exit_code(err: &StoreError) -> u8 {
    match err {
        StoreError::NotFound { .. } => EXIT_NOT_FOUND,
        StoreError::InvalidStatus(_) => EXIT_USAGE,
        StoreError::Sqlite(_) => EXIT_BACKEND,
    }
}
