//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the SQLite adapter.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] sqlwire_protocol::ProtocolError),

    #[error("in-memory databases must be opened with open_in_memory")]
    InMemoryOpen,

    #[error("database file not found: {0}")]
    NotFound(PathBuf),

    #[error("database file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("not a SQLite database: {0}")]
    NotADatabase(PathBuf),

    #[error("row for table {0} has no fields to write")]
    EmptyRow(String),

    #[error("row for table {table} is missing key field {key}")]
    MissingKey { table: String, key: String },

    #[error("identifier {0:?} contains '?', which would be read as a placeholder")]
    InvalidIdentifier(String),
}
