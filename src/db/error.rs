//! Data layer error type

use rusqlite::ffi;
use rusqlite::types::FromSqlError;
use thiserror::Error;

pub type DbResult<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database connection is not open")]
    NotOpen,

    #[error("Failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration {version}_{name} failed: {source}")]
    Migration {
        version: i64,
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Ledger records migration {0}, which is not in the registry")]
    UnknownMigration(i64),

    #[error("Invalid migration registry: {0}")]
    InvalidRegistry(String),

    #[error("Column '{0}' missing from result row")]
    MissingColumn(String),

    #[error("Column '{column}' has an unexpected type: {source}")]
    Conversion {
        column: String,
        #[source]
        source: FromSqlError,
    },

    #[error("Unknown location code: {0}")]
    InvalidLocation(i64),

    #[error("Record in '{0}' has not been saved yet")]
    NotPersisted(&'static str),

    #[error("User {user_id} already has an active work session ({session_id})")]
    ActiveSessionExists { user_id: i64, session_id: i64 },

    #[error("Break of {0} minutes is negative")]
    NegativeBreak(i64),

    #[error("Work session {session_id} started at {start}, cannot end at {end}")]
    EndBeforeStart { session_id: i64, start: i64, end: i64 },
}

impl DbError {
    fn sqlite_failure(&self) -> Option<&ffi::Error> {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
            | DbError::Migration {
                source: rusqlite::Error::SqliteFailure(err, _),
                ..
            } => Some(err),
            _ => None,
        }
    }

    /// UNIQUE or PRIMARY KEY violation
    pub fn is_unique_violation(&self) -> bool {
        self.sqlite_failure().is_some_and(|err| {
            err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        })
    }

    /// Any constraint violation: unique, foreign key, check or not-null
    pub fn is_constraint_violation(&self) -> bool {
        self.sqlite_failure()
            .is_some_and(|err| err.code == rusqlite::ErrorCode::ConstraintViolation)
    }
}
