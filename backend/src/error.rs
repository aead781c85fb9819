use thiserror::Error;

pub type FormsResult<T> = Result<T, FormsError>;

/// Errors raised while loading or persisting forms, fields and records.
#[derive(Debug, Error)]
pub enum FormsError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("attributes were already loaded for form {loaded:?}, requested for form {requested:?}")]
    ContextMismatch {
        loaded: Option<u32>,
        requested: Option<u32>,
    },
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormsError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Maps unique index violations to a validation message, leaving other
    /// database errors untouched.
    pub fn from_unique_violation(err: rusqlite::Error, message: impl Into<String>) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                Self::Validation(message.into())
            }
            _ => Self::Database(err),
        }
    }
}

/// Errors aborting a schema migration. None of them are recovered locally.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("invalid module version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },
    #[error("table '{0}' does not exist")]
    MissingTable(String),
    #[error("column '{column}' does not exist in table '{table}'")]
    MissingColumn { table: String, column: String },
    #[error("foreign key violation in table '{table}' (rowid {rowid:?}) referencing '{parent}'")]
    ForeignKeyViolation {
        table: String,
        rowid: Option<i64>,
        parent: String,
    },
    #[error("migration step {version} ({name}) failed: {source}")]
    Step {
        version: String,
        name: &'static str,
        #[source]
        source: Box<MigrationError>,
    },
}
