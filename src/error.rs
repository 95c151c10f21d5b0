//! Error types for clone operations.

use mysql_async::{Error as MySqlError, ServerError};
use thiserror::Error;

use crate::object::ObjectKind;

/// MySQL `ER_NO_SUCH_TABLE`: "Table 'x.y' doesn't exist".
pub const ER_NO_SUCH_TABLE: u16 = 1146;
/// MySQL `ER_VIEW_INVALID`: "View 'x.y' references invalid table(s) or column(s) ...".
pub const ER_VIEW_INVALID: u16 = 1356;

/// Errors that can occur while cloning a database.
#[derive(Error, Debug)]
pub enum CloneError {
    /// MySQL connection or query error outside a specific object.
    #[error("MySQL error: {0}")]
    MySQL(#[from] MySqlError),

    /// A statement for a specific object failed.
    #[error("{kind} `{name}`: {source}")]
    Statement {
        kind: ObjectKind,
        name: String,
        #[source]
        source: MySqlError,
    },

    /// A dependency-ordered build pass made no progress.
    #[error(
        "could not create {count} {kind} object(s) [{names}]: missing or cyclic dependency; last error: {source}",
        count = .pending.len(),
        names = .pending.join(", ")
    )]
    UnresolvedDependencies {
        kind: ObjectKind,
        pending: Vec<String>,
        #[source]
        source: MySqlError,
    },

    /// A requested table is not present in the source catalog.
    #[error("Table '{0}' not found in source database")]
    UnknownTable(String),

    /// The source returned no create-statement for an object (usually missing privileges).
    #[error("No create statement visible for {kind} `{name}`")]
    MissingDefinition { kind: ObjectKind, name: String },

    /// The same table name appears twice in a request.
    #[error("Table '{0}' is listed more than once in the clone request")]
    DuplicateTable(String),

    /// The clone was cancelled between steps.
    #[error("Clone cancelled")]
    Cancelled,

    /// Clone plan file could not be parsed.
    #[error("Clone plan error: {0}")]
    Plan(#[from] toml::de::Error),

    /// IO error (plan file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloneError {
    pub fn statement(kind: ObjectKind, name: impl Into<String>, source: MySqlError) -> Self {
        CloneError::Statement {
            kind,
            name: name.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CloneError::Cancelled)
    }
}

/// How a failed destination statement is treated by the dependency-ordered
/// builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The statement references an object that does not exist (yet).
    UnresolvedReference,
    /// Anything else.
    Fatal,
}

impl ErrorClass {
    /// Classify a server error code.
    pub fn of_code(code: u16) -> Self {
        match code {
            ER_NO_SUCH_TABLE | ER_VIEW_INVALID => ErrorClass::UnresolvedReference,
            _ => ErrorClass::Fatal,
        }
    }
}

/// Classify a MySQL error. Only server-reported errors can be unresolved
/// references; driver and IO failures are always fatal.
pub fn classify(err: &MySqlError) -> ErrorClass {
    match err {
        MySqlError::Server(ServerError { code, .. }) => ErrorClass::of_code(*code),
        _ => ErrorClass::Fatal,
    }
}

/// Result type alias for clone operations.
pub type Result<T> = std::result::Result<T, CloneError>;
