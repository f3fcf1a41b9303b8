//! Error types for forms and the persistence boundary.

use thiserror::Error;

/// Form definition and statement-binding errors.
#[derive(Debug, Error)]
pub enum FormError {
    /// More than one field in a schema list is marked as the identifier.
    #[error("duplicate identifier fields: {first} and {second}")]
    DuplicateIdentifier { first: String, second: String },

    /// An update was requested for a schema list without an identifier field.
    #[error("no identifier field in schema")]
    MissingIdentifier,

    /// An update was requested for a schema list with no value fields.
    #[error("nothing to update")]
    NothingToUpdate,

    /// Invalid field value.
    #[error("invalid value for field {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// The statement executor failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Schema definition could not be parsed.
    #[error("failed to parse field schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Errors raised at the statement executor boundary.
///
/// These are never produced by the form engine itself; they come back from a
/// [`StatementExecutor`](crate::StatementExecutor) and are handed straight to
/// the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    /// The connection to the database could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The requested database could not be selected.
    #[error("database selection failed: {0}")]
    Selection(String),

    /// The database engine rejected the statement.
    #[error("statement failed: {0}")]
    Statement(String),
}

/// Result type alias for form operations.
pub type Result<T> = std::result::Result<T, FormError>;
