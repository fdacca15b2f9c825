// Error surface for schema validation, mutation execution and codegen.
// Constraint violations coming back from the database driver are translated
// into typed errors here so callers never match on raw sqlx errors.

use std::fmt;

#[derive(Debug)]
pub enum EntError {
    /// A required field was not provided before save().
    MissingRequired(String),
    /// A field validator or enum-variant check rejected a value.
    Validation(String),
    /// The database rejected the statement with a uniqueness/constraint error.
    ConstraintViolation(String),
    /// UpdateOne/Delete matched no row, or an edge target does not exist.
    NotFound { entity: String, id: i64 },
    /// Schema definition or registry resolution error.
    Schema(String),
    /// Underlying driver failure.
    Database(anyhow::Error),
    /// Code generation failure (I/O or template assembly).
    Codegen(String),
    /// A mutation hook aborted the operation.
    Hook(String),
}

impl fmt::Display for EntError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntError::MissingRequired(field) => {
                write!(f, "missing required field \"{}\"", field)
            }
            EntError::Validation(msg) => write!(f, "validation failed: {}", msg),
            EntError::ConstraintViolation(msg) => write!(f, "constraint violation: {}", msg),
            EntError::NotFound { entity, id } => {
                write!(f, "{} with id {} not found", entity, id)
            }
            EntError::Schema(msg) => write!(f, "schema error: {}", msg),
            EntError::Database(err) => write!(f, "database error: {}", err),
            EntError::Codegen(msg) => write!(f, "codegen error: {}", msg),
            EntError::Hook(msg) => write!(f, "hook error: {}", msg),
        }
    }
}

impl std::error::Error for EntError {}

/// Detect uniqueness/constraint violations across the supported dialects.
/// Postgres reports SQLSTATE 23xxx; SQLite reports extended codes 1555/2067
/// and a "UNIQUE constraint failed" message.
pub fn is_constraint_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            if let Some(code) = db.code() {
                if code.starts_with("23") || code == "1555" || code == "2067" {
                    return true;
                }
            }
            db.message().contains("UNIQUE constraint failed")
                || db.message().contains("unique constraint")
        }
        _ => false,
    }
}

impl From<sqlx::Error> for EntError {
    fn from(err: sqlx::Error) -> Self {
        if is_constraint_violation(&err) {
            EntError::ConstraintViolation(err.to_string())
        } else {
            EntError::Database(err.into())
        }
    }
}

pub type EntResult<T> = Result<T, EntError>;
