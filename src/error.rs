//! Error types for chore operations

use thiserror::Error;

/// Result type for chore operations
pub type Result<T> = std::result::Result<T, ChoreError>;

/// Error kinds surfaced by the core.
///
/// Precondition violations (voting twice, generating a series for a
/// non-repeating chore, ...) are not errors; those operations report an
/// outcome instead.
#[derive(Error, Debug)]
pub enum ChoreError {
    /// Document does not exist in the collection
    #[error("Not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// A document with the same id was written first
    #[error("Write conflict on {collection}/{id}")]
    WriteConflict { collection: String, id: String },

    /// Backend could not be reached or failed to persist
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Date string is not a zero-padded yyyy-MM-dd day
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Chore name is required
    #[error("Chore name must not be empty")]
    EmptyName,

    /// User exists but has not joined a household
    #[error("User {0} is not in a group")]
    NoGroup(String),

    /// No acting user was configured
    #[error("No user set; pass --user or set CHORES_USER")]
    MissingUser,
}

impl ChoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        ChoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<std::io::Error> for ChoreError {
    fn from(err: std::io::Error) -> Self {
        ChoreError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ChoreError {
    fn from(err: serde_json::Error) -> Self {
        ChoreError::Serialization(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for ChoreError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        ChoreError::Transport(format!("lock poisoned: {}", err))
    }
}
