//! Error types for the persistence layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique email constraint violated on user creation.
    #[error("email already registered: {0}")]
    EmailTaken(String),

    /// A row held a value the domain model cannot represent.
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
