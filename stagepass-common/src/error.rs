//! Error type shared by the StagePass crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder, document store or config file access
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored timestamp that is not RFC 3339
    #[error("Invalid timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },

    /// A column holds a value outside its enumeration (status, action, ...)
    #[error("Unexpected stored value for {column}: '{value}'")]
    UnexpectedValue { column: &'static str, value: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when a database constraint rejected the write as a duplicate
    #[cfg(feature = "sqlx")]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
