use crate::crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("path must be unique")]
    PathConflict,
    #[error("exhausted all retries of generating a unique path")]
    PathExhausted,
    #[error("endpoint decryption failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl UrlError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        UrlError::Validation {
            field,
            message: message.into(),
        }
    }
}
