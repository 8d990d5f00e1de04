use thiserror::Error;

use super::types::ListingKind;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{listing} record `{id}` not found")]
    NotFound { listing: ListingKind, id: i64 },
    #[error("slug `{requested}` does not match canonical slug `{canonical}`")]
    SlugMismatch { requested: String, canonical: String },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn not_found(listing: ListingKind, id: i64) -> Self {
        Self::NotFound { listing, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
