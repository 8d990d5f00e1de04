//! Port describing the content backend the site aggregates.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::application::pagination::Page;
use crate::domain::entities::{FacetOption, Hackathon};
use crate::domain::types::{FacetSource, ListingKind};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request to `{path}` failed: {message}")]
    Transport { path: String, message: String },
    #[error("backend responded with status {status} for `{path}`")]
    Status { path: String, status: u16 },
    #[error("backend response from `{path}` could not be decoded: {message}")]
    Decode { path: String, message: String },
    #[error("invalid backend url: {0}")]
    Url(String),
}

impl BackendError {
    pub fn decode(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether the backend reported the requested record as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::Status { status: 404, .. })
    }
}

/// Read-only access to the listing backend.
///
/// Listing and detail bodies are returned as raw JSON so proxies can relay them
/// untouched; typed views are decoded by the helpers below.
#[async_trait]
pub trait ListingBackend: Send + Sync {
    /// `GET /{listing}?{query}` with the query forwarded verbatim.
    async fn list(&self, kind: ListingKind, query: &str) -> Result<Value, BackendError>;

    async fn facets(&self, source: &FacetSource) -> Result<Vec<FacetOption>, BackendError>;

    /// `GET /{listing}/{id}`; the backend wraps the record in a `data` array.
    async fn detail(&self, kind: ListingKind, id: i64) -> Result<Value, BackendError>;

    async fn active_hackathons(&self) -> Result<Vec<Hackathon>, BackendError>;

    /// Every record of a listing, as exposed for sitemap generation.
    async fn sitemap_items(&self, kind: ListingKind) -> Result<Value, BackendError>;
}

/// Fetch one listing page and decode it.
pub async fn list_page<T: DeserializeOwned>(
    backend: &dyn ListingBackend,
    kind: ListingKind,
    query: &str,
) -> Result<Page<T>, BackendError> {
    let body = backend.list(kind, query).await?;
    serde_json::from_value(body).map_err(|err| BackendError::decode(kind.path(), err))
}

/// Fetch the records a listing exposes for its sitemap.
pub async fn sitemap_records<T: DeserializeOwned>(
    backend: &dyn ListingBackend,
    kind: ListingKind,
) -> Result<Vec<T>, BackendError> {
    let body = backend.sitemap_items(kind).await?;
    decode_records(&format!("{}/sitemap", kind.path()), body)
}

/// Decode a `{ "data": [...] }` envelope, or a bare array.
pub fn decode_records<T: DeserializeOwned>(path: &str, body: Value) -> Result<Vec<T>, BackendError> {
    let records = match body {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Array(Vec::new())),
        Value::Null => Value::Array(Vec::new()),
        other => other,
    };
    if records.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(records).map_err(|err| BackendError::decode(path, err))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::entities::Job;

    #[test]
    fn records_decode_from_envelope_or_array() {
        let wrapped: Vec<Job> =
            decode_records("/jobs", json!({"data": [{"id": 1, "title": "A"}]}))
                .expect("envelope");
        assert_eq!(wrapped.len(), 1);

        let bare: Vec<Job> =
            decode_records("/jobs", json!([{"id": 2}, {"id": 3}])).expect("array");
        assert_eq!(bare.iter().map(|job| job.id).collect::<Vec<_>>(), vec![2, 3]);

        let empty: Vec<Job> =
            decode_records("/jobs", json!({"data": null})).expect("null data");
        assert!(empty.is_empty());
    }

    #[test]
    fn only_404_counts_as_not_found() {
        let missing = BackendError::Status {
            path: "/jobs/9".into(),
            status: 404,
        };
        let broken = BackendError::Status {
            path: "/jobs/9".into(),
            status: 503,
        };
        assert!(missing.is_not_found());
        assert!(!broken.is_not_found());
    }
}
