//! `reqwest` adapter for the content backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::backend::{BackendError, ListingBackend, decode_records};
use crate::domain::entities::{FacetOption, Hackathon};
use crate::domain::types::{FacetSource, ListingKind};
use crate::infra::error::InfraError;

const SOURCE: &str = "infra::backend";

#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    /// `base_url` may carry a path prefix, e.g. `https://api.example.com/v1`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InfraError> {
        let base = normalize_base(base_url)?;
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("devhub/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str, query: Option<&str>) -> Result<Url, BackendError> {
        let mut url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|err| BackendError::Url(err.to_string()))?;
        url.set_query(query.filter(|query| !query.is_empty()));
        Ok(url)
    }

    async fn get_json(&self, path: &str, query: Option<&str>) -> Result<Value, BackendError> {
        let url = self.url(path, query)?;
        debug!(target = SOURCE, url = %url, "backend request");
        metrics::counter!("devhub_backend_requests_total", "endpoint" => endpoint_label(path))
            .increment(1);

        let result = self.send(url.clone(), path).await;
        if let Err(err) = &result {
            metrics::counter!("devhub_backend_failures_total", "endpoint" => endpoint_label(path))
                .increment(1);
            warn!(target = SOURCE, url = %url, error = %err, "backend request failed");
        }
        result
    }

    async fn send(&self, url: Url, path: &str) -> Result<Value, BackendError> {
        let transport = |err: reqwest::Error| BackendError::Transport {
            path: path.to_string(),
            message: err.to_string(),
        };
        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;
        if !status.is_success() {
            return Err(BackendError::Status {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        serde_json::from_slice(&bytes).map_err(|err| BackendError::decode(path, err))
    }
}

#[async_trait]
impl ListingBackend for HttpBackend {
    async fn list(&self, kind: ListingKind, query: &str) -> Result<Value, BackendError> {
        self.get_json(kind.as_str(), Some(query)).await
    }

    async fn facets(&self, source: &FacetSource) -> Result<Vec<FacetOption>, BackendError> {
        let body = self.get_json(source.endpoint, None).await?;
        decode_records(source.endpoint, body)
    }

    async fn detail(&self, kind: ListingKind, id: i64) -> Result<Value, BackendError> {
        self.get_json(&format!("{kind}/{id}"), None).await
    }

    async fn active_hackathons(&self) -> Result<Vec<Hackathon>, BackendError> {
        let body = self.get_json("hackathons/active", None).await?;
        decode_records("hackathons/active", body)
    }

    async fn sitemap_items(&self, kind: ListingKind) -> Result<Value, BackendError> {
        self.get_json(&format!("{kind}/sitemap"), None).await
    }
}

fn normalize_base(raw: &str) -> Result<Url, InfraError> {
    let trimmed = raw.trim().trim_end_matches('/');
    Url::parse(&format!("{trimmed}/"))
        .map_err(|err| InfraError::configuration(format!("invalid backend url `{raw}`: {err}")))
}

/// First path segment pair, so detail ids do not explode label cardinality.
fn endpoint_label(path: &str) -> String {
    let mut segments = path.trim_start_matches('/').split('/');
    let listing = segments.next().unwrap_or_default();
    match segments.next() {
        Some(next) if next.chars().all(|ch| ch.is_ascii_digit()) => format!("{listing}/:id"),
        Some(next) => format!("{listing}/{next}"),
        None => listing.to_string(),
    }
}
