//! Detail pages: one record by id, addressed as `/{listing}/{slug}/{id}`.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use crate::application::backend::{BackendError, ListingBackend, decode_records};
use crate::domain::entities::Listed;
use crate::domain::error::DomainError;
use crate::domain::slug::{detail_path, listing_slug};
use crate::domain::types::ListingKind;
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::detail";

#[derive(Debug, Error)]
pub enum DetailError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailPage<T> {
    pub listing: ListingKind,
    /// Canonical path of the record.
    pub path: String,
    pub item: T,
}

struct CachedRecord {
    fetched_at: Instant,
    record: Value,
}

/// Loads records for detail pages, keeping recent ones for the revalidation window.
pub struct DetailService {
    backend: Arc<dyn ListingBackend>,
    revalidate: Duration,
    cache: Mutex<LruCache<(ListingKind, i64), CachedRecord>>,
}

impl DetailService {
    pub fn new(
        backend: Arc<dyn ListingBackend>,
        revalidate: Duration,
        capacity: NonZeroUsize,
    ) -> Self {
        Self {
            backend,
            revalidate,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Load record `id` and check that `slug` is its canonical slug.
    pub async fn load<T>(&self, slug: &str, id: i64) -> Result<DetailPage<T>, DetailError>
    where
        T: Listed + DeserializeOwned,
    {
        let kind = T::KIND;
        let record = self.record(kind, id).await?;
        let item: T = serde_json::from_value(record)
            .map_err(|err| BackendError::decode(format!("{}/{id}", kind.path()), err))?;

        let canonical = listing_slug(item.title());
        if canonical != slug {
            return Err(DomainError::SlugMismatch {
                requested: slug.to_string(),
                canonical,
            }
            .into());
        }

        Ok(DetailPage {
            listing: kind,
            path: detail_path(kind.as_str(), item.title(), id),
            item,
        })
    }

    /// Drop every cached record.
    pub fn invalidate(&self) {
        mutex_lock(&self.cache, SOURCE, "invalidate").clear();
    }

    async fn record(&self, kind: ListingKind, id: i64) -> Result<Value, DetailError> {
        if let Some(record) = self.cached(kind, id) {
            return Ok(record);
        }

        let body = self.backend.detail(kind, id).await.map_err(|err| {
            if err.is_not_found() {
                DetailError::from(DomainError::not_found(kind, id))
            } else {
                DetailError::from(err)
            }
        })?;
        let record = decode_records::<Value>(&format!("{}/{id}", kind.path()), body)?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::not_found(kind, id))?;

        mutex_lock(&self.cache, SOURCE, "store").put(
            (kind, id),
            CachedRecord {
                fetched_at: Instant::now(),
                record: record.clone(),
            },
        );
        Ok(record)
    }

    fn cached(&self, kind: ListingKind, id: i64) -> Option<Value> {
        let mut cache = mutex_lock(&self.cache, SOURCE, "lookup");
        let fresh = cache
            .get(&(kind, id))
            .map(|entry| entry.fetched_at.elapsed() < self.revalidate)?;
        if fresh {
            debug!(target = SOURCE, listing = %kind, id, "detail cache hit");
            return cache.get(&(kind, id)).map(|entry| entry.record.clone());
        }
        cache.pop(&(kind, id));
        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::domain::entities::{FacetOption, Hackathon, Job};
    use crate::domain::types::FacetSource;

    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ListingBackend for CountingBackend {
        async fn list(&self, _kind: ListingKind, _query: &str) -> Result<Value, BackendError> {
            Ok(json!({"data": []}))
        }

        async fn facets(&self, _source: &FacetSource) -> Result<Vec<FacetOption>, BackendError> {
            Ok(Vec::new())
        }

        async fn detail(&self, kind: ListingKind, id: i64) -> Result<Value, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match id {
                1 => Ok(json!({"data": [{"id": 1, "title": "Rust Engineer (Remote)"}]})),
                2 => Ok(json!({"data": []})),
                _ => Err(BackendError::Status {
                    path: format!("{}/{id}", kind.path()),
                    status: 404,
                }),
            }
        }

        async fn active_hackathons(&self) -> Result<Vec<Hackathon>, BackendError> {
            Ok(Vec::new())
        }

        async fn sitemap_items(&self, _kind: ListingKind) -> Result<Value, BackendError> {
            Ok(json!([]))
        }
    }

    fn service(backend: Arc<CountingBackend>) -> DetailService {
        DetailService::new(
            backend,
            Duration::from_secs(3600),
            NonZeroUsize::new(8).expect("capacity"),
        )
    }

    #[tokio::test]
    async fn matching_slug_loads_the_record() {
        let service = service(Arc::new(CountingBackend::default()));
        let page = service.load::<Job>("rust-engineer", 1).await.expect("page");
        assert_eq!(page.item.id, 1);
        assert_eq!(page.path, "/jobs/rust-engineer/1");
    }

    #[tokio::test]
    async fn wrong_slug_is_rejected() {
        let service = service(Arc::new(CountingBackend::default()));
        let err = service
            .load::<Job>("python-engineer", 1)
            .await
            .expect_err("mismatch");
        assert!(matches!(
            err,
            DetailError::Domain(DomainError::SlugMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn empty_data_and_404_are_not_found() {
        let service = service(Arc::new(CountingBackend::default()));
        for id in [2, 3] {
            let err = service.load::<Job>("any", id).await.expect_err("missing");
            assert!(matches!(
                err,
                DetailError::Domain(DomainError::NotFound { .. })
            ));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn records_are_reused_until_revalidation() {
        let backend = Arc::new(CountingBackend::default());
        let service = service(Arc::clone(&backend));

        service.load::<Job>("rust-engineer", 1).await.expect("first");
        service.load::<Job>("rust-engineer", 1).await.expect("cached");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(3601)).await;
        service.load::<Job>("rust-engineer", 1).await.expect("refetched");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }
}
