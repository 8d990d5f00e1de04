#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use devhub::application::backend::{BackendError, ListingBackend, decode_records};
use devhub::domain::entities::{FacetOption, Hackathon};
use devhub::domain::types::{FacetSource, ListingKind};
use serde_json::{Value, json};
use url::form_urlencoded;

/// In-memory stand-in for the content backend.
///
/// Listings page by offset: the cursor is the index of the next record. A
/// `category` parameter keeps records whose `category` field is one of the
/// comma-separated ids.
#[derive(Default)]
pub struct FakeBackend {
    listings: Mutex<HashMap<ListingKind, Vec<Value>>>,
    active: Mutex<Vec<Value>>,
    facets: Mutex<HashMap<&'static str, Vec<Value>>>,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    list_queries: Mutex<Vec<(ListingKind, String)>>,
    sitemap_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(self, kind: ListingKind, items: Vec<Value>) -> Self {
        self.listings
            .lock()
            .expect("listings lock")
            .insert(kind, items);
        self
    }

    pub fn with_active(self, items: Vec<Value>) -> Self {
        *self.active.lock().expect("active lock") = items;
        self
    }

    pub fn with_facet(self, endpoint: &'static str, options: Vec<Value>) -> Self {
        self.facets
            .lock()
            .expect("facets lock")
            .insert(endpoint, options);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold every `list` reply back by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Query strings received by `list`, in order.
    pub fn list_queries(&self, kind: ListingKind) -> Vec<String> {
        self.list_queries
            .lock()
            .expect("queries lock")
            .iter()
            .filter(|(listed, _)| *listed == kind)
            .map(|(_, query)| query.clone())
            .collect()
    }

    pub fn sitemap_calls(&self) -> usize {
        self.sitemap_calls.load(Ordering::SeqCst)
    }

    fn check(&self, path: String) -> Result<(), BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Status { path, status: 503 });
        }
        Ok(())
    }

    fn records(&self, kind: ListingKind) -> Vec<Value> {
        self.listings
            .lock()
            .expect("listings lock")
            .get(&kind)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ListingBackend for FakeBackend {
    async fn list(&self, kind: ListingKind, query: &str) -> Result<Value, BackendError> {
        self.list_queries
            .lock()
            .expect("queries lock")
            .push((kind, query.to_string()));
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.check(kind.path())?;

        let params: HashMap<String, String> = form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let offset: usize = params
            .get("cursor")
            .and_then(|cursor| cursor.parse().ok())
            .unwrap_or(0);
        let limit: usize = params
            .get("limit")
            .and_then(|limit| limit.parse().ok())
            .unwrap_or(10);
        let categories: Option<Vec<&str>> = params
            .get("category")
            .map(|value| value.split(',').collect());

        let matching: Vec<Value> = self
            .records(kind)
            .into_iter()
            .filter(|record| match &categories {
                Some(wanted) => record["category"]
                    .as_str()
                    .is_some_and(|category| wanted.contains(&category)),
                None => true,
            })
            .collect();
        let page: Vec<Value> = matching.iter().skip(offset).take(limit).cloned().collect();
        let next = offset + page.len();
        let next_cursor = (next < matching.len()).then(|| next.to_string());

        Ok(json!({
            "data": page,
            "nextCursor": next_cursor,
            "hasMore": next_cursor.is_some(),
        }))
    }

    async fn facets(&self, source: &FacetSource) -> Result<Vec<FacetOption>, BackendError> {
        self.check(source.endpoint.to_string())?;
        let options = self
            .facets
            .lock()
            .expect("facets lock")
            .get(source.endpoint)
            .cloned()
            .unwrap_or_default();
        decode_records(source.endpoint, Value::Array(options))
    }

    async fn detail(&self, kind: ListingKind, id: i64) -> Result<Value, BackendError> {
        self.check(format!("{}/{id}", kind.path()))?;
        let found: Vec<Value> = self
            .records(kind)
            .into_iter()
            .filter(|record| record["id"].as_i64() == Some(id))
            .collect();
        Ok(json!({ "data": found }))
    }

    async fn active_hackathons(&self) -> Result<Vec<Hackathon>, BackendError> {
        self.check("/hackathons/active".to_string())?;
        let active = self.active.lock().expect("active lock").clone();
        decode_records("/hackathons/active", Value::Array(active))
    }

    async fn sitemap_items(&self, kind: ListingKind) -> Result<Value, BackendError> {
        self.sitemap_calls.fetch_add(1, Ordering::SeqCst);
        self.check(format!("{}/sitemap", kind.path()))?;
        Ok(json!({ "data": self.records(kind) }))
    }
}

pub fn hackathon(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "thumbnail_url": format!("https://cdn.example.com/h{id}.png"),
        "updated_at": "2024-03-01T12:00:00Z",
    })
}

pub fn job(id: i64, title: &str, category: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "company_name": "Acme",
        "company_logo": format!("https://cdn.example.com/logo{id}.png"),
        "category": category,
        "updated_at": "2024-04-02T08:00:00Z",
    })
}

pub fn resource(id: i64, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "updated_at": "2024-02-10",
    })
}

pub fn facet(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "updated_at": "2024-01-15T00:00:00Z",
        "created_at": "2024-01-01T00:00:00Z",
    })
}

/// `count` jobs numbered from `first`, all in `category`.
pub fn jobs(first: i64, count: i64, category: &str) -> Vec<Value> {
    (first..first + count)
        .map(|id| job(id, &format!("Job {id}"), category))
        .collect()
}
