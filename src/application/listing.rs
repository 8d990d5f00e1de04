//! Initial state of a listing page: first page, facet options and decoded filters.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::application::backend::{BackendError, ListingBackend, list_page};
use crate::application::filters::{FilterState, QueryString};
use crate::application::pagination::{PageRequest, dedup_by_id};
use crate::application::scroll::{
    DEFAULT_VISIBILITY_THRESHOLD, InfiniteScroll, ListingFetcher, ScrollOptions, Seed,
};
use crate::application::session::ListingSession;
use crate::application::sync::{FilterSync, UrlStore};
use crate::domain::entities::{FacetOption, Listed};
use crate::domain::types::ListingKind;

const SOURCE: &str = "application::listing";
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Serialize)]
pub struct SortOptionView {
    pub value: &'static str,
    pub label: &'static str,
}

/// Everything a listing page renders before the first scroll.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialListing<T> {
    pub listing: ListingKind,
    /// Filter key the infinite-scroll controller starts with.
    pub key: String,
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub facets: BTreeMap<&'static str, Vec<FacetOption>>,
    pub filters: FilterState,
    pub sort_options: Vec<SortOptionView>,
}

pub struct ListingService {
    backend: Arc<dyn ListingBackend>,
    page_size: usize,
    debounce: Duration,
    visibility_threshold: f64,
}

impl ListingService {
    pub fn new(backend: Arc<dyn ListingBackend>, page_size: usize) -> Self {
        Self {
            backend,
            page_size,
            debounce: DEFAULT_DEBOUNCE,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        }
    }

    /// Timing used by sessions opened through [`ListingService::session`].
    pub fn with_session_timing(mut self, debounce: Duration, visibility_threshold: f64) -> Self {
        self.debounce = debounce;
        self.visibility_threshold = visibility_threshold;
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Open a listing session on `store`, seeded with page one for its current query.
    pub async fn session<T>(&self, store: Arc<dyn UrlStore>) -> ListingSession<T>
    where
        T: Listed + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let initial = self.initial::<T>(Some(&store.current())).await;
        // Later pages are requested with the URL's key, so it must match page one's.
        if initial.key != store.current() {
            store.replace(&initial.key);
        }
        let filters = FilterSync::new(T::KIND, Arc::clone(&store), self.debounce);
        let scroll = Arc::new(InfiniteScroll::new(
            Arc::new(ListingFetcher::new(Arc::clone(&self.backend), self.page_size)),
            ScrollOptions {
                limit: self.page_size,
                visibility_threshold: self.visibility_threshold,
            },
            filters.key(),
            Seed::new(initial.items, initial.next_cursor),
        ));
        ListingSession::start(filters, scroll)
    }

    /// Load page one and the facet options concurrently.
    ///
    /// A backend failure yields an empty listing rather than an error.
    pub async fn initial<T>(&self, raw_query: Option<&str>) -> InitialListing<T>
    where
        T: Listed + DeserializeOwned,
    {
        let kind = T::KIND;
        let query = QueryString::parse(raw_query.unwrap_or_default()).collapse_repeated();
        let filters = FilterState::parse(kind, &query);
        let key = filters.to_query(kind).to_string();

        let mut listing = InitialListing {
            listing: kind,
            key,
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
            facets: BTreeMap::new(),
            filters,
            sort_options: kind
                .sort_options()
                .iter()
                .map(|order| SortOptionView {
                    value: order.as_str(),
                    label: order.label(),
                })
                .collect(),
        };

        match self.fetch::<T>(kind, &listing.key).await {
            Ok(page) => {
                debug!(
                    target = SOURCE,
                    listing = %kind,
                    items = page.items.len(),
                    "initial listing loaded"
                );
                listing.has_more = page.items.len() >= self.page_size;
                listing.items = page.items;
                listing.next_cursor = page.next_cursor;
                listing.facets = page.facets;
            }
            Err(err) => {
                metrics::counter!("devhub_listing_fallbacks_total", "listing" => kind.as_str())
                    .increment(1);
                warn!(
                    target = SOURCE,
                    listing = %kind,
                    error = %err,
                    "failed to load listing; rendering empty state"
                );
            }
        }
        listing
    }

    async fn fetch<T>(&self, kind: ListingKind, key: &str) -> Result<FirstPage<T>, BackendError>
    where
        T: Listed + DeserializeOwned,
    {
        let request = PageRequest::new(self.page_size, None).query_for(key);
        let backend = self.backend.as_ref();
        let sources = kind.facet_sources();
        let (page, options) = tokio::try_join!(
            list_page::<T>(backend, kind, &request),
            try_join_all(sources.iter().map(|source| backend.facets(source))),
        )?;
        Ok(FirstPage {
            items: dedup_by_id(page.data),
            next_cursor: page.next_cursor,
            facets: sources.iter().map(|source| source.name).zip(options).collect(),
        })
    }
}

struct FirstPage<T> {
    items: Vec<T>,
    next_cursor: Option<String>,
    facets: BTreeMap<&'static str, Vec<FacetOption>>,
}
