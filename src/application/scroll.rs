//! Infinite-scroll controller.
//!
//! Owns the accumulated item list of one listing view. Pages are appended when
//! the end-of-list sentinel becomes visible, and the list is reset whenever the
//! filter key (the canonical query string) changes. Every fetch is tagged with
//! the generation it started in; a fetch that resolves after a reset commits
//! nothing, so results for an old filter never leak into the new list.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::backend::{BackendError, ListingBackend, list_page};
use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{Identified, Listed};
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::scroll";

/// Default visibility ratio above which the sentinel counts as seen.
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.1;

/// Loads one page for a filter key.
#[async_trait]
pub trait PageFetcher<T>: Send + Sync {
    async fn fetch_page(&self, key: &str, cursor: Option<&str>) -> Result<Page<T>, BackendError>;
}

/// Fetches pages of a listing through the backend, adding `cursor` and `limit`
/// to the filter key.
pub struct ListingFetcher {
    backend: Arc<dyn ListingBackend>,
    limit: usize,
}

impl ListingFetcher {
    pub fn new(backend: Arc<dyn ListingBackend>, limit: usize) -> Self {
        Self { backend, limit }
    }
}

#[async_trait]
impl<T> PageFetcher<T> for ListingFetcher
where
    T: Listed + serde::de::DeserializeOwned + Send + 'static,
{
    async fn fetch_page(&self, key: &str, cursor: Option<&str>) -> Result<Page<T>, BackendError> {
        let query = PageRequest::new(self.limit, cursor).query_for(key);
        list_page(self.backend.as_ref(), T::KIND, &query).await
    }
}

/// Items and cursor the list starts from for a key, normally rendered up front.
#[derive(Debug, Clone)]
pub struct Seed<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

impl<T> Default for Seed<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
        }
    }
}

impl<T> Seed<T> {
    pub fn new(items: Vec<T>, cursor: Option<String>) -> Self {
        Self { items, cursor }
    }
}

#[derive(Debug, Clone)]
pub struct ScrollOptions {
    /// Page size requested from the backend.
    pub limit: usize,
    pub visibility_threshold: f64,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        }
    }
}

/// What a call to [`InfiniteScroll::load_more`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A fetch was already in flight or the list is exhausted.
    Skipped,
    /// `returned` items arrived, `added` of them were new.
    Appended { returned: usize, added: usize },
    /// The backend returned an empty page.
    Exhausted,
    Failed,
    /// The key changed while fetching; the result was dropped.
    Stale,
}

/// Rendering state of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStatus {
    Loading,
    Failed,
    /// Nothing matched the filters.
    Empty,
    Ready,
    /// Every page has been loaded.
    Complete,
}

/// Snapshot of the controller for rendering.
#[derive(Debug, Clone)]
pub struct ScrollView<T> {
    pub key: String,
    pub items: Vec<T>,
    pub cursor: Option<String>,
    pub loading: bool,
    pub has_more: bool,
    pub error: Option<Arc<BackendError>>,
}

impl<T> ScrollView<T> {
    pub fn status(&self) -> ListStatus {
        if self.loading {
            ListStatus::Loading
        } else if self.error.is_some() {
            ListStatus::Failed
        } else if self.items.is_empty() {
            ListStatus::Empty
        } else if self.has_more {
            ListStatus::Ready
        } else {
            ListStatus::Complete
        }
    }
}

struct ScrollState<T> {
    key: String,
    generation: u64,
    seed: Seed<T>,
    items: Vec<T>,
    seen: HashSet<i64>,
    cursor: Option<String>,
    loading: bool,
    has_more: bool,
    error: Option<Arc<BackendError>>,
}

impl<T: Identified + Clone> ScrollState<T> {
    fn reseed(&mut self, key: String, limit: usize) {
        self.key = key;
        self.generation += 1;
        self.items.clear();
        self.seen.clear();
        let seed = self.seed.items.clone();
        self.extend_unique(seed);
        self.cursor = self.seed.cursor.clone();
        self.has_more = self.seed.items.len() >= limit;
        self.loading = false;
        self.error = None;
    }

    fn extend_unique(&mut self, items: Vec<T>) -> usize {
        let before = self.items.len();
        for item in items {
            if self.seen.insert(item.id()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }
}

/// Accumulates cursor-paginated pages of `T` for the current filter key.
pub struct InfiniteScroll<T> {
    fetcher: Arc<dyn PageFetcher<T>>,
    options: ScrollOptions,
    state: Mutex<ScrollState<T>>,
}

impl<T> InfiniteScroll<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    pub fn new(
        fetcher: Arc<dyn PageFetcher<T>>,
        options: ScrollOptions,
        key: impl Into<String>,
        seed: Seed<T>,
    ) -> Self {
        let mut state = ScrollState {
            key: String::new(),
            generation: 0,
            seed,
            items: Vec::new(),
            seen: HashSet::new(),
            cursor: None,
            loading: false,
            has_more: false,
            error: None,
        };
        state.reseed(key.into(), options.limit);
        Self {
            fetcher,
            options,
            state: Mutex::new(state),
        }
    }

    pub fn limit(&self) -> usize {
        self.options.limit
    }

    pub fn key(&self) -> String {
        self.lock("key").key.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.lock("is_loading").loading
    }

    pub fn has_more(&self) -> bool {
        self.lock("has_more").has_more
    }

    pub fn items(&self) -> Vec<T> {
        self.lock("items").items.clone()
    }

    pub fn error(&self) -> Option<Arc<BackendError>> {
        self.lock("error").error.clone()
    }

    pub fn view(&self) -> ScrollView<T> {
        let state = self.lock("view");
        ScrollView {
            key: state.key.clone(),
            items: state.items.clone(),
            cursor: state.cursor.clone(),
            loading: state.loading,
            has_more: state.has_more,
            error: state.error.clone(),
        }
    }

    /// Reset to the stored seed if `key` differs from the current key.
    ///
    /// Returns whether a reset happened. Any fetch in flight becomes stale.
    pub fn observe_key(&self, key: &str) -> bool {
        let mut state = self.lock("observe_key");
        if state.key == key {
            return false;
        }
        state.reseed(key.to_string(), self.options.limit);
        debug!(
            target = SOURCE,
            key,
            generation = state.generation,
            "filter key changed; list reset"
        );
        true
    }

    /// Replace the stored seed and reset to it under `key`, whether or not the
    /// key changed.
    pub fn reset_with(&self, key: impl Into<String>, seed: Seed<T>) {
        let mut state = self.lock("reset_with");
        state.seed = seed;
        state.reseed(key.into(), self.options.limit);
        debug!(
            target = SOURCE,
            key = %state.key,
            generation = state.generation,
            seeded = state.items.len(),
            "list reseeded"
        );
    }

    /// Fetch the next page if no fetch is in flight and more pages may exist.
    pub async fn load_more(&self) -> LoadOutcome {
        let (generation, key, cursor) = {
            let mut state = self.lock("load_more");
            if state.loading || !state.has_more {
                return LoadOutcome::Skipped;
            }
            state.loading = true;
            (state.generation, state.key.clone(), state.cursor.clone())
        };

        let result = self.fetcher.fetch_page(&key, cursor.as_deref()).await;
        self.commit(generation, &key, result, false)
    }

    /// Fetch page one for the current key and replace the list with it.
    ///
    /// Skipped only while another fetch is in flight.
    pub async fn reload(&self) -> LoadOutcome {
        let pending = {
            let mut state = self.lock("reload");
            if state.loading {
                return LoadOutcome::Skipped;
            }
            state.loading = true;
            PendingReload {
                generation: state.generation,
                key: state.key.clone(),
            }
        };
        self.complete_reload(pending).await
    }

    /// Empty the list under `key` and mark page one as loading.
    ///
    /// The list reads as loading, never as empty, until the returned reload is
    /// completed or overtaken by another reset.
    pub fn begin_reload(&self, key: impl Into<String>) -> PendingReload {
        let mut state = self.lock("begin_reload");
        state.seed = Seed::default();
        state.reseed(key.into(), self.options.limit);
        state.loading = true;
        debug!(
            target = SOURCE,
            key = %state.key,
            generation = state.generation,
            "list emptied for reload"
        );
        PendingReload {
            generation: state.generation,
            key: state.key.clone(),
        }
    }

    /// Fetch page one for a reload started by [`InfiniteScroll::begin_reload`].
    pub async fn complete_reload(&self, pending: PendingReload) -> LoadOutcome {
        let PendingReload { generation, key } = pending;
        let result = self.fetcher.fetch_page(&key, None).await;
        self.commit(generation, &key, result, true)
    }

    fn commit(
        &self,
        generation: u64,
        key: &str,
        result: Result<Page<T>, BackendError>,
        replace: bool,
    ) -> LoadOutcome {
        let mut state = self.lock("commit");
        if state.generation != generation {
            metrics::counter!("devhub_scroll_stale_pages_total").increment(1);
            debug!(
                target = SOURCE,
                key,
                started = generation,
                current = state.generation,
                "discarded page fetched for a previous filter key"
            );
            return LoadOutcome::Stale;
        }
        state.loading = false;

        match result {
            Ok(page) => {
                state.error = None;
                if replace {
                    state.items.clear();
                    state.seen.clear();
                }
                if page.data.is_empty() {
                    state.has_more = false;
                    state.cursor = None;
                    return LoadOutcome::Exhausted;
                }
                let returned = page.data.len();
                let added = state.extend_unique(page.data);
                state.cursor = page.next_cursor;
                state.has_more = returned >= self.options.limit && state.cursor.is_some();
                LoadOutcome::Appended { returned, added }
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    key,
                    error = %err,
                    "failed to load listing page"
                );
                state.error = Some(Arc::new(err));
                // Page one never arrived: the next load_more asks for it again.
                if replace && state.items.is_empty() {
                    state.cursor = None;
                    state.has_more = true;
                }
                LoadOutcome::Failed
            }
        }
    }

    /// Whether a visibility report of `ratio` should trigger a load.
    pub fn should_load(&self, ratio: f64) -> bool {
        if ratio <= self.options.visibility_threshold {
            return false;
        }
        let state = self.lock("should_load");
        !state.loading && state.has_more
    }

    /// Start consuming sentinel visibility reports.
    ///
    /// Reports are handled one at a time; each report above the threshold that
    /// finds the gate open triggers exactly one `load_more`. The task ends when
    /// every [`Sentinel`] is dropped or the controller goes away.
    pub fn attach_sentinel(self: &Arc<Self>) -> (Sentinel, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<f64>();
        let controller: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(ratio) = rx.recv().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                if controller.should_load(ratio) {
                    controller.load_more().await;
                }
            }
        });
        (Sentinel { tx }, task)
    }

    fn lock(&self, op: &'static str) -> std::sync::MutexGuard<'_, ScrollState<T>> {
        mutex_lock(&self.state, SOURCE, op)
    }
}

/// A page-one fetch owed to the generation that started it.
#[derive(Debug)]
#[must_use = "complete the reload or the list stays loading"]
pub struct PendingReload {
    generation: u64,
    key: String,
}

/// Handle reporting how much of the end-of-list marker is visible.
#[derive(Debug, Clone)]
pub struct Sentinel {
    tx: mpsc::UnboundedSender<f64>,
}

impl Sentinel {
    /// Report the visible ratio (0.0 to 1.0). Returns false once the
    /// controller stopped listening.
    pub fn report(&self, ratio: f64) -> bool {
        self.tx.send(ratio).is_ok()
    }
}
