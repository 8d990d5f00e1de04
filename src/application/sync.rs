//! Keeps a listing's filter controls and its URL query string in step.
//!
//! Every control handler edits the query string of the current URL (replacing the
//! history entry, never pushing) and then re-derives [`FilterState`] from it.
//! Nothing else writes filter state, so the URL stays the single source of truth
//! and back/forward navigation is handled by [`FilterSync::hydrate`].

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use time::Date;
use time::macros::format_description;
use tokio::sync::watch;
use tracing::debug;

use crate::application::debounce::Debouncer;
use crate::application::filters::{
    ALL_SENTINEL, CUSTOM_DATE, DATE_PARAM, END_DATE_PARAM, FilterState, KEYWORD_PARAM,
    QueryString, SORT_PARAM, START_DATE_PARAM, filter_params,
};
use crate::domain::error::DomainError;
use crate::domain::types::{ListingKind, SortOrder};
use crate::util::lock::mutex_lock;

const SOURCE: &str = "application::sync";

/// Where the current query string lives.
pub trait UrlStore: Send + Sync {
    /// Query string of the current location, without the leading `?`.
    fn current(&self) -> String;

    /// Replace the current history entry's query string.
    fn replace(&self, query: &str);

    /// Observe the current query string, including back/forward navigation.
    fn subscribe(&self) -> watch::Receiver<String>;
}

/// In-process history with back/forward navigation.
pub struct MemoryHistory {
    entries: Mutex<HistoryEntries>,
    current: watch::Sender<String>,
}

struct HistoryEntries {
    stack: Vec<String>,
    index: usize,
}

impl MemoryHistory {
    pub fn new(initial: &str) -> Self {
        let initial = normalize(initial);
        let (current, _) = watch::channel(initial.clone());
        Self {
            entries: Mutex::new(HistoryEntries {
                stack: vec![initial],
                index: 0,
            }),
            current,
        }
    }

    /// Navigate to a new entry, dropping any forward entries.
    pub fn push(&self, query: &str) {
        let query = normalize(query);
        let mut entries = mutex_lock(&self.entries, SOURCE, "history.push");
        let keep = entries.index + 1;
        entries.stack.truncate(keep);
        entries.stack.push(query.clone());
        entries.index = keep;
        drop(entries);
        self.publish(query);
    }

    pub fn back(&self) -> bool {
        self.step(-1)
    }

    pub fn forward(&self) -> bool {
        self.step(1)
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "history.len").stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn step(&self, delta: isize) -> bool {
        let mut entries = mutex_lock(&self.entries, SOURCE, "history.step");
        let Some(target) = entries.index.checked_add_signed(delta) else {
            return false;
        };
        let Some(query) = entries.stack.get(target).cloned() else {
            return false;
        };
        entries.index = target;
        drop(entries);
        self.publish(query);
        true
    }

    fn publish(&self, query: String) {
        self.current.send_if_modified(|current| {
            if *current == query {
                return false;
            }
            *current = query;
            true
        });
    }
}

impl UrlStore for MemoryHistory {
    fn current(&self) -> String {
        self.current.borrow().clone()
    }

    fn replace(&self, query: &str) {
        let query = normalize(query);
        let mut entries = mutex_lock(&self.entries, SOURCE, "history.replace");
        let index = entries.index;
        if let Some(entry) = entries.stack.get_mut(index) {
            *entry = query.clone();
        }
        drop(entries);
        self.publish(query);
    }

    fn subscribe(&self) -> watch::Receiver<String> {
        self.current.subscribe()
    }
}

fn normalize(query: &str) -> String {
    query.strip_prefix('?').unwrap_or(query).to_string()
}

#[derive(Debug, Clone)]
struct Controls {
    filters: FilterState,
    /// Text in the search box; committed to the URL after the debounce delay.
    keyword_input: String,
    amount_input: u64,
    date_picker_open: bool,
}

struct SyncInner {
    kind: ListingKind,
    store: Arc<dyn UrlStore>,
    controls: Mutex<Controls>,
    keyword: Debouncer<String>,
    amount: Debouncer<u64>,
}

/// Filter controls of one listing bound to a [`UrlStore`].
#[derive(Clone)]
pub struct FilterSync {
    inner: Arc<SyncInner>,
}

impl FilterSync {
    /// `debounce` applies to the keyword box and the amount slider.
    pub fn new(kind: ListingKind, store: Arc<dyn UrlStore>, debounce: Duration) -> Self {
        let filters = FilterState::parse_str(kind, &store.current());
        let controls = Controls {
            keyword_input: filters.keyword.clone(),
            amount_input: filters.amount,
            filters,
            date_picker_open: false,
        };
        let inner = Arc::new_cyclic(|weak: &Weak<SyncInner>| {
            let keyword_target = weak.clone();
            let amount_target = weak.clone();
            SyncInner {
                kind,
                store,
                controls: Mutex::new(controls),
                keyword: Debouncer::new(debounce, move |keyword: String| {
                    if let Some(inner) = keyword_target.upgrade() {
                        inner.commit_keyword(&keyword);
                    }
                }),
                amount: Debouncer::new(debounce, move |amount: u64| {
                    if let Some(inner) = amount_target.upgrade() {
                        inner.commit_amount(amount);
                    }
                }),
            }
        });
        Self { inner }
    }

    pub fn kind(&self) -> ListingKind {
        self.inner.kind
    }

    /// The filter key: the current canonical query string.
    pub fn key(&self) -> String {
        self.inner.store.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.inner.store.subscribe()
    }

    pub fn filters(&self) -> FilterState {
        self.inner.controls().filters.clone()
    }

    pub fn keyword_input(&self) -> String {
        self.inner.controls().keyword_input.clone()
    }

    pub fn amount_input(&self) -> u64 {
        self.inner.controls().amount_input
    }

    pub fn date_picker_open(&self) -> bool {
        self.inner.controls().date_picker_open
    }

    /// Re-derive the filters from the URL, e.g. after back/forward navigation.
    pub fn hydrate(&self) -> FilterState {
        let current = self.inner.store.current();
        self.inner.refresh(&current)
    }

    /// Add `value` to a multi-select parameter. `all` clears the parameter;
    /// `custom` on the date facet opens the range picker instead.
    pub fn select(&self, param: &str, value: &str) -> Result<(), DomainError> {
        self.inner.ensure_multi(param)?;
        if param == DATE_PARAM && value == CUSTOM_DATE {
            self.inner.controls().date_picker_open = true;
            return Ok(());
        }
        self.inner.edit("select", |query| {
            if value == ALL_SENTINEL {
                query.delete(param);
                return;
            }
            let mut values = split(query.get(param));
            if !values.iter().any(|existing| existing == value) {
                values.push(value.to_string());
            }
            query.set(param, &values.join(","));
        });
        Ok(())
    }

    /// Remove one chip from a multi-select parameter.
    pub fn remove(&self, param: &str, value: &str) -> Result<(), DomainError> {
        self.inner.ensure_multi(param)?;
        self.inner.edit("remove", |query| {
            let values: Vec<String> = split(query.get(param))
                .into_iter()
                .filter(|existing| existing != value)
                .collect();
            if values.is_empty() {
                query.delete(param);
            } else {
                query.set(param, &values.join(","));
            }
        });
        Ok(())
    }

    /// Update the search box; the URL follows after the debounce delay.
    pub fn set_keyword(&self, text: &str) {
        self.inner.controls().keyword_input = text.to_string();
        self.inner.keyword.call(text.to_string());
    }

    /// Move the price/salary slider; the URL follows after the debounce delay.
    pub fn set_amount(&self, amount: u64) -> Result<(), DomainError> {
        if self.inner.kind.amount_param().is_none() {
            return Err(DomainError::validation(format!(
                "{} has no amount filter",
                self.inner.kind
            )));
        }
        self.inner.controls().amount_input = amount;
        self.inner.amount.call(amount);
        Ok(())
    }

    pub fn set_sort(&self, order: SortOrder) -> Result<(), DomainError> {
        if !self.inner.kind.sort_options().contains(&order) {
            return Err(DomainError::validation(format!(
                "{} cannot be sorted by `{}`",
                self.inner.kind,
                order.as_str()
            )));
        }
        self.inner.edit("set_sort", |query| {
            if order == SortOrder::default() {
                query.delete(SORT_PARAM);
            } else {
                query.set(SORT_PARAM, order.as_str());
            }
        });
        Ok(())
    }

    pub fn set_start_date(&self, date: Option<Date>) -> Result<(), DomainError> {
        self.set_date(START_DATE_PARAM, date)
    }

    pub fn set_end_date(&self, date: Option<Date>) -> Result<(), DomainError> {
        self.set_date(END_DATE_PARAM, date)
    }

    pub fn close_date_picker(&self) {
        self.inner.controls().date_picker_open = false;
    }

    /// Remove every filter parameter in one URL update. Pending debounced
    /// edits are dropped so they cannot re-add a cleared filter.
    pub fn clear_all(&self) {
        self.inner.keyword.cancel();
        self.inner.amount.cancel();
        let kind = self.inner.kind;
        self.inner.edit("clear_all", |query| {
            for param in filter_params(kind) {
                query.delete(param);
            }
        });
        let mut controls = self.inner.controls();
        controls.keyword_input.clear();
        controls.amount_input = 0;
        controls.date_picker_open = false;
    }

    fn set_date(&self, param: &'static str, date: Option<Date>) -> Result<(), DomainError> {
        if !self.inner.kind.has_date_range() {
            return Err(DomainError::validation(format!(
                "{} has no date range",
                self.inner.kind
            )));
        }
        let formatted = date
            .map(|date| date.format(format_description!("[year]-[month]-[day]")))
            .transpose()
            .map_err(|err| DomainError::validation(format!("invalid date: {err}")))?;
        self.inner.edit("set_date", |query| match formatted.as_deref() {
            Some(value) => query.set(param, value),
            None => query.delete(param),
        });
        Ok(())
    }
}

impl SyncInner {
    fn controls(&self) -> std::sync::MutexGuard<'_, Controls> {
        mutex_lock(&self.controls, SOURCE, "controls")
    }

    fn ensure_multi(&self, param: &str) -> Result<(), DomainError> {
        if self.kind.multi_params().iter().any(|known| *known == param) {
            Ok(())
        } else {
            Err(DomainError::validation(format!(
                "`{param}` is not a {} filter",
                self.kind
            )))
        }
    }

    /// Apply `change` to the current query string and publish the result.
    fn edit(&self, op: &'static str, change: impl FnOnce(&mut QueryString)) {
        let current = self.store.current();
        let mut query = QueryString::parse(&current);
        change(&mut query);
        let next = query.to_string();
        if next != current {
            debug!(target = SOURCE, op, listing = %self.kind, query = %next, "filters changed");
            self.store.replace(&next);
        }
        self.refresh(&next);
    }

    fn refresh(&self, query: &str) -> FilterState {
        let filters = FilterState::parse_str(self.kind, query);
        let mut controls = self.controls();
        if !self.keyword.is_pending() {
            controls.keyword_input = filters.keyword.clone();
        }
        if !self.amount.is_pending() {
            controls.amount_input = filters.amount;
        }
        controls.filters = filters.clone();
        filters
    }

    fn commit_keyword(&self, keyword: &str) {
        self.edit("keyword", |query| {
            if keyword.is_empty() {
                query.delete(KEYWORD_PARAM);
            } else {
                query.set(KEYWORD_PARAM, keyword);
            }
        });
    }

    fn commit_amount(&self, amount: u64) {
        let Some(param) = self.kind.amount_param() else {
            return;
        };
        self.edit("amount", |query| {
            if amount == 0 {
                query.delete(param);
            } else {
                query.set(param, &amount.to_string());
            }
        });
    }
}

fn split(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    fn sync(kind: ListingKind, initial: &str) -> (Arc<MemoryHistory>, FilterSync) {
        let history = Arc::new(MemoryHistory::new(initial));
        let store: Arc<dyn UrlStore> = history.clone();
        (history, FilterSync::new(kind, store, Duration::from_millis(300)))
    }

    #[tokio::test]
    async fn selecting_appends_and_all_clears() {
        let (history, sync) = sync(ListingKind::Hackathons, "");
        sync.select("category", "5").expect("select");
        assert_eq!(history.current(), "category=5");
        sync.select("category", "7").expect("select");
        sync.select("category", "5").expect("select again");
        assert_eq!(sync.filters().selected("category"), ["5", "7"]);

        sync.select("category", ALL_SENTINEL).expect("all");
        assert_eq!(history.current(), "");
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn removing_the_last_chip_drops_the_param() {
        let (history, sync) = sync(ListingKind::Jobs, "job_type=1,2&keyword=rust");
        sync.remove("job_type", "1").expect("remove");
        assert_eq!(history.current(), "job_type=2&keyword=rust");
        sync.remove("job_type", "2").expect("remove");
        assert_eq!(history.current(), "keyword=rust");
    }

    #[tokio::test]
    async fn unknown_params_are_rejected() {
        let (history, sync) = sync(ListingKind::Resources, "");
        assert!(sync.select("salary", "5").is_err());
        assert!(sync.set_amount(10).is_err());
        assert!(sync.set_sort(SortOrder::PrizeHigh).is_err());
        assert_eq!(history.current(), "");
    }

    #[tokio::test]
    async fn custom_date_opens_the_picker_only() {
        let (history, sync) = sync(ListingKind::Hackathons, "");
        sync.select(DATE_PARAM, CUSTOM_DATE).expect("custom");
        assert!(sync.date_picker_open());
        assert_eq!(history.current(), "");

        sync.set_start_date(Some(date!(2024 - 03 - 01))).expect("start");
        sync.set_end_date(Some(date!(2024 - 03 - 31))).expect("end");
        assert_eq!(history.current(), "startDate=2024-03-01&endDate=2024-03-31");
        sync.set_start_date(None).expect("clear start");
        assert_eq!(history.current(), "endDate=2024-03-31");
    }

    #[tokio::test]
    async fn newest_sort_is_implicit() {
        let (history, sync) = sync(ListingKind::Jobs, "");
        sync.set_sort(SortOrder::SalaryHigh).expect("sort");
        assert_eq!(history.current(), "sortby=salary_high");
        sync.set_sort(SortOrder::Newest).expect("sort");
        assert_eq!(history.current(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn keyword_reaches_the_url_after_the_delay() {
        let (history, sync) = sync(ListingKind::Hackathons, "");
        sync.set_keyword("z");
        sync.set_keyword("zk");
        assert_eq!(sync.keyword_input(), "zk");
        assert_eq!(history.current(), "");

        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(history.current(), "keyword=zk");
        assert_eq!(sync.filters().keyword, "zk");
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_edits_apply_to_the_latest_url() {
        let (history, sync) = sync(ListingKind::Jobs, "");
        sync.set_amount(90_000).expect("amount");
        sync.select("location", "3").expect("select");
        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(history.current(), "location=3&salary=90000");
    }

    #[tokio::test(start_paused = true)]
    async fn clear_all_drops_pending_edits() {
        let (history, sync) = sync(ListingKind::Hackathons, "category=5&sortby=oldest");
        sync.set_keyword("zk");
        tokio::time::sleep(Duration::from_millis(301)).await;
        assert_eq!(history.current(), "category=5&sortby=oldest&keyword=zk");

        sync.set_keyword("zk rollup");
        sync.clear_all();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(history.current(), "sortby=oldest");
        assert!(!sync.filters().is_filtered());
        assert_eq!(sync.keyword_input(), "");
    }

    #[tokio::test]
    async fn back_navigation_rehydrates() {
        let (history, sync) = sync(ListingKind::Resources, "category=1");
        history.push("category=2");
        assert_eq!(sync.hydrate().selected("category"), ["2"]);
        assert!(history.back());
        assert_eq!(sync.hydrate().selected("category"), ["1"]);
        assert!(!history.back());
        assert!(history.forward());
        assert_eq!(history.current(), "category=2");
    }
}
