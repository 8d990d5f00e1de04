//! A listing view: filter controls wired to an infinite-scroll controller.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::application::scroll::{InfiniteScroll, ScrollView};
use crate::application::sync::FilterSync;
use crate::domain::entities::Identified;

const SOURCE: &str = "application::session";

/// Resets the list and loads page one whenever the filter key changes.
///
/// The reset happens as soon as the change is observed, before the first page
/// of the new key is requested; a fetch still running for the old key becomes
/// stale and commits nothing.
pub struct ListingSession<T> {
    filters: FilterSync,
    scroll: Arc<InfiniteScroll<T>>,
    watcher: JoinHandle<()>,
}

impl<T> ListingSession<T>
where
    T: Identified + Clone + Send + Sync + 'static,
{
    /// `scroll` should already be seeded for the store's current key.
    pub fn start(filters: FilterSync, scroll: Arc<InfiniteScroll<T>>) -> Self {
        let mut changes = filters.subscribe();

        let watcher = tokio::spawn({
            let filters = filters.clone();
            let scroll = Arc::clone(&scroll);
            async move {
                while changes.changed().await.is_ok() {
                    let key = changes.borrow_and_update().clone();
                    filters.hydrate();
                    if scroll.key() == key {
                        continue;
                    }
                    debug!(
                        target = SOURCE,
                        listing = %filters.kind(),
                        key = %key,
                        "reloading listing for new filters"
                    );
                    let pending = scroll.begin_reload(key);
                    let scroll = Arc::clone(&scroll);
                    tokio::spawn(async move {
                        scroll.complete_reload(pending).await;
                    });
                }
            }
        });

        Self {
            filters,
            scroll,
            watcher,
        }
    }

    pub fn filters(&self) -> &FilterSync {
        &self.filters
    }

    pub fn scroll(&self) -> &Arc<InfiniteScroll<T>> {
        &self.scroll
    }

    pub fn view(&self) -> ScrollView<T> {
        self.scroll.view()
    }
}

impl<T> Drop for ListingSession<T> {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}
