//! Search scene controller: keeps the query, filters and result window in
//! step with the route and fetches pages from the search service.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Result;
use shared::protocol::{DocumentSummary, SearchHistoryEntry};
use tokio::{
    sync::{broadcast, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    documents::DocumentCache,
    location::{FilterChange, Location, SearchFilters},
    navigation::Navigator,
    reducer::{reduce_search, ResultRef, SearchAction, SearchState},
    DocumentSearchService, SearchHistoryStore,
};

const INPUT_DEBOUNCE: Duration = Duration::from_millis(250);
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct SearchDependencies {
    pub search: Arc<dyn DocumentSearchService>,
    pub history: Arc<dyn SearchHistoryStore>,
    pub navigator: Arc<dyn Navigator>,
    pub documents: DocumentCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Blank query; nothing was sent.
    EmptyQuery,
    /// Same query and parameters as the last request sent.
    Duplicate,
    /// Load-more requested while loading or after the last page.
    Exhausted,
    /// Route carried the same term and filters as the current state.
    Unchanged,
    Loaded { count: usize },
    /// Response arrived after a newer request started and was dropped.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKey {
    Enter,
    Escape,
    ArrowDown,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Searched(FetchOutcome),
    NavigatedBack(bool),
    FocusResults,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResultView {
    pub document: DocumentSummary,
    pub context: String,
}

pub struct SearchController {
    deps: SearchDependencies,
    state: RwLock<SearchState>,
    events: broadcast::Sender<SearchState>,
    input_generation: AtomicU64,
}

impl SearchController {
    pub fn new(deps: SearchDependencies, page_size: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            deps,
            state: RwLock::new(SearchState::new(page_size)),
            events,
            input_generation: AtomicU64::new(0),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SearchState> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SearchState {
        self.state.read().await.clone()
    }

    pub async fn show_empty_state(&self) -> bool {
        self.state.read().await.show_empty_state()
    }

    /// Current result window, resolved through the shared document cache.
    pub async fn results(&self) -> Vec<SearchResultView> {
        let results = self.state.read().await.results.clone();
        results
            .into_iter()
            .filter_map(|ResultRef { document_id, context }| {
                self.deps
                    .documents
                    .get(&document_id)
                    .map(|document| SearchResultView { document, context })
            })
            .collect()
    }

    /// Initializes the scene from the navigator's current location.
    pub async fn mount(&self) -> Result<FetchOutcome> {
        let location = self.deps.navigator.location();
        {
            let mut state = self.state.write().await;
            self.apply(
                &mut state,
                SearchAction::RouteChanged {
                    query: location.search_term(),
                    filters: SearchFilters::from_location(&location),
                },
            );
        }
        self.fetch_results().await
    }

    /// Reacts to a route change (typing committed, filter change, back or
    /// forward navigation). Only a changed term or filter set resets the
    /// window and fetches.
    pub async fn handle_location_change(&self, location: &Location) -> Result<FetchOutcome> {
        let query = location.search_term();
        let filters = SearchFilters::from_location(location);
        {
            let mut state = self.state.write().await;
            if state.query == query && state.filters == filters {
                return Ok(FetchOutcome::Unchanged);
            }
            info!(query = %query, filters = ?filters, "search route changed");
            self.apply(&mut state, SearchAction::RouteChanged { query, filters });
        }
        self.fetch_results().await
    }

    pub async fn fetch_results(&self) -> Result<FetchOutcome> {
        let (query, params, generation) = {
            let mut state = self.state.write().await;
            if state.query.trim().is_empty() {
                self.apply(&mut state, SearchAction::FetchSkipped { forget_query: true });
                return Ok(FetchOutcome::EmptyQuery);
            }

            let params = state.params();
            if state.is_duplicate(&params) {
                debug!(query = %state.query, offset = params.offset, "skipping duplicate search");
                self.apply(&mut state, SearchAction::FetchSkipped { forget_query: false });
                return Ok(FetchOutcome::Duplicate);
            }

            self.apply(
                &mut state,
                SearchAction::FetchStarted {
                    params: params.clone(),
                },
            );
            (state.query.clone(), params, state.generation)
        };

        debug!(query = %query, offset = params.offset, limit = params.limit, "searching");
        match self.deps.search.search(&query, &params).await {
            Ok(hits) => {
                let count = hits.len();
                let refs = hits
                    .into_iter()
                    .map(|hit| {
                        let document_id = hit.document.id.clone();
                        self.deps.documents.upsert(hit.document);
                        ResultRef {
                            document_id,
                            context: hit.context,
                        }
                    })
                    .collect();

                let mut state = self.state.write().await;
                if state.generation != generation {
                    debug!(query = %query, generation, "dropping stale search response");
                    return Ok(FetchOutcome::Stale);
                }
                self.apply(
                    &mut state,
                    SearchAction::FetchSucceeded {
                        generation,
                        hits: refs,
                    },
                );
                info!(
                    query = %query,
                    count,
                    offset = state.offset,
                    allow_load_more = state.allow_load_more,
                    "search page loaded"
                );
                drop(state);
                self.record_history(&query);
                Ok(FetchOutcome::Loaded { count })
            }
            Err(err) => {
                warn!(query = %query, error = %err, "search failed");
                let mut state = self.state.write().await;
                if state.generation == generation {
                    self.apply(&mut state, SearchAction::FetchFailed { generation });
                }
                Err(err.context(format!("search for '{query}' failed")))
            }
        }
    }

    /// Fetches the next page when the scroll sentinel becomes visible.
    pub async fn load_more(&self) -> Result<FetchOutcome> {
        if !self.state.read().await.can_load_more() {
            return Ok(FetchOutcome::Exhausted);
        }
        self.fetch_results().await
    }

    pub async fn handle_key(&self, key: SearchKey, input: &str) -> Result<KeyOutcome> {
        match key {
            SearchKey::Enter => {
                // supersede any pending debounced input
                self.input_generation.fetch_add(1, Ordering::SeqCst);
                let target = self.deps.navigator.location().for_search_term(input.trim());
                self.deps.navigator.replace(target.clone());
                let outcome = match self.handle_location_change(&target).await? {
                    FetchOutcome::Unchanged => self.fetch_results().await?,
                    outcome => outcome,
                };
                Ok(KeyOutcome::Searched(outcome))
            }
            SearchKey::Escape => Ok(KeyOutcome::NavigatedBack(self.deps.navigator.back())),
            SearchKey::ArrowDown => Ok(KeyOutcome::FocusResults),
            SearchKey::Other => Ok(KeyOutcome::Ignored),
        }
    }

    /// Debounced typing: commits `text` to the route once input has been
    /// quiet for a short period. A newer call supersedes an older one.
    pub fn input_changed(self: &Arc<Self>, text: impl Into<String>) -> JoinHandle<()> {
        let text = text.into();
        let ticket = self.input_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(INPUT_DEBOUNCE).await;
            if controller.input_generation.load(Ordering::SeqCst) != ticket {
                return;
            }
            let target = controller
                .deps
                .navigator
                .location()
                .for_search_term(text.trim());
            controller.deps.navigator.replace(target.clone());
            if let Err(err) = controller.handle_location_change(&target).await {
                warn!(error = %err, "debounced search failed");
            }
        })
    }

    /// Applies a filter selection through the query string, which then
    /// drives the refetch like any other route change.
    pub async fn change_filters(&self, change: FilterChange) -> Result<FetchOutcome> {
        let target = self
            .deps
            .navigator
            .location()
            .merge_query(change.query_updates());
        self.deps.navigator.replace(target.clone());
        self.handle_location_change(&target).await
    }

    /// Appends to recent searches in the background; the result window
    /// never waits on the history store.
    fn record_history(&self, query: &str) {
        let history = Arc::clone(&self.deps.history);
        let entry = SearchHistoryEntry::now(query);
        tokio::spawn(async move {
            let id = entry.id;
            let query = entry.query.clone();
            if let Err(err) = history.add(entry).await {
                warn!(query = %query, %id, error = %err, "failed to record recent search");
            }
        });
    }

    fn apply(&self, state: &mut SearchState, action: SearchAction) {
        *state = reduce_search(state, action);
        // no subscribers is fine
        let _ = self.events.send(state.clone());
    }
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
