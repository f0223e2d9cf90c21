//! Pure state transitions for the search and shared-document scenes.
//!
//! Controllers own a single state value and replace it with the reducer's
//! output; views only ever see snapshots.

use shared::{
    domain::DocumentId,
    protocol::{SearchParams, SharedDocumentBundle},
};

use crate::{
    error::FetchErrorKind,
    location::{SearchFilters, SharedRoute},
};

pub const DEFAULT_PAGE_SIZE: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastFetch {
    pub query: String,
    pub params: SearchParams,
}

/// One entry of the result window. The document body lives in the shared
/// document cache; only the id and the match context are kept here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRef {
    pub document_id: DocumentId,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    pub query: String,
    pub filters: SearchFilters,
    pub offset: usize,
    pub page_size: usize,
    pub allow_load_more: bool,
    pub is_loading: bool,
    pub last_fetch: Option<LastFetch>,
    pub results: Vec<ResultRef>,
    pub generation: u64,
}

impl SearchState {
    pub fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            filters: SearchFilters::default(),
            offset: 0,
            page_size: page_size.max(1),
            allow_load_more: true,
            is_loading: false,
            last_fetch: None,
            results: Vec::new(),
            generation: 0,
        }
    }

    pub fn params(&self) -> SearchParams {
        SearchParams {
            offset: self.offset,
            limit: self.page_size,
            date_filter: self.filters.date_filter,
            include_archived: self.filters.include_archived,
            include_drafts: true,
            collection_id: self.filters.collection_id.clone(),
            user_id: self.filters.user_id.clone(),
        }
    }

    /// True when `params` for the current query were already sent.
    pub fn is_duplicate(&self, params: &SearchParams) -> bool {
        self.last_fetch
            .as_ref()
            .is_some_and(|last| last.query == self.query && last.params == *params)
    }

    pub fn can_load_more(&self) -> bool {
        self.allow_load_more && !self.is_loading
    }

    pub fn show_empty_state(&self) -> bool {
        !self.is_loading && !self.query.is_empty() && self.results.is_empty()
    }
}

impl Default for SearchState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

#[derive(Debug, Clone)]
pub enum SearchAction {
    /// Term or filters read from the route differ from the current ones.
    RouteChanged {
        query: String,
        filters: SearchFilters,
    },
    /// No request is sent. `forget_query` clears the recorded query so the
    /// next identical request is not treated as a duplicate.
    FetchSkipped { forget_query: bool },
    FetchStarted { params: SearchParams },
    FetchSucceeded {
        generation: u64,
        hits: Vec<ResultRef>,
    },
    FetchFailed { generation: u64 },
}

pub fn reduce_search(state: &SearchState, action: SearchAction) -> SearchState {
    let mut next = state.clone();
    match action {
        SearchAction::RouteChanged { query, filters } => {
            next.query = query;
            next.filters = filters;
            next.offset = 0;
            next.allow_load_more = true;
            next.is_loading = true;
            next.results.clear();
            next.generation += 1;
        }
        SearchAction::FetchSkipped { forget_query } => {
            next.is_loading = false;
            if forget_query {
                forget_last_query(&mut next);
            }
        }
        SearchAction::FetchStarted { params } => {
            next.is_loading = true;
            next.last_fetch = Some(LastFetch {
                query: next.query.clone(),
                params,
            });
            next.generation += 1;
        }
        SearchAction::FetchSucceeded { generation, hits } => {
            if generation != state.generation {
                return next;
            }
            if hits.len() < next.page_size {
                next.allow_load_more = false;
            } else {
                next.offset += next.page_size;
            }
            for hit in hits {
                if !next
                    .results
                    .iter()
                    .any(|existing| existing.document_id == hit.document_id)
                {
                    next.results.push(hit);
                }
            }
            next.is_loading = false;
        }
        SearchAction::FetchFailed { generation } => {
            if generation != state.generation {
                return next;
            }
            forget_last_query(&mut next);
            next.is_loading = false;
        }
    }
    next
}

fn forget_last_query(state: &mut SearchState) {
    if let Some(last) = state.last_fetch.as_mut() {
        last.query.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedDocumentOutcome {
    Loading,
    Loaded(Box<SharedDocumentBundle>),
    Failed(FetchErrorKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedDocumentState {
    pub route: SharedRoute,
    pub outcome: SharedDocumentOutcome,
    pub generation: u64,
}

impl SharedDocumentState {
    pub fn new(route: SharedRoute) -> Self {
        Self {
            route,
            outcome: SharedDocumentOutcome::Loading,
            generation: 0,
        }
    }

    pub fn bundle(&self) -> Option<&SharedDocumentBundle> {
        match &self.outcome {
            SharedDocumentOutcome::Loaded(bundle) => Some(bundle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SharedDocumentAction {
    /// Starts a fetch for `route`, invalidating any fetch in flight.
    FetchStarted { route: SharedRoute },
    FetchSucceeded {
        generation: u64,
        bundle: Box<SharedDocumentBundle>,
    },
    FetchFailed {
        generation: u64,
        kind: FetchErrorKind,
    },
}

pub fn reduce_shared_document(
    state: &SharedDocumentState,
    action: SharedDocumentAction,
) -> SharedDocumentState {
    let mut next = state.clone();
    match action {
        SharedDocumentAction::FetchStarted { route } => {
            next.route = route;
            next.outcome = SharedDocumentOutcome::Loading;
            next.generation += 1;
        }
        SharedDocumentAction::FetchSucceeded { generation, bundle } => {
            if generation == state.generation {
                next.outcome = SharedDocumentOutcome::Loaded(bundle);
            }
        }
        SharedDocumentAction::FetchFailed { generation, kind } => {
            if generation == state.generation {
                next.outcome = SharedDocumentOutcome::Failed(kind);
            }
        }
    }
    next
}

#[cfg(test)]
#[path = "tests/reducer_tests.rs"]
mod tests;
