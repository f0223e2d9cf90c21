use super::*;
use std::collections::VecDeque;

use anyhow::anyhow;
use async_trait::async_trait;
use shared::{
    domain::{CollectionId, DateFilter, DocumentId},
    protocol::{SearchHit, SearchParams},
};
use tokio::sync::{oneshot, Mutex};

use crate::{navigation::MemoryNavigator, reducer::LastFetch};

/// Scripted search backend. Each call pops the next page size (or error);
/// when the script is empty it returns no hits.
#[derive(Default)]
struct FakeSearch {
    script: Mutex<VecDeque<std::result::Result<usize, String>>>,
    calls: Mutex<Vec<(String, SearchParams)>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl FakeSearch {
    fn scripted(pages: impl IntoIterator<Item = std::result::Result<usize, String>>) -> Self {
        Self {
            script: Mutex::new(pages.into_iter().collect()),
            ..Self::default()
        }
    }

    /// The first call waits for the returned sender before answering.
    async fn gate_first_call(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().await = Some(rx);
        tx
    }

    async fn calls(&self) -> Vec<(String, SearchParams)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl DocumentSearchService for FakeSearch {
    async fn search(&self, query: &str, params: &SearchParams) -> Result<Vec<SearchHit>> {
        self.calls
            .lock()
            .await
            .push((query.to_string(), params.clone()));
        let step = self.script.lock().await.pop_front();
        let gate = self.gate.lock().await.take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        let count = match step {
            Some(Ok(count)) => count,
            Some(Err(message)) => return Err(anyhow!(message)),
            None => 0,
        };
        Ok((0..count)
            .map(|i| {
                let id = format!("{query}-{}", params.offset + i);
                SearchHit {
                    document: DocumentSummary {
                        id: DocumentId::new(id.clone()),
                        title: format!("Title {id}"),
                        url: format!("/doc/{id}"),
                        text: None,
                        collection_id: None,
                        updated_at: None,
                    },
                    context: format!("<b>{query}</b> in {id}"),
                }
            })
            .collect())
    }
}

#[derive(Default)]
struct FakeHistory {
    entries: Mutex<Vec<SearchHistoryEntry>>,
    fail: bool,
    /// `add` never completes.
    hang: bool,
}

impl FakeHistory {
    /// Queries recorded so far, once at least `count` have landed.
    async fn wait_for_queries(&self, count: usize) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let entries = self.entries.lock().await;
                if entries.len() >= count {
                    return entries.iter().map(|e| e.query.clone()).collect::<Vec<_>>();
                }
                drop(entries);
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("history entries recorded")
    }
}

#[async_trait]
impl SearchHistoryStore for FakeHistory {
    async fn add(&self, entry: SearchHistoryEntry) -> Result<()> {
        if self.hang {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(anyhow!("history unavailable"));
        }
        self.entries.lock().await.push(entry);
        Ok(())
    }
}

struct Harness {
    controller: Arc<SearchController>,
    search: Arc<FakeSearch>,
    history: Arc<FakeHistory>,
    navigator: Arc<MemoryNavigator>,
}

fn harness(start: &str, page_size: usize, search: FakeSearch) -> Harness {
    harness_with_history(start, page_size, search, FakeHistory::default())
}

fn harness_with_history(
    start: &str,
    page_size: usize,
    search: FakeSearch,
    history: FakeHistory,
) -> Harness {
    let search = Arc::new(search);
    let history = Arc::new(history);
    let navigator = Arc::new(MemoryNavigator::new(
        Location::parse(start).expect("start location"),
    ));
    let controller = SearchController::new(
        SearchDependencies {
            search: search.clone(),
            history: history.clone(),
            navigator: navigator.clone(),
            documents: DocumentCache::new(),
        },
        page_size,
    );
    Harness {
        controller,
        search,
        history,
        navigator,
    }
}

#[tokio::test]
async fn empty_query_issues_no_fetch() {
    let h = harness("/search", 10, FakeSearch::default());

    let outcome = h.controller.mount().await.expect("mount");

    assert_eq!(outcome, FetchOutcome::EmptyQuery);
    assert!(h.search.calls().await.is_empty());
    let state = h.controller.snapshot().await;
    assert!(!state.is_loading);
    assert!(!h.controller.show_empty_state().await);
}

#[tokio::test]
async fn full_page_then_same_route_issues_no_more_calls() {
    let h = harness("/search/design%20doc", 10, FakeSearch::scripted([Ok(10)]));

    let outcome = h.controller.mount().await.expect("mount");
    assert_eq!(outcome, FetchOutcome::Loaded { count: 10 });

    let state = h.controller.snapshot().await;
    assert!(state.allow_load_more);
    assert_eq!(state.offset, 10);
    assert!(!state.is_loading);

    let again = h
        .controller
        .handle_location_change(&h.navigator.location())
        .await
        .expect("same route");
    assert_eq!(again, FetchOutcome::Unchanged);
    assert_eq!(h.search.calls().await.len(), 1);
}

#[tokio::test]
async fn identical_consecutive_fetch_is_deduplicated() {
    let h = harness("/search/roadmap", 10, FakeSearch::scripted([Ok(3)]));
    h.controller.mount().await.expect("mount");

    let outcome = h.controller.fetch_results().await.expect("second fetch");

    assert_eq!(outcome, FetchOutcome::Duplicate);
    assert_eq!(h.search.calls().await.len(), 1);
    let state = h.controller.snapshot().await;
    assert!(!state.is_loading);
    assert!(!state.allow_load_more);
    assert_eq!(state.offset, 0);
}

#[tokio::test]
async fn request_carries_filters_and_drafts() {
    let h = harness(
        "/search/roadmap?collectionId=col-1&dateFilter=week&includeArchived=true",
        25,
        FakeSearch::default(),
    );
    h.controller.mount().await.expect("mount");

    let calls = h.search.calls().await;
    assert_eq!(calls.len(), 1);
    let (query, params) = &calls[0];
    assert_eq!(query, "roadmap");
    assert_eq!(
        *params,
        SearchParams {
            offset: 0,
            limit: 25,
            date_filter: Some(DateFilter::Week),
            include_archived: true,
            include_drafts: true,
            collection_id: Some(CollectionId::new("col-1")),
            user_id: None,
        }
    );
}

#[tokio::test]
async fn filter_change_resets_pagination_before_fetching() {
    let h = harness(
        "/search/roadmap?dateFilter=week",
        10,
        FakeSearch::scripted([Ok(10), Ok(10), Ok(4)]),
    );
    h.controller.mount().await.expect("mount");
    h.controller.load_more().await.expect("page two");
    assert_eq!(h.controller.snapshot().await.offset, 20);

    let mut events = h.controller.subscribe_events();
    let outcome = h
        .controller
        .change_filters(FilterChange {
            collection_id: Some("col-9".into()),
            date_filter: Some(String::new()),
            ..FilterChange::default()
        })
        .await
        .expect("filter change");
    assert_eq!(outcome, FetchOutcome::Loaded { count: 4 });

    let reset = events.recv().await.expect("reset event");
    assert_eq!(reset.offset, 0);
    assert!(reset.allow_load_more);
    assert!(reset.is_loading);
    assert!(reset.results.is_empty());

    assert_eq!(
        h.navigator.location().to_string(),
        "/search/roadmap?collectionId=col-9"
    );
    let calls = h.search.calls().await;
    let (_, params) = calls.last().expect("filtered call");
    assert_eq!(params.offset, 0);
    assert_eq!(params.collection_id, Some(CollectionId::new("col-9")));
    assert_eq!(params.date_filter, None);

    let state = h.controller.snapshot().await;
    assert_eq!(state.results.len(), 4);
    assert!(!state.allow_load_more);
}

#[tokio::test]
async fn failure_forgets_last_query_and_propagates() {
    let h = harness(
        "/search/roadmap",
        10,
        FakeSearch::scripted([Err("index offline".to_string()), Ok(2)]),
    );

    let err = h.controller.mount().await.expect_err("search should fail");
    assert!(format!("{err:#}").contains("index offline"));

    let state = h.controller.snapshot().await;
    assert!(!state.is_loading);
    assert!(matches!(
        state.last_fetch,
        Some(LastFetch { ref query, .. }) if query.is_empty()
    ));

    let retry = h.controller.fetch_results().await.expect("retry");
    assert_eq!(retry, FetchOutcome::Loaded { count: 2 });
    assert_eq!(h.search.calls().await.len(), 2);
}

#[tokio::test]
async fn load_more_is_gated_by_last_page() {
    let h = harness("/search/roadmap", 5, FakeSearch::scripted([Ok(5), Ok(2)]));
    h.controller.mount().await.expect("mount");

    assert_eq!(
        h.controller.load_more().await.expect("page two"),
        FetchOutcome::Loaded { count: 2 }
    );
    assert_eq!(
        h.controller.load_more().await.expect("exhausted"),
        FetchOutcome::Exhausted
    );

    let calls = h.search.calls().await;
    let offsets: Vec<_> = calls.iter().map(|(_, p)| p.offset).collect();
    assert_eq!(offsets, vec![0, 5]);

    let results = h.controller.results().await;
    assert_eq!(results.len(), 7);
    assert_eq!(results[0].document.id, DocumentId::new("roadmap-0"));
    assert_eq!(results[6].context, "<b>roadmap</b> in roadmap-6");
}

#[tokio::test]
async fn successful_searches_are_recorded_with_fresh_ids() {
    let h = harness("/search/alpha", 10, FakeSearch::default());
    h.controller.mount().await.expect("mount");
    h.controller
        .handle_key(SearchKey::Enter, "beta")
        .await
        .expect("enter");

    let mut queries = h.history.wait_for_queries(2).await;
    queries.sort();
    assert_eq!(queries, vec!["alpha", "beta"]);
    let entries = h.history.entries.lock().await.clone();
    assert_ne!(entries[0].id, entries[1].id);
}

#[tokio::test]
async fn slow_history_store_does_not_hold_back_results() {
    let h = harness_with_history(
        "/search/alpha",
        10,
        FakeSearch::scripted([Ok(4)]),
        FakeHistory {
            hang: true,
            ..FakeHistory::default()
        },
    );

    let outcome = tokio::time::timeout(Duration::from_secs(2), h.controller.mount())
        .await
        .expect("mount finishes while history is pending")
        .expect("mount");
    assert_eq!(outcome, FetchOutcome::Loaded { count: 4 });

    let state = h.controller.snapshot().await;
    assert!(!state.is_loading);
    assert_eq!(h.controller.results().await.len(), 4);
}

#[tokio::test]
async fn history_failure_does_not_fail_search() {
    let h = harness_with_history(
        "/search/alpha",
        10,
        FakeSearch::scripted([Ok(1)]),
        FakeHistory {
            fail: true,
            ..FakeHistory::default()
        },
    );

    let outcome = h.controller.mount().await.expect("mount");
    assert_eq!(outcome, FetchOutcome::Loaded { count: 1 });
}

#[tokio::test]
async fn zero_results_show_empty_state() {
    let h = harness("/search/nothing", 10, FakeSearch::default());
    h.controller.mount().await.expect("mount");

    assert!(h.controller.show_empty_state().await);
    assert!(!h.controller.snapshot().await.allow_load_more);
}

#[tokio::test]
async fn enter_commits_term_to_route_and_fetches() {
    let h = harness("/search?userId=user-1", 10, FakeSearch::scripted([Ok(1)]));
    h.controller.mount().await.expect("mount");

    let outcome = h
        .controller
        .handle_key(SearchKey::Enter, "  quarterly plan ")
        .await
        .expect("enter");

    assert_eq!(outcome, KeyOutcome::Searched(FetchOutcome::Loaded { count: 1 }));
    assert_eq!(
        h.navigator.location().to_string(),
        "/search/quarterly%20plan?userId=user-1"
    );
    assert_eq!(h.search.calls().await[0].0, "quarterly plan");
}

#[tokio::test]
async fn enter_on_unchanged_term_still_runs_fetch_routine() {
    let h = harness("/search/alpha", 10, FakeSearch::scripted([Ok(1)]));
    h.controller.mount().await.expect("mount");

    let outcome = h
        .controller
        .handle_key(SearchKey::Enter, "alpha")
        .await
        .expect("enter");

    assert_eq!(outcome, KeyOutcome::Searched(FetchOutcome::Duplicate));
    assert_eq!(h.search.calls().await.len(), 1);
}

#[tokio::test]
async fn escape_goes_back_and_arrow_down_focuses_results() {
    let h = harness("/home", 10, FakeSearch::default());
    h.navigator.push(Location::new("/search/alpha"));

    assert_eq!(
        h.controller
            .handle_key(SearchKey::ArrowDown, "")
            .await
            .expect("down"),
        KeyOutcome::FocusResults
    );
    assert_eq!(
        h.controller
            .handle_key(SearchKey::Escape, "")
            .await
            .expect("escape"),
        KeyOutcome::NavigatedBack(true)
    );
    assert_eq!(h.navigator.location(), Location::new("/home"));
    assert_eq!(
        h.controller
            .handle_key(SearchKey::Other, "")
            .await
            .expect("other"),
        KeyOutcome::Ignored
    );
}

#[tokio::test(start_paused = true)]
async fn typing_is_debounced_to_the_last_input() {
    let h = harness("/search", 10, FakeSearch::default());
    h.controller.mount().await.expect("mount");

    let first = h.controller.input_changed("ro");
    tokio::time::sleep(Duration::from_millis(100)).await;
    let second = h.controller.input_changed("roadmap");
    first.await.expect("first task");
    second.await.expect("second task");

    let calls = h.search.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "roadmap");
    assert_eq!(h.navigator.location().path(), "/search/roadmap");
}

#[tokio::test]
async fn stale_response_is_discarded() {
    let h = harness("/search/first", 10, FakeSearch::scripted([Ok(10), Ok(3)]));
    let release = h.search.gate_first_call().await;

    let controller = h.controller.clone();
    let pending = tokio::spawn(async move { controller.mount().await });
    while h.search.calls().await.is_empty() {
        tokio::task::yield_now().await;
    }

    let newer = h
        .controller
        .handle_location_change(&Location::new("/search/second"))
        .await
        .expect("newer search");
    assert_eq!(newer, FetchOutcome::Loaded { count: 3 });

    release.send(()).expect("release first call");
    let stale = pending.await.expect("join").expect("first search");
    assert_eq!(stale, FetchOutcome::Stale);

    let state = h.controller.snapshot().await;
    assert_eq!(state.query, "second");
    assert_eq!(state.results.len(), 3);
    assert_eq!(state.offset, 0);
    assert!(!state.allow_load_more);
    assert!(!state.is_loading);

    tokio::task::yield_now().await;
    assert_eq!(h.history.wait_for_queries(1).await, vec!["second"]);
}
