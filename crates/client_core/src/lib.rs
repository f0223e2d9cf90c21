//! Client-side controllers for document search and shared-document viewing.
//!
//! Controllers talk to the outside world only through the collaborator
//! traits below; `http` and `persistence` provide the production
//! implementations.

use anyhow::Result;
use async_trait::async_trait;
use shared::{
    domain::{Abilities, DocumentId, ShareId},
    protocol::{LoginConfig, SearchHistoryEntry, SearchHit, SharedDocumentBundle},
};

pub mod documents;
pub mod error;
pub mod http;
pub mod location;
pub mod navigation;
pub mod page;
pub mod persistence;
pub mod reducer;
pub mod search;
pub mod shared_document;
pub mod tree;

pub use documents::{DocumentCache, PolicyStore};
pub use error::{FetchError, FetchErrorKind, LocationError};
pub use http::HttpBackend;
pub use location::{FilterChange, Location, SearchFilters, SharedRoute};
pub use navigation::{MemoryNavigator, Navigator};
pub use page::{CopyProtection, PageEffects, PrintPolicy};
pub use reducer::{SearchState, SharedDocumentState, DEFAULT_PAGE_SIZE};
pub use search::{FetchOutcome, KeyOutcome, SearchController, SearchDependencies, SearchKey};
pub use shared_document::{
    take_post_login_redirect, DocumentContext, SharedDocumentController,
    SharedDocumentDependencies, SharedDocumentPage, SharedDocumentView, SharedViewSettings,
    POST_LOGIN_REDIRECT_KEY,
};
pub use tree::find_document_id;

#[async_trait]
pub trait DocumentSearchService: Send + Sync {
    async fn search(
        &self,
        query: &str,
        params: &shared::protocol::SearchParams,
    ) -> Result<Vec<SearchHit>>;
}

#[async_trait]
pub trait SearchHistoryStore: Send + Sync {
    async fn add(&self, entry: SearchHistoryEntry) -> Result<()>;
}

#[async_trait]
pub trait SharedDocumentService: Send + Sync {
    async fn fetch_with_shared_tree(
        &self,
        document_slug: &str,
        share_id: &ShareId,
    ) -> std::result::Result<SharedDocumentBundle, FetchError>;
}

/// Capability lookup for the current viewer. Unknown documents grant nothing.
pub trait PolicyService: Send + Sync {
    fn evaluate(&self, document_id: &DocumentId) -> Abilities;
}

#[async_trait]
pub trait LoginConfigProvider: Send + Sync {
    async fn login_config(&self) -> Result<Option<LoginConfig>>;
}

/// Key/value storage that outlives the current scene and navigation away
/// from the app.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}
