//! Shared-document scene controller.
//!
//! Fetches the shared bundle for the current route, records exactly one
//! outcome per fetch and turns it into a single view decision.

use std::sync::Arc;

use anyhow::Result;
use shared::{
    domain::{Abilities, DocumentId, NavigationNode, ShareId, Theme},
    protocol::{DocumentSummary, PublicTeam},
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{
    error::FetchErrorKind,
    location::{Location, SharedRoute},
    navigation::Navigator,
    page::{CopyProtection, PageEffects, PrintPolicy},
    reducer::{
        reduce_shared_document, SharedDocumentAction, SharedDocumentOutcome, SharedDocumentState,
    },
    tree::find_document_id,
    DurableStore, LoginConfigProvider, PolicyService, SharedDocumentService,
};

/// Durable key read by the login flow to return the user to the share.
pub const POST_LOGIN_REDIRECT_KEY: &str = "postLoginRedirectPath";

const EVENT_CHANNEL_CAPACITY: usize = 16;

pub struct SharedDocumentDependencies {
    pub documents: Arc<dyn SharedDocumentService>,
    pub policies: Arc<dyn PolicyService>,
    pub login_config: Arc<dyn LoginConfigProvider>,
    pub durable: Arc<dyn DurableStore>,
    pub navigator: Arc<dyn Navigator>,
    pub page: Arc<dyn PageEffects>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedViewSettings {
    pub app_name: String,
    pub cloud_hosted: bool,
}

impl Default for SharedViewSettings {
    fn default() -> Self {
        Self {
            app_name: "Docshare".to_string(),
            cloud_hosted: false,
        }
    }
}

/// Document the view is focused on, passed down explicitly to the
/// components that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContext {
    pub active_document_id: DocumentId,
    /// Node of the shared tree matching the route slug, for sidebar
    /// highlighting.
    pub tree_document_id: Option<DocumentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedDocumentPage {
    pub share_id: ShareId,
    pub document: DocumentSummary,
    pub team: Option<PublicTeam>,
    pub shared_tree: Option<NavigationNode>,
    pub context: DocumentContext,
    pub theme: Theme,
    pub abilities: Abilities,
    pub print_policy: PrintPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedDocumentView {
    Loading,
    Offline,
    LoginPrompt { notice: Option<String> },
    NotFound,
    RedirectToEditor { url: String },
    Document(Box<SharedDocumentPage>),
}

pub struct SharedDocumentController {
    deps: SharedDocumentDependencies,
    settings: SharedViewSettings,
    state: RwLock<SharedDocumentState>,
    events: broadcast::Sender<SharedDocumentState>,
    _copy_protection: CopyProtection,
}

impl SharedDocumentController {
    /// Mounts the scene for `route`. Copy protection stays installed until
    /// the controller is dropped.
    pub fn mount(
        deps: SharedDocumentDependencies,
        settings: SharedViewSettings,
        route: SharedRoute,
    ) -> Arc<Self> {
        let copy_protection = CopyProtection::install(deps.page.clone());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            deps,
            settings,
            state: RwLock::new(SharedDocumentState::new(route)),
            events,
            _copy_protection: copy_protection,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SharedDocumentState> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> SharedDocumentState {
        self.state.read().await.clone()
    }

    /// Fetches the bundle for the mounted route and renders the result.
    pub async fn load(&self) -> Result<SharedDocumentView> {
        let route = self.state.read().await.route.clone();
        self.fetch(route).await;
        self.render().await
    }

    /// Refetches when the share or slug differs from the mounted route.
    pub async fn change_route(&self, route: SharedRoute) -> Result<SharedDocumentView> {
        let unchanged = self.state.read().await.route == route;
        if !unchanged {
            self.fetch(route).await;
        }
        self.render().await
    }

    pub async fn resolved_document_id(&self) -> Option<DocumentId> {
        let state = self.state.read().await;
        let tree = state.bundle()?.shared_tree.as_ref()?;
        find_document_id(tree, &state.route.document_slug)
    }

    async fn fetch(&self, route: SharedRoute) {
        let generation = {
            let mut state = self.state.write().await;
            self.apply(
                &mut state,
                SharedDocumentAction::FetchStarted {
                    route: route.clone(),
                },
            );
            state.generation
        };

        debug!(share_id = %route.share_id, slug = %route.document_slug, "fetching shared document");
        let action = match self
            .deps
            .documents
            .fetch_with_shared_tree(&route.document_slug, &route.share_id)
            .await
        {
            Ok(bundle) => {
                info!(
                    share_id = %route.share_id,
                    document_id = %bundle.document.id,
                    "shared document loaded"
                );
                SharedDocumentAction::FetchSucceeded {
                    generation,
                    bundle: Box::new(bundle),
                }
            }
            Err(err) => {
                let kind = err.kind();
                warn!(share_id = %route.share_id, ?kind, error = %err, "shared document fetch failed");
                SharedDocumentAction::FetchFailed { generation, kind }
            }
        };

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(share_id = %route.share_id, generation, "dropping stale shared document outcome");
            return;
        }
        self.apply(&mut state, action);
    }

    /// Turns the recorded outcome into a view, performing the side effects
    /// that go with it: page background, redirect bookkeeping for login,
    /// and the editor redirect.
    pub async fn render(&self) -> Result<SharedDocumentView> {
        let location = self.deps.navigator.location();
        let state = self.state.read().await.clone();

        let team_theme = state
            .bundle()
            .and_then(|bundle| bundle.team.as_ref())
            .and_then(|team| team.theme);
        let theme = location
            .theme_override()
            .or(team_theme)
            .unwrap_or_default();
        self.deps.page.set_background(theme.background());

        let view = match state.outcome {
            SharedDocumentOutcome::Loading => SharedDocumentView::Loading,
            SharedDocumentOutcome::Failed(FetchErrorKind::Offline) => SharedDocumentView::Offline,
            SharedDocumentOutcome::Failed(FetchErrorKind::Authorization) => {
                self.remember_redirect(&location).await?;
                SharedDocumentView::LoginPrompt {
                    notice: self.login_notice().await,
                }
            }
            SharedDocumentOutcome::Failed(FetchErrorKind::Other) => SharedDocumentView::NotFound,
            SharedDocumentOutcome::Loaded(bundle) => {
                let abilities = self.deps.policies.evaluate(&bundle.document.id);
                if location.edit_requested() && abilities.update {
                    let url = bundle.document.url.clone();
                    info!(document_id = %bundle.document.id, url = %url, "redirecting editor out of shared view");
                    self.deps.navigator.replace(editor_location(&url));
                    return Ok(SharedDocumentView::RedirectToEditor { url });
                }

                let tree_document_id = bundle
                    .shared_tree
                    .as_ref()
                    .and_then(|tree| find_document_id(tree, &state.route.document_slug));
                let bundle = *bundle;
                SharedDocumentView::Document(Box::new(SharedDocumentPage {
                    share_id: state.route.share_id.clone(),
                    context: DocumentContext {
                        active_document_id: bundle.document.id.clone(),
                        tree_document_id,
                    },
                    document: bundle.document,
                    team: bundle.team,
                    shared_tree: bundle.shared_tree,
                    theme,
                    abilities,
                    print_policy: PrintPolicy::for_abilities(&abilities),
                }))
            }
        };
        Ok(view)
    }

    async fn remember_redirect(&self, location: &Location) -> Result<()> {
        let path = location.to_string();
        self.deps
            .durable
            .set(POST_LOGIN_REDIRECT_KEY, &path)
            .await?;
        debug!(path = %path, "stored post-login redirect");
        Ok(())
    }

    async fn login_notice(&self) -> Option<String> {
        if !self.settings.cloud_hosted {
            return None;
        }
        let config = match self.deps.login_config.login_config().await {
            Ok(config) => config?,
            Err(err) => {
                warn!(error = %err, "failed to load login config");
                return None;
            }
        };
        let team = config.name.filter(|name| !name.trim().is_empty())?;
        Some(format!(
            "{team} is using {} to share documents, please login to continue.",
            self.settings.app_name
        ))
    }

    fn apply(&self, state: &mut SharedDocumentState, action: SharedDocumentAction) {
        *state = reduce_shared_document(state, action);
        let _ = self.events.send(state.clone());
    }
}

fn editor_location(url: &str) -> Location {
    Location::parse(url).unwrap_or_else(|err| {
        warn!(url = %url, error = %err, "document url is not a valid location");
        Location::new(url)
    })
}

/// Returns and clears the path stored when a shared view required login.
pub async fn take_post_login_redirect(store: &dyn DurableStore) -> Result<Option<String>> {
    let path = store.get(POST_LOGIN_REDIRECT_KEY).await?;
    if path.is_some() {
        store.remove(POST_LOGIN_REDIRECT_KEY).await?;
    }
    Ok(path)
}

#[cfg(test)]
#[path = "tests/shared_document_tests.rs"]
mod tests;
