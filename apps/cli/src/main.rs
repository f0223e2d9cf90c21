use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    location::{
        COLLECTION_ID_PARAM, DATE_FILTER_PARAM, EDIT_PARAM, INCLUDE_ARCHIVED_PARAM, THEME_PARAM,
        USER_ID_PARAM,
    },
    take_post_login_redirect, DocumentCache, HttpBackend, Location, MemoryNavigator, Navigator,
    PageEffects, PolicyStore, SearchController, SearchDependencies, SharedDocumentController,
    SharedDocumentDependencies, SharedDocumentView, SharedRoute, SharedViewSettings,
};
use shared::domain::{DateFilter, Theme};
use storage::Storage;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser, Debug)]
#[command(name = "docshare", about = "Search documents and open shared links")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full-text search over the documents visible to the API token.
    Search {
        term: String,
        #[arg(long)]
        collection_id: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        date_filter: Option<DateFilter>,
        #[arg(long)]
        include_archived: bool,
        /// Number of result pages to load.
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Open a publicly shared document, or the root of a share.
    Shared {
        share_id: String,
        slug: Option<String>,
        #[arg(long)]
        theme: Option<Theme>,
        #[arg(long)]
        edit: bool,
    },
    /// Recently executed searches.
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Print and clear the path stored when a shared link needed a login.
    LoginRedirect,
}

/// Page effects for a terminal: there is no page chrome, so they are only
/// traced.
struct TerminalPage;

impl PageEffects for TerminalPage {
    fn set_background(&self, color: &str) {
        debug!(color, "page background");
    }

    fn install_copy_protection(&self) {
        debug!("copy protection on");
    }

    fn remove_copy_protection(&self) {
        debug!("copy protection off");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();
    let settings = config::load_settings();

    let database_url = config::normalize_database_url(&settings.database_url);
    let storage = Arc::new(
        Storage::new(&database_url)
            .await
            .with_context(|| format!("failed to open {database_url}"))?,
    );
    info!(server_url = %settings.server_url, database_url = %database_url, "docshare starting");

    match args.command {
        Command::Search {
            term,
            collection_id,
            user_id,
            date_filter,
            include_archived,
            pages,
        } => {
            let location = Location::new("/search").for_search_term(&term).merge_query([
                (COLLECTION_ID_PARAM, collection_id.unwrap_or_default()),
                (USER_ID_PARAM, user_id.unwrap_or_default()),
                (
                    DATE_FILTER_PARAM,
                    date_filter.map(|f| f.as_str().to_string()).unwrap_or_default(),
                ),
                (
                    INCLUDE_ARCHIVED_PARAM,
                    if include_archived { "true" } else { "" }.to_string(),
                ),
            ]);
            run_search(&settings, storage, location, pages).await
        }
        Command::Shared {
            share_id,
            slug,
            theme,
            edit,
        } => {
            let path = match slug {
                Some(slug) => format!("/s/{share_id}/doc/{slug}"),
                None => format!("/s/{share_id}"),
            };
            let location = Location::new(path).merge_query([
                (THEME_PARAM, theme.map(|t| t.as_str().to_string()).unwrap_or_default()),
                (EDIT_PARAM, if edit { "true" } else { "" }.to_string()),
            ]);
            run_shared(&settings, storage, location).await
        }
        Command::History { limit } => {
            for entry in storage.recent_searches(limit).await? {
                println!("{}  {}", entry.created_at.format("%Y-%m-%d %H:%M"), entry.query);
            }
            Ok(())
        }
        Command::LoginRedirect => {
            match take_post_login_redirect(storage.as_ref()).await? {
                Some(path) => println!("{path}"),
                None => println!("No pending redirect."),
            }
            Ok(())
        }
    }
}

async fn run_search(
    settings: &config::Settings,
    storage: Arc<Storage>,
    location: Location,
    pages: usize,
) -> Result<()> {
    let backend = HttpBackend::new(
        settings.server_url.clone(),
        settings.api_token.clone(),
        settings.request_timeout(),
        PolicyStore::new(),
    )?;
    let controller = SearchController::new(
        SearchDependencies {
            search: Arc::new(backend),
            history: storage,
            navigator: Arc::new(MemoryNavigator::new(location)),
            documents: DocumentCache::new(),
        },
        settings.page_size,
    );

    controller.mount().await?;
    for _ in 1..pages {
        controller.load_more().await?;
    }

    if controller.show_empty_state().await {
        println!("No documents found.");
        return Ok(());
    }
    for result in controller.results().await {
        println!("{}\n  {}\n  {}", result.document.title, result.document.url, result.context);
    }
    Ok(())
}

async fn run_shared(
    settings: &config::Settings,
    storage: Arc<Storage>,
    location: Location,
) -> Result<()> {
    let route = SharedRoute::from_location(&location)
        .with_context(|| format!("'{}' is not a share link", location.path()))?;
    let policies = PolicyStore::new();
    let backend = Arc::new(HttpBackend::new(
        settings.server_url.clone(),
        settings.api_token.clone(),
        settings.request_timeout(),
        policies.clone(),
    )?);
    let navigator = Arc::new(MemoryNavigator::new(location));

    let controller = SharedDocumentController::mount(
        SharedDocumentDependencies {
            documents: backend.clone(),
            policies: Arc::new(policies),
            login_config: backend,
            durable: storage,
            navigator: navigator.clone(),
            page: Arc::new(TerminalPage),
        },
        SharedViewSettings {
            app_name: settings.app_name.clone(),
            cloud_hosted: settings.cloud_hosted,
        },
        route,
    );

    match controller.load().await? {
        SharedDocumentView::Loading => println!("Loading..."),
        SharedDocumentView::Offline => println!("You are offline. Try again once connected."),
        SharedDocumentView::LoginPrompt { notice } => {
            if let Some(notice) = notice {
                println!("{notice}");
            }
            println!("Please log in to view this document.");
        }
        SharedDocumentView::NotFound => println!("This shared document could not be found."),
        SharedDocumentView::RedirectToEditor { url } => {
            println!("Opening in the editor: {}", navigator.location());
            debug!(url = %url, "editor redirect");
        }
        SharedDocumentView::Document(page) => {
            println!("{}", page.document.title);
            if let Some(team) = &page.team {
                println!("Shared by {}", team.name);
            }
            println!("{}", page.document.url);
            if let Some(text) = &page.document.text {
                println!("\n{text}");
            }
        }
    }
    Ok(())
}
