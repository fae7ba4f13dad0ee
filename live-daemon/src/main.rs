use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use live_core::{
    fetch_remote_list, spawn_poller, ChangeSet, Item, JsonDirStore, ListQuery, LiveSession,
    LogNotifier, PollError, SharedStore, ViewObserver,
};
use reqwest::{redirect, Client, ClientBuilder};
use tracing::{error, info, trace};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "gall-live", about = "Keeps a gallery list mirrored in the background")]
struct Args {
    /// Collection (gallery) id to mirror.
    #[arg(long, required_unless_present = "page_url")]
    collection: Option<String>,
    /// List or view page URL; filters and the current item are read from its query.
    #[arg(long, conflicts_with = "collection")]
    page_url: Option<Url>,
    /// Directory holding `config.json` and `cache.json`.
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// Drop every cached detail before starting.
    #[arg(long)]
    reset_cache: bool,
}

/// Logs what the presentation layer would redraw.
struct LogObserver;

impl ViewObserver for LogObserver {
    fn set_loading(&self, collection: &str, item: u64, loading: bool) {
        trace!(collection, item, loading, "loading indicator");
    }

    fn apply(&self, changes: &ChangeSet) {
        info!(
            collection = %changes.collection,
            inserted = ?changes.inserted,
            updated = changes.updated.len(),
            deleted = ?changes.deleted,
            removed = ?changes.removed,
            "view changed"
        );
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();
    if let Err(err) = run(args).await {
        error!(error = %err, "gall-live stopped");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let query = match (&args.page_url, &args.collection) {
        (Some(url), _) => ListQuery::from_page_url(url)?,
        (None, Some(collection)) => ListQuery::new(collection.clone()),
        (None, None) => return Err("either --collection or --page-url is required".into()),
    };

    let dir = args.config_dir.unwrap_or_else(JsonDirStore::default_dir);
    let store: SharedStore = Arc::new(JsonDirStore::open(&dir).await);
    info!(dir = %dir.display(), collection = %query.collection, "starting live mirror");

    let client = build_client()?;
    let session = LiveSession::open(client.clone(), store, query)
        .await
        .with_observer(Arc::new(LogObserver))
        .with_notifier(Arc::new(LogNotifier));
    if args.reset_cache {
        session.cache().reset().await;
        info!("content cache cleared");
    }

    let initial = initial_page(&client, &session).await?;
    let report = session.bootstrap(initial).await?;
    info!(
        fetched = report.succeeded().len(),
        failed = report.failed().len(),
        "initial page cached"
    );

    let poller = spawn_poller(Arc::new(session));
    tokio::signal::ctrl_c().await?;
    poller.stop().await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn build_client() -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .build()
}

/// Stands in for the rows a browser would have rendered before the mirror
/// starts: the first poll of the list, notices included.
async fn initial_page(client: &Client, session: &LiveSession) -> Result<Vec<Item>, PollError> {
    let config = session.config().await;
    let remote = fetch_remote_list(client, &config, session.query()).await?;
    Ok(remote
        .iter()
        .filter(|entry| entry.id != session.query().current_item)
        .filter_map(|entry| Item::from_remote(session.collection(), entry))
        .collect())
}
