use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, info};

use crate::batch::{BatchFetcher, BatchReport};
use crate::cache::ContentCache;
use crate::config::LiveConfig;
use crate::error::PollError;
use crate::fetcher::{FetchTarget, Fetcher};
use crate::item::Item;
use crate::listing::{check_access, fetch_remote_list, ListQuery};
use crate::observer::{NullObserver, SharedNotifier, SharedObserver};
use crate::reconcile::ListReconciler;
use crate::store::SharedStore;
use crate::view::{LocalView, SharedView};

/// What one poll cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub inserted_ids: Vec<u64>,
    pub fetch: BatchReport,
}

/// Everything a poll cycle needs for one collection: the HTTP client, the
/// content cache, the local view and the presentation collaborators.
pub struct LiveSession {
    client: Client,
    store: SharedStore,
    cache: Arc<ContentCache>,
    view: SharedView,
    query: ListQuery,
    observer: SharedObserver,
    notifier: Option<SharedNotifier>,
}

impl LiveSession {
    /// Loads the content cache from `store` and creates an empty view.
    pub async fn open(client: Client, store: SharedStore, query: ListQuery) -> Self {
        let config = LiveConfig::load(store.as_ref()).await;
        let cache = Arc::new(ContentCache::load(store.clone(), config.limit_cache).await);
        let view = LocalView::new(query.collection.clone(), config.limit_items).shared();
        Self {
            client,
            store,
            cache,
            view,
            query,
            observer: Arc::new(NullObserver),
            notifier: None,
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_notifier(mut self, notifier: SharedNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn collection(&self) -> &str {
        &self.query.collection
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Reads the configuration as currently stored.
    pub async fn config(&self) -> LiveConfig {
        LiveConfig::load(self.store.as_ref()).await
    }

    /// Checks the collection is accessible, seeds the view with the rows of
    /// the initially rendered page and fetches the details it lacks.
    pub async fn bootstrap(&self, initial_items: Vec<Item>) -> Result<BatchReport, PollError> {
        let config = self.config().await;
        config.validate()?;
        check_access(&self.client, &config, self.collection()).await?;

        let mut missing = Vec::new();
        {
            let mut view = self.view.write().await;
            view.set_max_len(config.limit_items);
            view.seed(initial_items);
            for item in view.items_mut().iter_mut() {
                item.detail_available = self.cache.has(&item.collection, item.id).await;
                if !item.is_notice && !item.detail_available {
                    missing.push(FetchTarget {
                        item: item.id,
                        title: Some(item.fields.title.subject.clone()),
                    });
                }
            }
        }
        info!(
            collection = self.collection(),
            missing = missing.len(),
            "session bootstrapped"
        );

        let report = self.fetch_details(&config, missing).await;
        Ok(report)
    }

    /// Polls the remote list once, merges it into the view and fetches the
    /// detail content of newly discovered rows.
    pub async fn run_cycle(&self, config: &LiveConfig) -> Result<CycleReport, PollError> {
        let started_at = Utc::now();
        config.validate()?;

        let remote = fetch_remote_list(&self.client, config, &self.query).await?;

        let reconciliation = {
            let mut view = self.view.write().await;
            view.set_max_len(config.limit_items);
            ListReconciler::new(&self.cache)
                .excluding(self.query.current_item)
                .reconcile(&mut view, &remote)
                .await
        };
        if !reconciliation.changes.is_empty() {
            self.observer.apply(&reconciliation.changes);
        }

        let targets = {
            let view = self.view.read().await;
            reconciliation
                .inserted_ids
                .iter()
                .map(|&id| FetchTarget {
                    item: id,
                    title: view.get(id).map(|item| item.fields.title.subject.clone()),
                })
                .collect::<Vec<_>>()
        };
        let fetch = self.fetch_details(config, targets).await;

        Ok(CycleReport {
            started_at,
            inserted_ids: reconciliation.inserted_ids,
            fetch,
        })
    }

    async fn fetch_details(&self, config: &LiveConfig, targets: Vec<FetchTarget>) -> BatchReport {
        if targets.is_empty() {
            return BatchReport::default();
        }

        let mut fetcher = Fetcher::new(self.client.clone(), self.cache.clone(), config)
            .with_observer(self.observer.clone());
        if let Some(notifier) = &self.notifier {
            fetcher = fetcher.with_notifier(notifier.clone());
        }
        let report = BatchFetcher::new(fetcher, config.retry_policy())
            .fetch_all(self.collection(), targets)
            .await;

        let succeeded = report.succeeded();
        if !succeeded.is_empty() {
            let mut view = self.view.write().await;
            for id in succeeded {
                if let Some(item) = view.get_mut(id) {
                    item.detail_available = true;
                }
            }
        }
        debug!(
            collection = self.collection(),
            fetched = report.outcomes.len(),
            "details fetched"
        );
        report
    }
}
