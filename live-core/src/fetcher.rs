use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, warn};

use crate::cache::ContentCache;
use crate::config::{Endpoints, LiveConfig};
use crate::error::FetchError;
use crate::normalize::{normalize_detail, NormalizedContent};
use crate::observer::{
    LoadingGuard, Notification, NullObserver, SharedNotifier, SharedObserver,
};

/// An item to fetch, with the list title used for notification matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    pub item: u64,
    pub title: Option<String>,
}

impl From<u64> for FetchTarget {
    fn from(item: u64) -> Self {
        Self { item, title: None }
    }
}

/// Retrieves one item's detail content and stores it in the cache.
#[async_trait]
pub trait DetailFetch: Send + Sync {
    async fn fetch(
        &self,
        collection: &str,
        target: &FetchTarget,
    ) -> Result<NormalizedContent, FetchError>;
}

pub struct Fetcher {
    client: Client,
    cache: Arc<ContentCache>,
    endpoints: Endpoints,
    user_agent: String,
    timeout: Duration,
    rules: Vec<Regex>,
    observer: SharedObserver,
    notifier: Option<SharedNotifier>,
}

impl Fetcher {
    pub fn new(client: Client, cache: Arc<ContentCache>, config: &LiveConfig) -> Self {
        let rules = if config.notification {
            compile_rules(&config.notification_rules)
        } else {
            Vec::new()
        };
        Self {
            client,
            cache,
            endpoints: config.endpoints.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.request_timeout(),
            rules,
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

    async fn fetch_content(
        &self,
        collection: &str,
        item: u64,
    ) -> Result<NormalizedContent, FetchError> {
        let url = self.endpoints.detail_url(collection, item);
        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(item, e))?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(FetchError::AccessDenied { item });
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                item,
                status: status.as_u16(),
            });
        }

        let document = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(item, e))?;
        normalize_detail(&document).ok_or(FetchError::Malformed { item })
    }

    fn notify_on_match(&self, collection: &str, target: &FetchTarget, content: &NormalizedContent) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let title = target.title.clone().unwrap_or_default();
        let haystack = format!("{title}\n{}", content.text);
        if let Some(rule) = self.rules.iter().find(|rule| rule.is_match(&haystack)) {
            debug!(item = target.item, rule = %rule, "notification rule matched");
            notifier.notify(Notification {
                title,
                body: content.text.clone(),
                link: self.endpoints.view_link(collection, target.item),
            });
        }
    }
}

#[async_trait]
impl DetailFetch for Fetcher {
    async fn fetch(
        &self,
        collection: &str,
        target: &FetchTarget,
    ) -> Result<NormalizedContent, FetchError> {
        let _loading = LoadingGuard::acquire(self.observer.as_ref(), collection, target.item);
        let content = self.fetch_content(collection, target.item).await?;
        self.notify_on_match(collection, target, &content);
        self.cache
            .set(collection, target.item, content.html.clone())
            .await;
        Ok(content)
    }
}

fn compile_rules(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(rule) => Some(rule),
            Err(err) => {
                warn!(%pattern, %err, "ignoring invalid notification rule");
                None
            }
        })
        .collect()
}
