use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::batch::RetryPolicy;
use crate::error::{ConfigError, StoreError};
use crate::store::{KeyValueStore, CONFIG_KEY};

pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (Android 7.0; Mobile)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub limit_items: usize,
    pub limit_cache: usize,
    pub notification: bool,
    pub notification_rules: Vec<String>,
    pub user_agent: String,
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Remote list endpoint (form POST, JSON response).
    pub list_url: String,
    /// Detail pages live at `<detail_base>/<collection>/<item>`.
    pub detail_base: String,
    /// Landing page of a collection, also the list request referer.
    pub landing_base: String,
    /// Desktop view page used for notification deep links.
    pub view_base: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            concurrency: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            request_timeout_secs: 5,
            limit_items: 50,
            limit_cache: 500,
            notification: false,
            notification_rules: Vec::new(),
            user_agent: MOBILE_USER_AGENT.to_owned(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            list_url: "https://m.dcinside.com/ajax/response-list".to_owned(),
            detail_base: "https://m.dcinside.com/board".to_owned(),
            landing_base: "https://m.dcinside.com/board".to_owned(),
            view_base: "https://gall.dcinside.com/board/view/".to_owned(),
        }
    }
}

impl Endpoints {
    /// Every endpoint rooted at `base`, for pointing the client at a mock server.
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            list_url: format!("{base}/ajax/response-list"),
            detail_base: format!("{base}/board"),
            landing_base: format!("{base}/board"),
            view_base: format!("{base}/board/view/"),
        }
    }

    pub fn detail_url(&self, collection: &str, item: u64) -> String {
        format!("{}/{collection}/{item}", self.detail_base.trim_end_matches('/'))
    }

    pub fn landing_url(&self, collection: &str) -> String {
        format!("{}/{collection}", self.landing_base.trim_end_matches('/'))
    }

    pub fn view_link(&self, collection: &str, item: u64) -> String {
        format!("{}?id={collection}&no={item}", self.view_base)
    }

    pub fn origin(&self) -> Option<String> {
        Url::parse(&self.list_url)
            .ok()
            .map(|url| url.origin().ascii_serialization())
    }
}

impl LiveConfig {
    /// Reads the configuration; absent or malformed values fall back to defaults.
    pub async fn load(store: &dyn KeyValueStore) -> Self {
        match store.get(CONFIG_KEY).await {
            Some(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(%err, "stored configuration is malformed; using defaults");
                Self::default()
            }),
            None => Self::default(),
        }
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        store.set(CONFIG_KEY, serde_json::to_value(self)?).await
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Zero("concurrency"));
        }
        if self.limit_items == 0 {
            return Err(ConfigError::Zero("limit_items"));
        }
        if self.limit_cache == 0 {
            return Err(ConfigError::Zero("limit_cache"));
        }
        for (name, value) in [
            ("endpoints.list_url", &self.endpoints.list_url),
            ("endpoints.detail_base", &self.endpoints.detail_base),
            ("endpoints.landing_base", &self.endpoints.landing_base),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Missing(name));
            }
            Url::parse(value).map_err(|e| ConfigError::Url(value.clone(), e))?;
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            concurrency: self.concurrency,
            max_retries: self.max_retries,
            backoff_ms: self.retry_backoff_ms,
        }
    }
}
