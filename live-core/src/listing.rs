use reqwest::{header, Client};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::LiveConfig;
use crate::error::{ConfigError, PollError};
use crate::item::{RemoteItem, RemoteRecord};

/// Marker present on the landing page of an access-restricted collection.
const RESTRICTED_MARKER: &str = "penalty-box";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub collection: String,
    pub page: u32,
    pub head_id: Option<u32>,
    pub search_type: Option<String>,
    pub keyword: Option<String>,
    pub recommend: bool,
    pub notice: bool,
    pub list_num: u32,
    /// Item shown on the caller's current page; excluded from reconciliation.
    pub current_item: Option<u64>,
}

impl ListQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            page: 1,
            head_id: None,
            search_type: None,
            keyword: None,
            recommend: false,
            notice: false,
            list_num: 50,
            current_item: None,
        }
    }

    /// Builds the query a list or view page URL stands for.
    pub fn from_page_url(url: &Url) -> Result<Self, ConfigError> {
        let mut query = None::<ListQuery>;
        let mut rest = Vec::new();
        for (key, value) in url.query_pairs() {
            if key == "id" && !value.is_empty() {
                query = Some(ListQuery::new(value.into_owned()));
            } else {
                rest.push((key.into_owned(), value.into_owned()));
            }
        }
        let mut query = query.ok_or(ConfigError::Missing("id"))?;

        for (key, value) in rest {
            match key.as_str() {
                "page" => query.page = value.parse().unwrap_or(1),
                "search_head" => query.head_id = value.parse().ok(),
                "list_num" => query.list_num = value.parse().unwrap_or(50),
                "s_type" if !value.is_empty() => query.search_type = Some(value),
                "s_keyword" if !value.is_empty() => query.keyword = Some(value),
                "exception_mode" => match value.as_str() {
                    "recommend" => query.recommend = true,
                    "notice" => query.notice = true,
                    _ => {}
                },
                "no" => query.current_item = value.parse().ok(),
                _ => {}
            }
        }
        Ok(query)
    }

    pub fn form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![("id", self.collection.clone()), ("page", self.page.to_string())];
        if let Some(head_id) = self.head_id {
            form.push(("headid", head_id.to_string()));
        }
        if let Some(search_type) = &self.search_type {
            form.push(("s_type", search_type_code(search_type).to_owned()));
        }
        if let Some(keyword) = &self.keyword {
            form.push(("serval", keyword.clone()));
        }
        if self.recommend {
            form.push(("recommend", "1".to_owned()));
        }
        if self.notice {
            form.push(("notice", "1".to_owned()));
        }
        form
    }
}

/// Maps desktop search types to the codes the list endpoint expects.
pub fn search_type_code(search_type: &str) -> &str {
    match search_type {
        "search_all" => "all",
        "search_subject" => "subject",
        "search_memo" => "memo",
        "search_name" => "name",
        "search_subject_memo" => "subject_m",
        other => other,
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    gall_list: ListData,
}

#[derive(Debug, Deserialize)]
struct ListData {
    data: Vec<RemoteRecord>,
}

/// Parses a list response body, newest first.
pub fn parse_list(body: &str) -> Result<Vec<RemoteItem>, PollError> {
    let response: ListResponse = serde_json::from_str(body)?;
    let mut items: Vec<RemoteItem> = response
        .gall_list
        .data
        .into_iter()
        .map(RemoteItem::from)
        .collect();
    items.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(items)
}

pub async fn fetch_remote_list(
    client: &Client,
    config: &LiveConfig,
    query: &ListQuery,
) -> Result<Vec<RemoteItem>, PollError> {
    let endpoints = &config.endpoints;
    let referer = format!("{}?page={}", endpoints.landing_url(&query.collection), query.page);
    let mut request = client
        .post(&endpoints.list_url)
        .timeout(config.request_timeout())
        .header(header::REFERER, referer)
        .header(header::COOKIE, format!("list_num={}", query.list_num))
        .form(&query.form());
    if let Some(origin) = endpoints.origin() {
        request = request.header(header::ORIGIN, origin);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(PollError::Status(status.as_u16()));
    }
    let body = response.text().await?;
    let items = parse_list(&body)?;
    debug!(collection = %query.collection, entries = items.len(), "remote list polled");
    Ok(items)
}

/// Fails with [`PollError::AccessRestricted`] when the collection's landing
/// page reports a restriction.
pub async fn check_access(
    client: &Client,
    config: &LiveConfig,
    collection: &str,
) -> Result<(), PollError> {
    let response = client
        .get(config.endpoints.landing_url(collection))
        .header(header::USER_AGENT, &config.user_agent)
        .timeout(config.request_timeout())
        .send()
        .await?;
    let body = response.text().await?;
    if body.contains(RESTRICTED_MARKER) {
        return Err(PollError::AccessRestricted(collection.to_owned()));
    }
    Ok(())
}
