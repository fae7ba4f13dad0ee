use std::collections::HashSet;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{FailureKind, FetchError};
use crate::fetcher::{DetailFetch, FetchTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub concurrency: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failed_attempt`-th failure (1-based), doubling each time.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let shift = failed_attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(1u64 << shift))
    }
}

#[derive(Debug)]
pub struct ItemOutcome {
    pub item: u64,
    pub attempts: u32,
    pub result: Result<(), FetchError>,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> Vec<u64> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.item)
            .collect()
    }

    pub fn failed(&self) -> Vec<u64> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.item)
            .collect()
    }

    pub fn outcome(&self, item: u64) -> Option<&ItemOutcome> {
        self.outcomes.iter().find(|o| o.item == item)
    }
}

/// Runs a [`DetailFetch`] over many items with a concurrency cap and per-item
/// retries. Failures stay with their item and never fail the batch.
pub struct BatchFetcher<F> {
    fetcher: F,
    policy: RetryPolicy,
}

impl<F: DetailFetch> BatchFetcher<F> {
    pub fn new(fetcher: F, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub async fn fetch_all<I, T>(&self, collection: &str, targets: I) -> BatchReport
    where
        I: IntoIterator<Item = T>,
        T: Into<FetchTarget>,
    {
        let mut seen = HashSet::new();
        let targets: Vec<FetchTarget> = targets
            .into_iter()
            .map(Into::into)
            .filter(|target: &FetchTarget| seen.insert(target.item))
            .collect();
        if targets.is_empty() {
            return BatchReport::default();
        }

        debug!(
            collection,
            items = targets.len(),
            concurrency = self.policy.concurrency,
            "fetching batch"
        );
        let outcomes: Vec<ItemOutcome> = stream::iter(targets)
            .map(|target| self.fetch_with_retry(collection, target))
            .buffer_unordered(self.policy.concurrency.max(1))
            .collect()
            .await;

        let report = BatchReport { outcomes };
        info!(
            collection,
            succeeded = report.succeeded().len(),
            failed = report.failed().len(),
            "batch finished"
        );
        report
    }

    async fn fetch_with_retry(&self, collection: &str, target: FetchTarget) -> ItemOutcome {
        let total_attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.fetcher.fetch(collection, &target).await {
                Ok(_) => {
                    return ItemOutcome {
                        item: target.item,
                        attempts: attempt,
                        result: Ok(()),
                    }
                }
                Err(err) => err,
            };

            let retries_left = total_attempts - attempt;
            warn!(
                item = target.item,
                attempt,
                retries_left,
                error = %err,
                "detail fetch failed"
            );
            if err.kind() == FailureKind::Permanent || retries_left == 0 {
                return ItemOutcome {
                    item: target.item,
                    attempts: attempt,
                    result: Err(err),
                };
            }
            tokio::time::sleep(self.policy.backoff(attempt)).await;
        }
    }
}
