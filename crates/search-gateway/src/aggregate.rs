//! Fan-out over the planned sources and fan-in into one de-duplicated result list.

use std::collections::HashSet;
use std::time::Duration;

use futures::future::join_all;
use search_common::error::CommonError;
use search_common::provider::SearchProvider;
use search_common::types::SearchResult;
use tracing::{debug, warn};
use url::Url;

use crate::sources::{fetch_source, Source, SourceBatch};

/// Query parameters dropped before comparing URLs.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
];

pub struct Aggregator<P> {
    provider: P,
    fetch_timeout: Duration,
    max_results: usize,
}

impl<P: SearchProvider> Aggregator<P> {
    pub fn new(provider: P, fetch_timeout: Duration, max_results: usize) -> Self {
        Self {
            provider,
            fetch_timeout,
            max_results,
        }
    }

    /// Run every source concurrently and merge what came back.
    ///
    /// Failed and timed-out fetches are logged and dropped. When nothing succeeded and at
    /// least one failure was an upstream error, that error is returned instead of an empty
    /// list. Dropping the returned future cancels all fetches still in flight.
    pub async fn gather(&self, query: &str, plan: &[Source]) -> Result<Vec<SearchResult>, CommonError> {
        let fetches = plan.iter().map(|source| async move {
            let outcome = tokio::time::timeout(
                self.fetch_timeout,
                fetch_source(&self.provider, source, query, self.max_results),
            )
            .await;
            (source, outcome)
        });
        let outcomes = join_all(fetches).await;

        let mut batches = Vec::with_capacity(outcomes.len());
        let mut upstream_failure: Option<CommonError> = None;
        for (source, outcome) in outcomes {
            match outcome {
                Ok(Ok(batch)) => {
                    debug!(source = %batch.source, results = batch.results.len(), "source fetched");
                    batches.push(batch);
                }
                Ok(Err(e)) => {
                    warn!(source = %source, provider = self.provider.name(), error = %e, "source fetch failed");
                    if e.is_upstream() && upstream_failure.is_none() {
                        upstream_failure = Some(e);
                    }
                }
                Err(_) => {
                    warn!(
                        source = %source,
                        timeout_secs = self.fetch_timeout.as_secs(),
                        "source fetch timed out"
                    );
                }
            }
        }

        if batches.is_empty() {
            if let Some(e) = upstream_failure {
                return Err(e);
            }
        }
        Ok(merge(batches))
    }
}

/// Flatten batches by descending source weight, keeping the first copy of each URL.
///
/// Batches with equal weight keep their plan order.
pub fn merge(mut batches: Vec<SourceBatch>) -> Vec<SearchResult> {
    batches.sort_by(|a, b| b.weight.total_cmp(&a.weight));

    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for batch in batches {
        for result in batch.results {
            if seen.insert(normalize_url(&result.url)) {
                merged.push(result);
            }
        }
    }
    merged
}

/// Canonical form of a URL for duplicate detection: lowercase host without `www.`, no
/// fragment, no tracking parameters, no trailing slash. Unparseable input is returned as is.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };
    parsed.set_fragment(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    let host = parsed.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    let mut normalized = format!("{}://{host}", parsed.scheme());
    if let Some(port) = parsed.port() {
        normalized.push_str(&format!(":{port}"));
    }
    normalized.push_str(parsed.path().trim_end_matches('/'));
    if let Some(query) = parsed.query() {
        normalized.push('?');
        normalized.push_str(query);
    }
    normalized
}
