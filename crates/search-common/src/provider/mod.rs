//! Search provider adapters.
//!
//! Each provider issues one HTTP query and normalizes the answer into [`SearchResult`]s.
//! [`WebSearch`] picks the concrete provider at startup: Serper when an API key is configured,
//! the keyless DuckDuckGo instant-answer API otherwise.

mod duckduckgo;
mod serper;

pub use duckduckgo::{DuckDuckGoProvider, DUCKDUCKGO_DEFAULT_BASE_URL};
pub use serper::{SerperProvider, SERPER_DEFAULT_BASE_URL};

use std::future::Future;

use crate::error::CommonError;
use crate::types::SearchResult;

/// Upper bound on how much of an upstream error body is kept.
pub(crate) const MAX_ERROR_BODY_BYTES: usize = 8 * 1024;

/// A search backend that can answer a free-text query.
///
/// Implementations must be `Send + Sync` so fetches can run concurrently.
pub trait SearchProvider: Send + Sync {
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SearchResult>, CommonError>> + Send;

    fn name(&self) -> &'static str;
}

/// The general web search used by the gateway.
#[derive(Clone)]
pub enum WebSearch {
    Serper(SerperProvider),
    DuckDuckGo(DuckDuckGoProvider),
}

impl WebSearch {
    /// Serper if `serper_api_key` is present, DuckDuckGo otherwise.
    pub fn select(
        serper_api_key: Option<&str>,
        serper_base_url: &str,
        duckduckgo_base_url: &str,
    ) -> Result<Self, CommonError> {
        match serper_api_key {
            Some(key) => Ok(Self::Serper(SerperProvider::new(serper_base_url, key)?)),
            None => Ok(Self::DuckDuckGo(DuckDuckGoProvider::new(duckduckgo_base_url)?)),
        }
    }
}

impl SearchProvider for WebSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, CommonError> {
        match self {
            Self::Serper(p) => p.search(query, limit).await,
            Self::DuckDuckGo(p) => p.search(query, limit).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Serper(p) => p.name(),
            Self::DuckDuckGo(p) => p.name(),
        }
    }
}
