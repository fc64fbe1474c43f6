use serde::Deserialize;
use tracing::debug;

use super::{SearchProvider, MAX_ERROR_BODY_BYTES};
use crate::error::{upstream_error, CommonError};
use crate::types::SearchResult;

pub const SERPER_DEFAULT_BASE_URL: &str = "https://google.serper.dev";

/// Serper (Google results) over `POST {base}/search`.
#[derive(Clone)]
pub struct SerperProvider {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerperProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent("search-gateway/serper")
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http,
        })
    }
}

impl SearchProvider for SerperProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, CommonError> {
        let url = format!("{}/search", self.base_url);
        let body = serde_json::json!({ "q": query, "num": limit });
        let resp = self
            .http
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(upstream_error(self.name(), resp, MAX_ERROR_BODY_BYTES).await);
        }

        let bytes = resp.bytes().await?;
        let data: SerperResponse = serde_json::from_slice(&bytes)?;
        let results: Vec<SearchResult> = data
            .organic
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .take(limit)
            .map(|r| SearchResult::new(r.title, r.link, r.snippet, "web"))
            .collect();
        debug!(count = results.len(), "serper returned results");
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "serper"
    }
}
