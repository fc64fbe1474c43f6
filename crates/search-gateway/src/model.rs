//! Wire types for the search endpoints.

use search_common::types::SearchResult;
use serde::{Deserialize, Serialize};

use crate::classifier::{CategorizedResult, Metrics};
use crate::error::AppError;
use crate::llm::LlmResponse;
use crate::sources::{SearchMode, Source};

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub custom_urls: Vec<String>,
    /// Accepted for compatibility with the UI; uploads are not processed.
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
    #[serde(default, rename = "useLLM")]
    pub use_llm: bool,
}

/// A request that passed validation. Nothing external has been called yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSearch {
    pub query: String,
    pub mode: SearchMode,
    pub model: Option<String>,
    pub sources: Vec<Source>,
    /// Hosts of `customUrls`, lowercased, without `www.`.
    pub custom_hosts: Vec<String>,
    pub use_llm: bool,
}

impl SearchRequest {
    /// Check the request. `path_mode` comes from `/api/search/{mode}` and overrides the body.
    pub fn validate(self, path_mode: Option<SearchMode>) -> Result<ValidatedSearch, AppError> {
        let query = self.query.trim().to_string();
        if query.is_empty() {
            return Err(AppError::Validation("query must not be empty".to_string()));
        }

        let mode = match (path_mode, self.mode.as_deref().map(str::trim)) {
            (Some(mode), _) => mode,
            (None, None | Some("")) => SearchMode::default(),
            (None, Some(raw)) => SearchMode::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown search mode: {raw}")))?,
        };

        let mut sources = Vec::with_capacity(self.sources.len());
        for id in &self.sources {
            match Source::parse(id) {
                Some(source) => sources.push(source),
                None => tracing::warn!(source = %id, "ignoring unknown source id"),
            }
        }

        let custom_hosts = self
            .custom_urls
            .iter()
            .map(|raw| custom_host(raw))
            .collect::<Result<Vec<_>, _>>()?;

        if !self.files.is_empty() {
            tracing::info!(files = self.files.len(), "ignoring uploaded files");
        }

        Ok(ValidatedSearch {
            query,
            mode,
            model: self
                .model
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty()),
            sources,
            custom_hosts,
            use_llm: self.use_llm,
        })
    }
}

fn custom_host(raw: &str) -> Result<String, AppError> {
    let invalid = |reason: &str| AppError::Validation(format!("invalid custom URL {raw:?}: {reason}"));

    let parsed = url::Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("only http and https URLs are supported"));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| invalid("missing host"))?
        .to_ascii_lowercase();
    Ok(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub categories: Vec<CategorizedResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_response: Option<LlmResponse>,
    pub metrics: Metrics,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
