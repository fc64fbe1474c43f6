use serde::{Deserialize, Serialize};

/// A single normalized result from a search provider or source fetcher.
///
/// Immutable once produced; consumed by the classifier and the completion prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Source tag, e.g. "web", "linkedin", "custom:example.com".
    pub source: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            source: source.into(),
        }
    }

    /// Title and snippet joined, lowercased. Used for keyword matching.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.snippet).to_lowercase()
    }

    /// Host of `url` without a leading `www.`, if the URL parses.
    pub fn domain(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
    }
}
