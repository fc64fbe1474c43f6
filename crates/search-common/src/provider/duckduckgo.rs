use serde::Deserialize;
use tracing::debug;

use super::{SearchProvider, MAX_ERROR_BODY_BYTES};
use crate::error::{upstream_error, CommonError};
use crate::types::SearchResult;

pub const DUCKDUCKGO_DEFAULT_BASE_URL: &str = "https://api.duckduckgo.com";

/// Word count used for a title when the topic text has no " - " separator.
const FALLBACK_TITLE_WORDS: usize = 8;

/// DuckDuckGo instant-answer API. Needs no key, returns abstract + related topics.
#[derive(Clone)]
pub struct DuckDuckGoProvider {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a leaf topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
    Leaf {
        #[serde(rename = "FirstURL", default)]
        first_url: String,
        #[serde(rename = "Text", default)]
        text: String,
    },
}

impl DuckDuckGoProvider {
    pub fn new(base_url: &str) -> Result<Self, CommonError> {
        let http = reqwest::Client::builder()
            .user_agent("search-gateway/duckduckgo")
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl SearchProvider for DuckDuckGoProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, CommonError> {
        let url = format!("{}/", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(upstream_error(self.name(), resp, MAX_ERROR_BODY_BYTES).await);
        }

        let bytes = resp.bytes().await?;
        let answer: InstantAnswer = serde_json::from_slice(&bytes)?;
        let results = to_results(answer, limit);
        debug!(count = results.len(), "duckduckgo returned results");
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "duckduckgo"
    }
}

fn to_results(answer: InstantAnswer, limit: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    if !answer.abstract_url.is_empty() && !answer.abstract_text.is_empty() {
        let title = if answer.heading.is_empty() {
            split_title(&answer.abstract_text)
        } else {
            answer.heading.clone()
        };
        results.push(SearchResult::new(
            title,
            answer.abstract_url,
            answer.abstract_text,
            "web",
        ));
    }

    let mut leaves = Vec::new();
    flatten_topics(answer.related_topics, &mut leaves);
    for (url, text) in leaves {
        if url.is_empty() || text.is_empty() {
            continue;
        }
        results.push(SearchResult::new(split_title(&text), url, text, "web"));
    }

    results.truncate(limit);
    results
}

fn flatten_topics(topics: Vec<RelatedTopic>, out: &mut Vec<(String, String)>) {
    for topic in topics {
        match topic {
            RelatedTopic::Group { topics } => flatten_topics(topics, out),
            RelatedTopic::Leaf { first_url, text } => out.push((first_url, text)),
        }
    }
}

fn split_title(text: &str) -> String {
    match text.split_once(" - ") {
        Some((title, _)) => title.trim().to_string(),
        None => text
            .split_whitespace()
            .take(FALLBACK_TITLE_WORDS)
            .collect::<Vec<_>>()
            .join(" "),
    }
}
