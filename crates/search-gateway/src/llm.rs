//! Answer synthesis over search results.
//!
//! Builds one prompt from the query and numbered results, calls the hosted completion
//! endpoint of the model's provider, and rewrites `[Source N]` citations in the answer into
//! markdown links to the matching result URL.

use regex::{Captures, Regex};
use search_common::completion::{ChatCompletionRequest, CompletionClient, CompletionConfig, Message};
use search_common::error::CommonError;
use search_common::types::SearchResult;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Config, LlmCredentials};
use crate::error::AppError;

/// Results beyond this are not sent to the model.
const MAX_PROMPT_SOURCES: usize = 10;
const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 1024;

const SYSTEM_PROMPT: &str = "You are a research assistant. Answer the question using the \
numbered sources provided. Cite every claim as [Source N](URL), using the URL listed for that \
source. Format the answer in markdown and keep it concise.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Together,
    Perplexity,
}

impl LlmProvider {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Together => "together",
            Self::Perplexity => "perplexity",
        }
    }
}

#[derive(Debug)]
pub struct ModelSpec {
    /// Short name accepted from the UI.
    pub alias: &'static str,
    /// Id sent to the provider.
    pub id: &'static str,
    pub provider: LlmProvider,
}

pub static MODELS: &[ModelSpec] = &[
    ModelSpec {
        alias: "llama-3.1-70b",
        id: "meta-llama/Meta-Llama-3.1-70B-Instruct-Turbo",
        provider: LlmProvider::Together,
    },
    ModelSpec {
        alias: "mixtral-8x7b",
        id: "mistralai/Mixtral-8x7B-Instruct-v0.1",
        provider: LlmProvider::Together,
    },
    ModelSpec {
        alias: "llama-3.1-8b",
        id: "meta-llama/Meta-Llama-3.1-8B-Instruct-Turbo",
        provider: LlmProvider::Together,
    },
    ModelSpec {
        alias: "qwen-2.5-72b",
        id: "Qwen/Qwen2.5-72B-Instruct-Turbo",
        provider: LlmProvider::Together,
    },
    ModelSpec {
        alias: "sonar",
        id: "sonar",
        provider: LlmProvider::Perplexity,
    },
    ModelSpec {
        alias: "sonar-pro",
        id: "sonar-pro",
        provider: LlmProvider::Perplexity,
    },
    ModelSpec {
        alias: "sonar-reasoning",
        id: "sonar-reasoning",
        provider: LlmProvider::Perplexity,
    },
];

/// Look a model up by alias or full provider id, case-insensitively.
pub fn lookup_model(name: &str) -> Option<&'static ModelSpec> {
    let name = name.trim();
    MODELS
        .iter()
        .find(|m| m.alias.eq_ignore_ascii_case(name) || m.id.eq_ignore_ascii_case(name))
}

/// The first model listed for `provider`.
fn default_model(provider: LlmProvider) -> &'static ModelSpec {
    MODELS
        .iter()
        .find(|m| m.provider == provider)
        .unwrap_or(&MODELS[0])
}

/// Output of the completion adapter, returned to the UI as `llmResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponse {
    pub answer: String,
    pub sources: Vec<SearchResult>,
    pub markdown: bool,
}

/// Completion clients for the configured providers.
pub struct LlmService {
    together: Option<CompletionClient>,
    perplexity: Option<CompletionClient>,
    links: LinkFixer,
}

impl LlmService {
    pub fn from_config(config: &Config) -> Result<Self, CommonError> {
        let client = |provider: LlmProvider, creds: &Option<LlmCredentials>| {
            creds
                .as_ref()
                .map(|c| {
                    CompletionClient::new(
                        CompletionConfig::new(provider.label(), &c.base_url, &c.api_key)
                            .with_timeout(config.llm_timeout)
                            .with_max_error_body_bytes(config.llm_max_error_body_bytes),
                    )
                })
                .transpose()
        };
        Ok(Self {
            together: client(LlmProvider::Together, &config.together)?,
            perplexity: client(LlmProvider::Perplexity, &config.perplexity)?,
            links: LinkFixer::new(),
        })
    }

    pub fn is_configured(&self, provider: LlmProvider) -> bool {
        self.client(provider).is_some()
    }

    fn client(&self, provider: LlmProvider) -> Option<&CompletionClient> {
        match provider {
            LlmProvider::Together => self.together.as_ref(),
            LlmProvider::Perplexity => self.perplexity.as_ref(),
        }
    }

    /// Resolve the model for a request.
    ///
    /// A named model must be in the registry (400 otherwise). Without a name the default of
    /// the first configured provider is used; `None` means no provider is configured.
    pub fn resolve_model(&self, requested: Option<&str>) -> Result<Option<&'static ModelSpec>, AppError> {
        match requested {
            Some(name) => lookup_model(name)
                .map(Some)
                .ok_or_else(|| AppError::Validation(format!("unknown model: {name}"))),
            None => Ok([LlmProvider::Together, LlmProvider::Perplexity]
                .into_iter()
                .find(|p| self.is_configured(*p))
                .map(default_model)),
        }
    }

    /// Ask `model` to answer `query` from `results`.
    pub async fn answer(
        &self,
        model: &ModelSpec,
        query: &str,
        results: &[SearchResult],
    ) -> Result<LlmResponse, AppError> {
        let client = self
            .client(model.provider)
            .ok_or_else(|| AppError::NotConfigured(model.provider.label().to_string()))?;

        let sources: Vec<SearchResult> = results.iter().take(MAX_PROMPT_SOURCES).cloned().collect();
        let request = ChatCompletionRequest {
            model: model.id.to_string(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(build_prompt(query, &sources)),
            ],
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_TOKENS),
        };

        info!(
            provider = client.provider(),
            model = model.id,
            sources = sources.len(),
            "requesting completion"
        );
        let raw = client.complete_text(&request).await?;

        Ok(LlmResponse {
            answer: self.links.fix(&raw, &sources),
            sources,
            markdown: true,
        })
    }
}

/// User message: the question followed by the numbered sources.
pub fn build_prompt(query: &str, sources: &[SearchResult]) -> String {
    let mut prompt = format!("Question: {query}\n\n");
    if sources.is_empty() {
        prompt.push_str("No sources were found. Answer from general knowledge and say that no sources were available.\n");
        return prompt;
    }
    prompt.push_str("Sources:\n");
    for (i, source) in sources.iter().enumerate() {
        prompt.push_str(&format!(
            "[Source {}] {}\nURL: {}\n{}\n\n",
            i + 1,
            source.title,
            source.url,
            source.snippet
        ));
    }
    prompt
}

/// Rewrites `[Source N]` citations into markdown links.
///
/// Four passes, in order:
/// 1. `[Source N](N)` becomes `[Source N](url)`.
/// 2. `[Source N]` not followed by `(` becomes `[Source N](url)`.
/// 3. A bare `Source N` with no surrounding brackets becomes `[Source N](url)`.
/// 4. A literal `(URL)` placeholder is resolved: `[Source N](URL)` becomes `[Source N](url)`,
///    and a ` (URL)` left after a link from the earlier passes is dropped.
///
/// N is 1-based. Citations whose N has no matching source are left as written.
pub struct LinkFixer {
    numbered: Regex,
    bracketed: Regex,
    mention: Regex,
    placeholder: Regex,
}

impl Default for LinkFixer {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkFixer {
    pub fn new() -> Self {
        Self {
            numbered: Regex::new(r"\[Source (\d+)\]\((\d+)\)").expect("valid regex"),
            bracketed: Regex::new(r"\[Source (\d+)\](\()?").expect("valid regex"),
            mention: Regex::new(r"(\[)?\bSource (\d+)(\])?").expect("valid regex"),
            placeholder: Regex::new(r"\[Source (\d+)\]\(([^)\s]*)\)(\s*\((?i:url|link)\))?")
                .expect("valid regex"),
        }
    }

    pub fn fix(&self, text: &str, sources: &[SearchResult]) -> String {
        let url_for = |n: &str| {
            n.parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| sources.get(i))
                .map(|s| s.url.as_str())
        };
        let link = |n: &str, original: &str| match url_for(n) {
            Some(url) => format!("[Source {n}]({url})"),
            None => original.to_string(),
        };

        let text = self
            .numbered
            .replace_all(text, |caps: &Captures| link(&caps[1], &caps[0]));

        let text = self.bracketed.replace_all(&text, |caps: &Captures| {
            if caps.get(2).is_some() {
                caps[0].to_string()
            } else {
                link(&caps[1], &caps[0])
            }
        });

        let text = self.mention.replace_all(&text, |caps: &Captures| {
            if caps.get(1).is_some() || caps.get(3).is_some() {
                caps[0].to_string()
            } else {
                link(&caps[2], &caps[0])
            }
        });

        self.placeholder
            .replace_all(&text, |caps: &Captures| {
                let target = &caps[2];
                if target.eq_ignore_ascii_case("url") || target.eq_ignore_ascii_case("link") {
                    link(&caps[1], &caps[0])
                } else if caps.get(3).is_some() {
                    format!("[Source {}]({target})", &caps[1])
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sources() -> Vec<SearchResult> {
        (1..=3)
            .map(|i| {
                SearchResult::new(
                    format!("Title {i}"),
                    format!("https://example.com/{i}"),
                    format!("Snippet {i}"),
                    "web",
                )
            })
            .collect()
    }

    fn service(together: Option<&str>, perplexity: Option<&str>) -> LlmService {
        let mut config = Config::from_lookup(|_| None).expect("config");
        config.together = together.map(|base_url| LlmCredentials {
            api_key: "together-key".to_string(),
            base_url: base_url.to_string(),
        });
        config.perplexity = perplexity.map(|base_url| LlmCredentials {
            api_key: "pplx-key".to_string(),
            base_url: base_url.to_string(),
        });
        LlmService::from_config(&config).expect("service")
    }

    #[test]
    fn fixes_all_citation_shapes() {
        let fixed = LinkFixer::new().fix(
            "Growth is strong [Source 1]. Revenue rose [Source 2](2). Margins [Source 3](URL).",
            &sources(),
        );
        assert_eq!(
            fixed,
            "Growth is strong [Source 1](https://example.com/1). \
             Revenue rose [Source 2](https://example.com/2). \
             Margins [Source 3](https://example.com/3)."
        );
    }

    #[test]
    fn bare_mentions_become_links() {
        let fixed = LinkFixer::new().fix("As Source 2 notes, demand grew.", &sources());
        assert_eq!(fixed, "As [Source 2](https://example.com/2) notes, demand grew.");
    }

    #[test]
    fn trailing_url_placeholder_is_dropped() {
        let fixer = LinkFixer::new();
        assert_eq!(
            fixer.fix("see Source 3 (URL).", &sources()),
            "see [Source 3](https://example.com/3)."
        );
        assert_eq!(
            fixer.fix("[Source 3] (URL).", &sources()),
            "[Source 3](https://example.com/3)."
        );
        assert_eq!(
            fixer.fix("[Source 1](https://example.com/1) (link)", &sources()),
            "[Source 1](https://example.com/1)"
        );
    }

    #[test]
    fn placeholder_on_unknown_source_is_kept() {
        let text = "Unknown Source 9 (URL).";
        assert_eq!(LinkFixer::new().fix(text, &sources()), text);
    }

    #[test]
    fn existing_links_are_untouched() {
        let text = "See [Source 1](https://example.com/1).";
        assert_eq!(LinkFixer::new().fix(text, &sources()), text);
    }

    #[test]
    fn out_of_range_citations_are_left_alone() {
        let text = "Unknown [Source 9] and [Source 0](0) and Source 7.";
        assert_eq!(LinkFixer::new().fix(text, &sources()), text);
    }

    #[test]
    fn fixing_twice_changes_nothing() {
        let fixer = LinkFixer::new();
        let once = fixer.fix("[Source 1], Source 2 and [Source 3](link)", &sources());
        assert_eq!(fixer.fix(&once, &sources()), once);
    }

    #[test]
    fn prompt_numbers_sources_from_one() {
        let prompt = build_prompt("cloud growth", &sources());
        assert!(prompt.starts_with("Question: cloud growth"));
        assert!(prompt.contains("[Source 1] Title 1\nURL: https://example.com/1\nSnippet 1"));
        assert!(prompt.contains("[Source 3] Title 3"));
    }

    #[test]
    fn prompt_without_sources_says_so() {
        let prompt = build_prompt("cloud growth", &[]);
        assert!(prompt.contains("No sources were found"));
        assert!(!prompt.contains("[Source"));
    }

    #[test]
    fn lookup_accepts_alias_and_full_id() {
        assert_eq!(lookup_model("SONAR").map(|m| m.id), Some("sonar"));
        assert_eq!(
            lookup_model("mistralai/Mixtral-8x7B-Instruct-v0.1").map(|m| m.alias),
            Some("mixtral-8x7b")
        );
        assert!(lookup_model("gpt-5").is_none());
    }

    #[test]
    fn resolve_model_rules() {
        let none = service(None, None);
        assert!(matches!(
            none.resolve_model(Some("gpt-5")),
            Err(AppError::Validation(_))
        ));
        assert!(none.resolve_model(None).expect("ok").is_none());

        let pplx_only = service(None, Some("http://localhost:1"));
        let default = pplx_only.resolve_model(None).expect("ok").expect("model");
        assert_eq!(default.provider, LlmProvider::Perplexity);
        assert_eq!(default.alias, "sonar");

        let both = service(Some("http://localhost:1"), Some("http://localhost:1"));
        let default = both.resolve_model(None).expect("ok").expect("model");
        assert_eq!(default.provider, LlmProvider::Together);
    }

    #[tokio::test]
    async fn missing_provider_key_is_not_configured() {
        let svc = service(None, None);
        let model = lookup_model("sonar").expect("known");
        let err = svc.answer(model, "q", &sources()).await.expect_err("fails");
        assert!(matches!(err, AppError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn answer_calls_provider_and_fixes_links() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer pplx-key"))
            .and(body_partial_json(json!({"model": "sonar-pro"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "Cloud grew [Source 1]."},
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(None, Some(&server.uri()));
        let model = lookup_model("sonar-pro").expect("known");
        let response = svc.answer(model, "cloud", &sources()).await.expect("answer");

        assert_eq!(response.answer, "Cloud grew [Source 1](https://example.com/1).");
        assert_eq!(response.sources.len(), 3);
        assert!(response.markdown);
    }

    #[tokio::test]
    async fn upstream_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let svc = service(Some(&server.uri()), None);
        let model = lookup_model("llama-3.1-70b").expect("known");
        let err = svc.answer(model, "cloud", &sources()).await.expect_err("fails");
        match err {
            AppError::Common(e) => assert_eq!(e.upstream_body(), Some("quota exceeded")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
