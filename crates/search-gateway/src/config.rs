use std::net::SocketAddr;
use std::time::Duration;

use search_common::completion::{PERPLEXITY_DEFAULT_BASE_URL, TOGETHER_DEFAULT_BASE_URL};
use search_common::provider::{DUCKDUCKGO_DEFAULT_BASE_URL, SERPER_DEFAULT_BASE_URL};

use crate::error::AppError;
use crate::oauth::OAuthProvider;

/// Credentials for one hosted completion provider.
#[derive(Debug, Clone)]
pub struct LlmCredentials {
    pub api_key: String,
    pub base_url: String,
}

/// Client credentials and redirect URI for one OAuth provider.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Application configuration, read once from the environment at startup.
///
/// Everything external is optional except the bind address and base URL (which default).
/// Missing search or LLM keys switch the corresponding feature to its keyless fallback or
/// off; missing OAuth credentials disable that provider.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Public origin of the front-end, used for OAuth redirects and CORS.
    pub base_url: String,

    pub serper_api_key: Option<String>,
    pub serper_base_url: String,
    pub duckduckgo_base_url: String,
    /// Upper bound on a single source fetch.
    pub fetch_timeout: Duration,
    /// Results requested per fetch.
    pub max_results: usize,

    pub together: Option<LlmCredentials>,
    pub perplexity: Option<LlmCredentials>,
    pub llm_timeout: Duration,
    pub llm_max_error_body_bytes: usize,

    pub linkedin: Option<OAuthCredentials>,
    pub twitter: Option<OAuthCredentials>,
    pub facebook: Option<OAuthCredentials>,
    pub reddit: Option<OAuthCredentials>,

    /// `None` disables the search response cache.
    pub redis_url: Option<String>,
    pub search_cache_ttl_secs: u64,
    /// `None` disables rate limiting on the search endpoints.
    pub rate_limit_rps: Option<u32>,
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// Optional:
    /// - `BIND_ADDR` (default "0.0.0.0:8080"), `NEXT_PUBLIC_BASE_URL` (default "http://localhost:3000")
    /// - `SERPER_API_KEY`, `SERPER_BASE_URL`, `DUCKDUCKGO_BASE_URL`
    /// - `SEARCH_FETCH_TIMEOUT_SECS` (default 10), `SEARCH_MAX_RESULTS` (default 10)
    /// - `TOGETHER_API_KEY`, `TOGETHER_BASE_URL`, `PERPLEXITY_API_KEY`, `PERPLEXITY_BASE_URL`
    /// - `LLM_TIMEOUT_SECS` (default 60), `LLM_MAX_ERROR_BODY_BYTES` (default 8192)
    /// - `{LINKEDIN,TWITTER,FACEBOOK,REDDIT}_CLIENT_ID` / `_CLIENT_SECRET` / `_REDIRECT_URI`
    /// - `REDIS_URL`, `SEARCH_CACHE_TTL_SECS` (default 600), `RATE_LIMIT_RPS`
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = var("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR is not a socket address: {e}")))?;

        let base_url = var("NEXT_PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url)
            .map_err(|e| AppError::Config(format!("NEXT_PUBLIC_BASE_URL is not a URL: {e}")))?;

        let llm = |key_var: &str, url_var: &str, default_url: &str| {
            var(key_var).map(|api_key| LlmCredentials {
                api_key,
                base_url: var(url_var).unwrap_or_else(|| default_url.to_string()),
            })
        };

        let oauth = |provider: OAuthProvider| {
            let prefix = provider.env_prefix();
            let client_id = var(&format!("{prefix}_CLIENT_ID")).or_else(|| {
                // Twitter developer portals label the OAuth 2.0 client id as the API key.
                (provider == OAuthProvider::Twitter)
                    .then(|| var("TWITTER_API_KEY"))
                    .flatten()
            })?;
            let client_secret = var(&format!("{prefix}_CLIENT_SECRET"))?;
            let redirect_uri = var(&format!("{prefix}_REDIRECT_URI")).unwrap_or_else(|| {
                format!("{base_url}/api/auth/{}/callback", provider.slug())
            });
            Some(OAuthCredentials {
                client_id,
                client_secret,
                redirect_uri,
            })
        };

        let linkedin = oauth(OAuthProvider::LinkedIn);
        let twitter = oauth(OAuthProvider::Twitter);
        let facebook = oauth(OAuthProvider::Facebook);
        let reddit = oauth(OAuthProvider::Reddit);

        Ok(Self {
            bind_addr,
            base_url,
            serper_api_key: var("SERPER_API_KEY"),
            serper_base_url: var("SERPER_BASE_URL")
                .unwrap_or_else(|| SERPER_DEFAULT_BASE_URL.to_string()),
            duckduckgo_base_url: var("DUCKDUCKGO_BASE_URL")
                .unwrap_or_else(|| DUCKDUCKGO_DEFAULT_BASE_URL.to_string()),
            fetch_timeout: Duration::from_secs(parse_or(
                var("SEARCH_FETCH_TIMEOUT_SECS"),
                "SEARCH_FETCH_TIMEOUT_SECS",
                10u64,
            )?),
            max_results: parse_or(var("SEARCH_MAX_RESULTS"), "SEARCH_MAX_RESULTS", 10usize)?,
            together: llm("TOGETHER_API_KEY", "TOGETHER_BASE_URL", TOGETHER_DEFAULT_BASE_URL),
            perplexity: llm(
                "PERPLEXITY_API_KEY",
                "PERPLEXITY_BASE_URL",
                PERPLEXITY_DEFAULT_BASE_URL,
            ),
            llm_timeout: Duration::from_secs(parse_or(
                var("LLM_TIMEOUT_SECS"),
                "LLM_TIMEOUT_SECS",
                60u64,
            )?),
            llm_max_error_body_bytes: parse_or(
                var("LLM_MAX_ERROR_BODY_BYTES"),
                "LLM_MAX_ERROR_BODY_BYTES",
                8 * 1024usize,
            )?,
            linkedin,
            twitter,
            facebook,
            reddit,
            redis_url: var("REDIS_URL"),
            search_cache_ttl_secs: parse_or(
                var("SEARCH_CACHE_TTL_SECS"),
                "SEARCH_CACHE_TTL_SECS",
                600u64,
            )?,
            rate_limit_rps: var("RATE_LIMIT_RPS")
                .map(|raw| {
                    raw.parse::<u32>().map_err(|e| {
                        AppError::Config(format!("RATE_LIMIT_RPS must be an integer: {e}"))
                    })
                })
                .transpose()?
                .filter(|&n| n > 0),
        })
    }

    pub fn oauth_credentials(&self, provider: OAuthProvider) -> Option<&OAuthCredentials> {
        match provider {
            OAuthProvider::LinkedIn => self.linkedin.as_ref(),
            OAuthProvider::Twitter => self.twitter.as_ref(),
            OAuthProvider::Facebook => self.facebook.as_ref(),
            OAuthProvider::Reddit => self.reddit.as_ref(),
        }
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| AppError::Config(format!("{name} is invalid ({raw:?}): {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = config_from(&[]).expect("config");
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.max_results, 10);
        assert_eq!(config.search_cache_ttl_secs, 600);
        assert!(config.serper_api_key.is_none());
        assert!(config.together.is_none());
        assert!(config.perplexity.is_none());
        assert!(config.linkedin.is_none());
        assert!(config.rate_limit_rps.is_none());
    }

    #[test]
    fn oauth_provider_needs_id_and_secret() {
        let config = config_from(&[
            ("NEXT_PUBLIC_BASE_URL", "https://app.example.com/"),
            ("LINKEDIN_CLIENT_ID", "li-id"),
            ("LINKEDIN_CLIENT_SECRET", "li-secret"),
            ("REDDIT_CLIENT_ID", "rd-id"),
        ])
        .expect("config");
        let linkedin = config.linkedin.expect("linkedin enabled");
        assert_eq!(linkedin.client_id, "li-id");
        assert_eq!(
            linkedin.redirect_uri,
            "https://app.example.com/api/auth/linkedin/callback"
        );
        assert!(config.reddit.is_none());
    }

    #[test]
    fn twitter_api_key_is_accepted_as_client_id() {
        let config = config_from(&[
            ("TWITTER_API_KEY", "tw-key"),
            ("TWITTER_CLIENT_SECRET", "tw-secret"),
            ("TWITTER_REDIRECT_URI", "https://relay.example.com/twitter"),
        ])
        .expect("config");
        let twitter = config.twitter.expect("twitter enabled");
        assert_eq!(twitter.client_id, "tw-key");
        assert_eq!(twitter.redirect_uri, "https://relay.example.com/twitter");
    }

    #[test]
    fn llm_keys_enable_providers_with_default_urls() {
        let config = config_from(&[("PERPLEXITY_API_KEY", "pplx")]).expect("config");
        let pplx = config.perplexity.expect("perplexity");
        assert_eq!(pplx.base_url, PERPLEXITY_DEFAULT_BASE_URL);
        assert!(config.together.is_none());
    }

    #[test]
    fn blank_values_count_as_absent() {
        let config = config_from(&[("SERPER_API_KEY", "   ")]).expect("config");
        assert!(config.serper_api_key.is_none());
    }

    #[test]
    fn invalid_number_is_config_error() {
        let err = config_from(&[("SEARCH_FETCH_TIMEOUT_SECS", "soon")]).expect_err("invalid");
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("SEARCH_FETCH_TIMEOUT_SECS"));
    }

    #[test]
    fn zero_rate_limit_disables_limiter() {
        let config = config_from(&[("RATE_LIMIT_RPS", "0")]).expect("config");
        assert!(config.rate_limit_rps.is_none());
    }
}
