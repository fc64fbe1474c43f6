/// Error types shared by the upstream HTTP adapters.
///
/// These errors describe failures talking to third-party APIs (search providers, completion
/// hosts, OAuth endpoints). Redis failures never surface here; `RedisCache` logs and swallows
/// them. The gateway wraps `CommonError` via `#[from]` and decides which HTTP status each
/// one maps to.
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("{provider} returned error: status={status} body={body}")]
    Upstream {
        provider: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{provider} response missing {field}")]
    MissingField {
        provider: &'static str,
        field: &'static str,
    },
}

impl CommonError {
    /// Raw upstream body, when the provider answered with a non-2xx status.
    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            Self::Upstream { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}

/// Read at most `max_bytes` of an error body. Never fails; a body that cannot be read is
/// replaced by a placeholder.
pub async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to read upstream error body");
            "<failed to read error body>".to_string()
        }
    }
}

/// Turn a non-2xx response into `CommonError::Upstream`, keeping a bounded copy of the body.
pub async fn upstream_error(
    provider: &'static str,
    resp: reqwest::Response,
    max_bytes: usize,
) -> CommonError {
    let status = resp.status();
    let body = read_limited_text(resp, max_bytes).await;
    CommonError::Upstream {
        provider,
        status,
        body,
    }
}
