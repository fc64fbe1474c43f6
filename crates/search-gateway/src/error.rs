use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use search_common::error::CommonError;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("config error: {0}")]
    Config(String),

    /// Rejected before any external call.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Common(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Common(e) if e.is_upstream() => "upstream_error",
            Self::Common(_) => "internal_error",
            Self::Config(_) => "config_error",
            Self::Validation(_) => "validation_error",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotConfigured(_) => "not_configured",
            Self::RateLimited(_) => "rate_limited",
            Self::NotFound(_) => "not_found",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });
        if let Self::Common(CommonError::Upstream {
            provider,
            status: upstream_status,
            body: upstream_body,
        }) = &self
        {
            body["details"] = json!({
                "provider": provider,
                "status": upstream_status.as_u16(),
                "body": upstream_body,
            });
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn validation_maps_to_400_with_message() {
        let resp = AppError::Validation("query must not be empty".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["message"], "query must not be empty");
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn upstream_maps_to_500_with_provider_body() {
        let err = AppError::from(CommonError::Upstream {
            provider: "together",
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "model overloaded".into(),
        });
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "upstream_error");
        assert_eq!(body["details"]["provider"], "together");
        assert_eq!(body["details"]["status"], 502);
        assert_eq!(body["details"]["body"], "model overloaded");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::Unauthorized("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::RateLimited("x".into()).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::NotConfigured("perplexity".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
    }
}
