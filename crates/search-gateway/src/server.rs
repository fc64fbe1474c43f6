//! HTTP surface: router, shared state and handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use search_common::error::CommonError;
use search_common::provider::WebSearch;
use search_common::redis::RedisCache;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::aggregate::Aggregator;
use crate::cache::SearchCache;
use crate::classifier::{CategorizedResult, Classifier};
use crate::config::Config;
use crate::error::AppError;
use crate::llm::LlmService;
use crate::model::{HealthResponse, SearchRequest, SearchResponse};
use crate::oauth::{cookie, CallbackParams, OAuthProvider, OAuthRedirect, OAuthService};
use crate::rate_limit::RateLimiter;
use crate::sources::{plan_sources, SearchMode};

/// Everything a request needs. Built once at startup; nothing in it is mutated per request
/// apart from the rate limiter's bucket.
pub struct AppState {
    pub base_url: String,
    pub search: Aggregator<WebSearch>,
    pub llm: LlmService,
    pub classifier: Classifier,
    pub oauth: OAuthService,
    pub cache: SearchCache,
    pub limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let web = WebSearch::select(
            config.serper_api_key.as_deref(),
            &config.serper_base_url,
            &config.duckduckgo_base_url,
        )?;
        Ok(Self {
            base_url: config.base_url.clone(),
            search: Aggregator::new(web, config.fetch_timeout, config.max_results),
            llm: LlmService::from_config(config)?,
            classifier: Classifier::new(),
            oauth: OAuthService::new(config)?,
            cache: SearchCache::new(
                RedisCache::new(config.redis_url.as_deref()),
                config.search_cache_ttl_secs,
            ),
            limiter: RateLimiter::new(config.rate_limit_rps),
        })
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/search", post(search))
        .route("/api/search/{mode}", post(search_with_mode))
        .route("/api/auth/{provider}", get(authorize))
        .route(
            "/api/auth/{provider}/callback",
            get(callback_query).post(callback_form),
        )
        .route("/api/auth/{provider}/logout", get(logout))
        .route("/api/network/{provider}/profile", get(profile))
        .layer(TraceLayer::new_for_http())
        .layer(cors(&state.base_url))
        .with_state(state)
}

/// Only the configured front-end origin may call the API, with cookies.
fn cors(base_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true);

    let origin = url::Url::parse(base_url)
        .map(|u| u.origin().ascii_serialization())
        .ok()
        .and_then(|o| HeaderValue::from_str(&o).ok());
    match origin {
        Some(origin) => layer.allow_origin(origin),
        None => {
            warn!(base_url, "base url has no usable origin, cross-origin requests disabled");
            layer
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn search(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let Json(request) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    run_search(&state, request, None).await.map(Json)
}

async fn search_with_mode(
    State(state): State<Arc<AppState>>,
    Path(mode): Path<String>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let mode = SearchMode::parse(&mode)
        .ok_or_else(|| AppError::NotFound(format!("search mode {mode}")))?;
    let Json(request) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    run_search(&state, request, Some(mode)).await.map(Json)
}

/// Validate, fan out, optionally answer, classify.
async fn run_search(
    state: &AppState,
    request: SearchRequest,
    path_mode: Option<SearchMode>,
) -> Result<SearchResponse, AppError> {
    // Malformed requests are rejected before they spend a token.
    let search = request.validate(path_mode)?;

    if let Some(limiter) = &state.limiter {
        limiter.check().await?;
    }

    // A named model is checked even when no answer is requested.
    let resolved = match search.model.as_deref() {
        Some(name) => state.llm.resolve_model(Some(name))?,
        None if search.use_llm => state.llm.resolve_model(None)?,
        None => None,
    };
    let model = if search.use_llm {
        let model = resolved.ok_or_else(|| AppError::NotConfigured("LLM provider".to_string()))?;
        if !state.llm.is_configured(model.provider) {
            return Err(AppError::NotConfigured(model.provider.label().to_string()));
        }
        Some(model)
    } else {
        None
    };
    let model_id = model.map(|m| m.id);

    if let Some(cached) = state.cache.get(&search, model_id).await {
        info!(mode = search.mode.as_str(), "search served from cache");
        return Ok(cached);
    }

    let plan = plan_sources(search.mode, &search.sources, &search.custom_hosts);
    info!(
        mode = search.mode.as_str(),
        sources = plan.len(),
        model = model_id.unwrap_or("-"),
        "running search"
    );
    let results = state.search.gather(&search.query, &plan).await?;

    let llm_response = match model {
        Some(model) => Some(state.llm.answer(model, &search.query, &results).await?),
        None => None,
    };
    let answer = llm_response.as_ref().map_or("", |r| r.answer.as_str());

    let classification = state.classifier.classify(&search.query, answer, &results);
    info!(
        results = results.len(),
        categories = classification.categories.len(),
        threshold = classification.threshold,
        "search classified"
    );
    let (categories, metrics) = if classification.categories.is_empty() {
        let fallback = CategorizedResult::all_results(results.clone());
        let metrics = fallback.metrics;
        (vec![fallback], metrics)
    } else {
        (classification.categories, classification.metrics)
    };

    let response = SearchResponse {
        results,
        categories,
        llm_response,
        metrics,
    };
    state.cache.set(&search, model_id, &response).await;
    Ok(response)
}

fn provider_from_path(slug: &str) -> Result<OAuthProvider, AppError> {
    OAuthProvider::parse(slug).ok_or_else(|| AppError::NotFound(format!("oauth provider {slug}")))
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<OAuthRedirect, AppError> {
    let provider = provider_from_path(&provider)?;
    Ok(state.oauth.authorize(provider))
}

async fn callback_query(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<OAuthRedirect, AppError> {
    let provider = provider_from_path(&provider)?;
    Ok(state.oauth.callback(provider, params, &headers).await)
}

/// The relay page forwards the provider's parameters as a form post.
async fn callback_form(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    Form(params): Form<CallbackParams>,
) -> Result<OAuthRedirect, AppError> {
    let provider = provider_from_path(&provider)?;
    Ok(state.oauth.callback(provider, params, &headers).await)
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Result<Response, AppError> {
    let provider = provider_from_path(&provider)?;
    let mut response = Json(json!({ "success": true })).into_response();
    for value in state.oauth.logout_cookies(provider) {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    info!(provider = provider.slug(), "oauth session cleared");
    Ok(response)
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let provider = provider_from_path(&provider)?;
    let token = cookie::read(&headers, &provider.token_cookie()).ok_or_else(|| {
        AppError::Unauthorized(format!("not connected to {}", provider.display_name()))
    })?;

    let profile = state
        .oauth
        .fetch_profile(provider, &token)
        .await
        .map_err(|e| match e {
            CommonError::Upstream { status, .. } if status == reqwest::StatusCode::UNAUTHORIZED => {
                AppError::Unauthorized(format!("{} session expired", provider.display_name()))
            }
            other => AppError::from(other),
        })?;

    Ok(Json(json!({
        "provider": provider.slug(),
        "userId": crate::oauth::user_id(provider, &profile),
        "profile": profile,
    })))
}
