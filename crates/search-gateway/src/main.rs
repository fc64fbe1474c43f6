mod aggregate;
mod cache;
mod categories;
mod classifier;
mod config;
mod error;
mod llm;
mod model;
mod oauth;
mod rate_limit;
mod server;
mod sources;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use oauth::OAuthProvider;
use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting search gateway");

    let config = Config::from_env()?;
    info!(
        bind_addr = %config.bind_addr,
        base_url = %config.base_url,
        web_search = if config.serper_api_key.is_some() { "serper" } else { "duckduckgo" },
        fetch_timeout_ms = config.fetch_timeout.as_millis(),
        max_results = config.max_results,
        together = config.together.is_some(),
        perplexity = config.perplexity.is_some(),
        "configuration loaded"
    );
    for provider in OAuthProvider::ALL {
        if config.oauth_credentials(provider).is_none() {
            info!(provider = provider.slug(), "oauth provider disabled, credentials missing");
        }
    }

    let state = AppState::from_config(&config)?;
    if state.cache.is_enabled() {
        if state.cache.is_available().await {
            info!(ttl_secs = config.search_cache_ttl_secs, "redis connected, search cache enabled");
        } else {
            info!("redis unavailable, searches will not be cached until it recovers");
        }
    } else {
        info!("redis not configured, running without search cache");
    }
    if let Some(rps) = config.rate_limit_rps {
        info!(rps, "rate limiting enabled");
    }

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, server::router(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("search gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
