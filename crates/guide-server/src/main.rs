mod config;
mod error;
mod rate_limit;
mod server;
mod service;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use guide_core::completion::CompletionClient;
use guide_core::enrich::ItemDataFetcher;

use config::Config;
use rate_limit::RateLimiter;
use service::GuideService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("starting collection-helper");

    // 1. Load config; a missing API key stops the process here
    let config = Config::from_env().inspect_err(|e| {
        error!(error = %e, "invalid configuration, refusing to start");
    })?;
    info!(
        base_url = %config.completion.base_url,
        model = %config.completion.model,
        timeout_ms = config.completion.default_timeout.as_millis(),
        max_retries = config.completion.max_retries,
        language = %config.language,
        "configuration loaded"
    );

    // 2. Build the completion client and enrichment sources
    let completion = Arc::new(CompletionClient::new(config.completion.clone())?);
    let fetcher = ItemDataFetcher::from_env();
    if fetcher.has_secondary() {
        info!("battle.net credentials configured");
    } else {
        info!("battle.net credentials not configured, secondary lookups disabled");
    }

    let limiter = config.rate_limit_rps.map(RateLimiter::new);
    if let Some(limiter) = &limiter {
        info!(rps = limiter.rps(), "guide rate limiting enabled");
    }

    let service = Arc::new(GuideService::new(
        completion,
        fetcher,
        config.language.clone(),
        limiter,
    ));

    // 3. Serve HTTP
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "HTTP server ready");

    axum::serve(listener, server::router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server shutdown")?;
    info!("HTTP server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }
}
