// SPDX-FileCopyrightText: 2026 Caseline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `caseline serve`, `caseline worker`, and `caseline purge` command
//! implementations.
//!
//! Wires the pipeline from configuration: SQLite store, practice-area
//! schema, extraction stack, conversation engine, delivery worker, and the
//! HTTP gateway, with one cancellation token coordinating shutdown across
//! all of it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use caseline_anthropic::AnthropicClient;
use caseline_config::CaselineConfig;
use caseline_core::{CaselineError, GeoLookup, LeadStore, ModelProvider};
use caseline_engine::IntakeEngine;
use caseline_extract::Extractor;
use caseline_gateway::{start_server, AuthConfig, GatewayState, RateLimit, ServerConfig};
use caseline_geo::GeoClient;
use caseline_leadprosper::LeadProsperClient;
use caseline_schema::SchemaRegistry;
use caseline_storage::SqliteStore;
use caseline_worker::{install_signal_handler, QueueWorker, WorkerSettings};
use tracing::{info, warn};

/// Run the full pipeline: gateway plus the delivery worker.
pub async fn run_serve(config: CaselineConfig) -> Result<(), CaselineError> {
    init_tracing(&config.agent.log_level);
    info!("starting caseline serve");

    let store = open_store(&config).await?;
    let engine = build_engine(&config, store.clone())?;
    let worker = Arc::new(build_worker(&config, store.clone())?);

    let cancel = install_signal_handler();

    let worker_handle = tokio::spawn({
        let worker = worker.clone();
        let cancel = cancel.clone();
        async move { worker.run(cancel).await }
    });

    let state = GatewayState {
        engine,
        store: store.clone(),
        limiter: Arc::new(StoreRateLimiter {
            store: store.clone(),
            limit: config.gateway.rate_limit_requests,
            window: Duration::from_secs(config.gateway.rate_limit_window_secs),
        }),
        auth: AuthConfig {
            bearer_token: config.gateway.bearer_token.clone(),
        },
        start_time: Instant::now(),
    };
    let server_config = ServerConfig {
        host: config.gateway.host.clone(),
        port: config.gateway.port,
    };
    let serve_result = start_server(&server_config, state, cancel.clone()).await;

    // Gateway exit (shutdown or bind error) stops the worker too; let it
    // drain before closing the database.
    cancel.cancel();
    if let Err(e) = worker_handle.await {
        warn!(error = %e, "worker task join failed");
    }
    store.close().await?;
    serve_result?;

    info!("caseline serve shutdown complete");
    Ok(())
}

/// Run only the delivery worker, for deployments that split the roles.
pub async fn run_worker(config: CaselineConfig) -> Result<(), CaselineError> {
    init_tracing(&config.agent.log_level);
    info!("starting caseline worker");

    let store = open_store(&config).await?;
    let worker = build_worker(&config, store.clone())?;

    let cancel = install_signal_handler();
    worker.run(cancel).await;

    store.close().await?;
    info!("caseline worker shutdown complete");
    Ok(())
}

/// Ops command: delete sessions past their TTL and closed rate windows.
pub async fn run_purge(config: CaselineConfig) -> Result<(), CaselineError> {
    init_tracing(&config.agent.log_level);
    let store = open_store(&config).await?;
    let removed = store.purge_expired_sessions().await?;
    let windows = store
        .purge_stale_rate_windows(Duration::from_secs(config.gateway.rate_limit_window_secs))
        .await?;
    store.close().await?;
    println!("purged {removed} expired session(s) and {windows} stale rate window(s)");
    Ok(())
}

/// Rate limiter over the shared store, so the fixed window holds across
/// gateway instances. Store trouble fails open: losing the limiter must
/// not take intake down with it.
struct StoreRateLimiter {
    store: Arc<SqliteStore>,
    limit: u32,
    window: Duration,
}

#[async_trait]
impl RateLimit for StoreRateLimiter {
    async fn allow(&self, key: &str) -> bool {
        match self
            .store
            .rate_limit_hit(key, self.limit, self.window)
            .await
        {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(error = %e, "rate-limit store unavailable, allowing request");
                true
            }
        }
    }
}

async fn open_store(config: &CaselineConfig) -> Result<Arc<SqliteStore>, CaselineError> {
    Ok(Arc::new(
        SqliteStore::open(&config.storage, &config.session).await?,
    ))
}

fn build_schema(config: &CaselineConfig) -> Result<Arc<SchemaRegistry>, CaselineError> {
    let registry = match &config.schema.path {
        Some(path) => {
            info!(path = %path, "loading practice-area schema override");
            SchemaRegistry::from_path(path)?
        }
        None => SchemaRegistry::embedded()?,
    };
    Ok(Arc::new(registry))
}

/// The extraction fallback is optional: with no API key the pipeline runs
/// on deterministic patterns alone.
fn build_provider(config: &CaselineConfig) -> Result<Option<Arc<dyn ModelProvider>>, CaselineError> {
    let api_key = config
        .anthropic
        .api_key
        .clone()
        .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok());
    let Some(api_key) = api_key else {
        warn!("no Anthropic API key configured; extraction runs on patterns only");
        return Ok(None);
    };
    let client = AnthropicClient::new(
        api_key,
        config.anthropic.api_version.clone(),
        config.anthropic.extraction_model.clone(),
    )?;
    Ok(Some(Arc::new(client)))
}

fn build_engine(
    config: &CaselineConfig,
    store: Arc<SqliteStore>,
) -> Result<Arc<IntakeEngine>, CaselineError> {
    let schema = build_schema(config)?;
    let provider = build_provider(config)?;
    let geo: Arc<dyn GeoLookup> = Arc::new(GeoClient::new(
        config.geo.api_url.clone(),
        Duration::from_secs(config.geo.timeout_secs),
    )?);
    let extractor = Extractor::new(provider.clone(), geo, config.anthropic.max_tokens);
    Ok(Arc::new(IntakeEngine::new(
        store,
        schema,
        extractor,
        provider,
        config.worker.queue_name.clone(),
        config.worker.max_attempts,
        config.anthropic.max_tokens,
    )))
}

fn build_worker(
    config: &CaselineConfig,
    store: Arc<SqliteStore>,
) -> Result<QueueWorker, CaselineError> {
    let api_key = config
        .leadprosper
        .api_key
        .clone()
        .or_else(|| std::env::var("LEADPROSPER_API_KEY").ok())
        .ok_or_else(|| {
            CaselineError::Config(
                "LeadProsper API key required. Set leadprosper.api_key in caseline.toml \
                 or the LEADPROSPER_API_KEY environment variable."
                    .to_string(),
            )
        })?;
    let client = LeadProsperClient::new(
        config.leadprosper.api_url.clone(),
        api_key,
        config.leadprosper.campaign_id.clone(),
        Duration::from_secs(config.leadprosper.timeout_secs),
        config.leadprosper.max_retries,
    )?;
    let settings = WorkerSettings {
        queue_name: config.worker.queue_name.clone(),
        batch_size: config.worker.batch_size,
        poll_interval: Duration::from_secs(config.worker.poll_interval_secs),
        visibility_timeout: Duration::from_secs(config.worker.visibility_timeout_secs),
        drain_timeout: Duration::from_secs(config.worker.drain_timeout_secs),
    };
    Ok(QueueWorker::new(store, client, settings))
}

/// Initializes the tracing subscriber with the configured log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{log_level},hyper=warn,reqwest=warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
