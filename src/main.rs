mod cache;
mod collab;
mod error;
mod executor;
mod languages;
mod model;
mod registry;
mod runner;
mod sandbox;
mod server;
mod settings;
mod verifier;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::cache::{RedisResultStore, ResultStore};
use crate::collab::{HttpRegenerator, HttpTestGenerator, Notifier, Regenerator, TestGenerator};
use crate::executor::SandboxExecutor;
use crate::registry::ResultRegistry;
use crate::runner::TestRunner;
use crate::sandbox::{Limits, SandboxConfig};
use crate::server::AppState;
use crate::settings::Settings;
use crate::verifier::{LoopDefaults, VerificationLoop};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("verifier=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    languages::init_languages()?;
    info!("Loaded language configurations");

    let settings = Settings::from_env();
    info!(
        "Starting verification worker: max_concurrent={}, max_retries={}",
        settings.max_concurrent, settings.max_retries
    );

    if settings.regeneration_url.is_none() {
        warn!("No regeneration collaborator configured; failed attempts will not be repaired");
    }
    if settings.test_generation_url.is_none() {
        warn!("No test-generation collaborator configured; /generate-tests will return no cases");
    }

    let collaborator_timeout = Duration::from_secs(settings.collaborator_timeout_secs);

    let executor = Arc::new(SandboxExecutor::new(SandboxConfig::default()));
    let regenerator: Arc<dyn Regenerator> = Arc::new(HttpRegenerator::new(
        settings.regeneration_url.clone(),
        collaborator_timeout,
    ));
    let generator: Arc<dyn TestGenerator> = Arc::new(HttpTestGenerator::new(
        settings.test_generation_url.clone(),
        collaborator_timeout,
    ));

    let cache: Option<Arc<dyn ResultStore>> = match &settings.redis_url {
        Some(url) => match RedisResultStore::connect(url, settings.cache_ttl_secs).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                // The cache is a latency optimization; run without it.
                warn!("Result cache unavailable ({:#}); continuing without it", e);
                None
            }
        },
        None => None,
    };

    let defaults = LoopDefaults {
        timeout_secs: settings.default_timeout_secs,
        memory_limit_mb: settings.default_memory_limit_mb,
        max_retries: settings.max_retries,
    };

    let state = AppState {
        verifier: Arc::new(VerificationLoop::new(
            executor.clone(),
            regenerator,
            cache,
            defaults,
        )),
        generator,
        runner: Arc::new(TestRunner::new(executor)),
        registry: Arc::new(ResultRegistry::new()),
        notifier: Arc::new(Notifier::new(
            settings.webhook_url.clone(),
            collaborator_timeout,
        )),
        permits: Arc::new(Semaphore::new(settings.max_concurrent)),
        default_limits: Limits {
            timeout_secs: settings.default_timeout_secs,
            memory_mb: settings.default_memory_limit_mb,
        },
    };

    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr))?;
    info!("Listening on {}", settings.bind_addr);

    axum::serve(listener, app)
        .await
        .context("HTTP server terminated")?;

    Ok(())
}
