//! Gatekeeper HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, the policy store, the decision engine, and the HTTP
//! router, performs the initial policy load, then serves requests while the
//! refresher keeps the policy current.
//!
//! # Notes
//! Startup fails if the initial load fails; the service never serves with an
//! empty policy it did not actually read.
use anyhow::Context;
use gatekeeper::app::{AppState, build_router};
use gatekeeper::authority::PolicyAuthority;
use gatekeeper::config::{GatekeeperConfig, StoreBackend};
use gatekeeper::engine::rbac::{CasbinEngineBuilder, PATH_ROLE_MODEL, QUERY_RESOURCE_MODEL};
use gatekeeper::middleware::{ExtractionStrategy, UnverifiedSecret};
use gatekeeper::{observability, refresher};
use policy_opensearch::PolicyAdapter;
use policy_opensearch::store::DocumentStore;
use policy_opensearch::store::memory::MemoryStore;
use policy_opensearch::store::opensearch::OpenSearchStore;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatekeeperConfig::from_env_or_yaml().context("gatekeeper config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: GatekeeperConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("gatekeeper");
    let state = build_state(&config).await?;

    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    let metrics_addr = config.metrics_bind;
    let metrics_listener = tokio::net::TcpListener::bind(metrics_addr)
        .await
        .with_context(|| format!("bind metrics {metrics_addr}"))?;
    tracing::info!(addr = %metrics_listener.local_addr()?, "metrics listening");

    let refresher = refresher::spawn_refresher(state.authority.clone(), config.refresh_interval());
    let (metrics_stop, metrics_stopped) = tokio::sync::oneshot::channel::<()>();
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        metrics_listener,
        async move {
            let _ = metrics_stopped.await;
        },
    ));

    let app = build_router(state);
    tracing::info!(addr = %listener.local_addr()?, "gatekeeper listening");
    tokio::pin!(shutdown);
    let served = tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result.context("http server")
        }
        _ = &mut shutdown => {
            tracing::info!("shutdown requested");
            Ok(())
        }
    };

    refresher.shutdown().await;
    let _ = metrics_stop.send(());
    match metrics_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "metrics server failed"),
        Err(err) => tracing::warn!(error = %err, "metrics server task failed"),
    }
    served
}

fn build_store(config: &GatekeeperConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("using in-memory policy store; policies are not shared or durable");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::OpenSearch => Arc::new(
            OpenSearchStore::new(config.opensearch_config()).context("opensearch client")?,
        ),
    };
    Ok(store)
}

fn model_text(config: &GatekeeperConfig) -> anyhow::Result<String> {
    match &config.model_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("read MODEL_PATH: {}", path.display())),
        None => Ok(match config.strategy {
            ExtractionStrategy::PathRole => PATH_ROLE_MODEL,
            ExtractionStrategy::QueryResource { .. } => QUERY_RESOURCE_MODEL,
        }
        .to_string()),
    }
}

async fn build_state(config: &GatekeeperConfig) -> anyhow::Result<AppState> {
    let store = build_store(config)?;
    let adapter = PolicyAdapter::connect(store, config.index.clone(), config.load_options())
        .await
        .with_context(|| format!("prepare policy index {}", config.index))?;
    let builder = CasbinEngineBuilder::new(model_text(config)?);
    builder.validate().await.context("parse access model")?;
    let authority = PolicyAuthority::initialize(adapter, Arc::new(builder), config.load_timeout())
        .await
        .context("initial policy load")?;

    Ok(AppState {
        authority: Arc::new(authority),
        strategy: config.strategy.clone(),
        verifier: Arc::new(UnverifiedSecret),
    })
}
