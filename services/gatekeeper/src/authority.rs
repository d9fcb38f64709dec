//! Owner of the live policy snapshot.
//!
//! # Purpose
//! Holds the decision engine that request handlers consult and replaces it on
//! reload. Readers take an `Arc` to the current snapshot and keep using it for
//! the whole request even if a reload swaps in a newer one meanwhile.
//!
//! # Key invariants
//! - All store round trips and the engine build happen before the swap and
//!   outside any lock readers contend on.
//! - A failed, partial, or timed-out load never replaces the live snapshot.
//! - At most one reload runs at a time; a concurrent call reports `Skipped`.
use crate::engine::{DecisionEngine, EngineBuilder, EngineError};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use policy_opensearch::{AdapterError, LoadReport, PolicyAdapter, PolicyModel};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("policy load timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Load(#[from] AdapterError),
    #[error("failed to build decision engine: {0}")]
    Engine(#[from] EngineError),
}

impl ReloadError {
    /// Stable label for metrics and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ReloadError::Timeout(_) => "timeout",
            ReloadError::Load(AdapterError::PartialLoad { .. }) => "partial_load",
            ReloadError::Load(_) => "store_unavailable",
            ReloadError::Engine(_) => "engine",
        }
    }
}

pub struct PolicySnapshot {
    pub engine: Arc<dyn DecisionEngine>,
    pub generation: u64,
    pub rule_count: usize,
    pub skipped_documents: usize,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Reloaded { generation: u64, rule_count: usize },
    /// Another reload was already in flight.
    Skipped,
}

pub struct PolicyAuthority {
    adapter: PolicyAdapter,
    builder: Arc<dyn EngineBuilder>,
    load_timeout: Duration,
    current: ArcSwap<PolicySnapshot>,
    reload_lock: Mutex<()>,
}

impl PolicyAuthority {
    /// Perform the first load; fails if the policy cannot be loaded.
    pub async fn initialize(
        adapter: PolicyAdapter,
        builder: Arc<dyn EngineBuilder>,
        load_timeout: Duration,
    ) -> Result<Self, ReloadError> {
        let snapshot = build_snapshot(&adapter, builder.as_ref(), load_timeout, 1).await?;
        tracing::info!(
            rules = snapshot.rule_count,
            skipped = snapshot.skipped_documents,
            "initial policy loaded"
        );
        record_snapshot_metrics(&snapshot);
        Ok(Self {
            adapter,
            builder,
            load_timeout,
            current: ArcSwap::from_pointee(snapshot),
            reload_lock: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        self.current.load_full()
    }

    pub fn adapter(&self) -> &PolicyAdapter {
        &self.adapter
    }

    pub async fn reload(&self) -> Result<ReloadOutcome, ReloadError> {
        let Ok(_guard) = self.reload_lock.try_lock() else {
            metrics::counter!("gatekeeper_policy_reloads_total", "outcome" => "skipped")
                .increment(1);
            tracing::debug!("policy reload already running, skipping");
            return Ok(ReloadOutcome::Skipped);
        };

        let generation = self.current.load().generation + 1;
        let started = Instant::now();
        let result =
            build_snapshot(&self.adapter, self.builder.as_ref(), self.load_timeout, generation)
                .await;
        metrics::histogram!("gatekeeper_policy_reload_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(snapshot) => {
                let rule_count = snapshot.rule_count;
                record_snapshot_metrics(&snapshot);
                self.current.store(Arc::new(snapshot));
                metrics::counter!("gatekeeper_policy_reloads_total", "outcome" => "ok")
                    .increment(1);
                Ok(ReloadOutcome::Reloaded {
                    generation,
                    rule_count,
                })
            }
            Err(err) => {
                metrics::counter!("gatekeeper_policy_reloads_total", "outcome" => err.kind())
                    .increment(1);
                Err(err)
            }
        }
    }
}

async fn build_snapshot(
    adapter: &PolicyAdapter,
    builder: &dyn EngineBuilder,
    load_timeout: Duration,
    generation: u64,
) -> Result<PolicySnapshot, ReloadError> {
    let mut model = PolicyModel::new();
    // On timeout the load future is dropped mid-scroll, so the loader never
    // clears its scroll context; the store releases it once the keep-alive
    // lapses.
    let report: LoadReport = tokio::time::timeout(load_timeout, adapter.load_policy(&mut model))
        .await
        .map_err(|_| ReloadError::Timeout(load_timeout))??;
    let engine = builder.build(&model).await?;
    Ok(PolicySnapshot {
        engine,
        generation,
        rule_count: model.len(),
        skipped_documents: report.skipped,
        loaded_at: Utc::now(),
    })
}

fn record_snapshot_metrics(snapshot: &PolicySnapshot) {
    metrics::gauge!("gatekeeper_policy_rules").set(snapshot.rule_count as f64);
    metrics::gauge!("gatekeeper_policy_generation").set(snapshot.generation as f64);
}
