//! Background policy refresher.
//!
//! Reloads the policy on a fixed interval so writes made through any instance
//! reach every instance's decision engine. A failed tick is logged and the next
//! tick tries again; ticks missed while a reload runs are dropped rather than
//! replayed back to back.
use crate::authority::{PolicyAuthority, ReloadOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

pub struct RefresherHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signal the task to stop and wait for it. An in-flight reload finishes
    /// first.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "policy refresher task ended abnormally");
        }
    }
}

pub fn spawn_refresher(authority: Arc<PolicyAuthority>, interval: Duration) -> RefresherHandle {
    let (stop, mut stop_rx) = watch::channel(false);
    let task = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => refresh_once(&authority).await,
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("policy refresher stopped");
    });
    RefresherHandle { stop, task }
}

async fn refresh_once(authority: &PolicyAuthority) {
    tracing::info!("reloading policies from store");
    match authority.reload().await {
        Ok(ReloadOutcome::Reloaded {
            generation,
            rule_count,
        }) => {
            tracing::info!(generation, rules = rule_count, "policies reloaded");
        }
        Ok(ReloadOutcome::Skipped) => {
            tracing::info!("previous policy reload still running, tick skipped");
        }
        Err(err) => {
            tracing::error!(error = %err, kind = err.kind(), "policy reload failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rbac::{CasbinEngineBuilder, QUERY_RESOURCE_MODEL};
    use policy_opensearch::store::memory::MemoryStore;
    use policy_opensearch::{LoadOptions, PolicyAdapter};

    async fn authority() -> (Arc<PolicyAuthority>, PolicyAdapter) {
        let adapter = PolicyAdapter::connect(
            Arc::new(MemoryStore::new()),
            "casbin_policies",
            LoadOptions::default(),
        )
        .await
        .expect("adapter");
        let authority = PolicyAuthority::initialize(
            adapter.clone(),
            Arc::new(CasbinEngineBuilder::new(QUERY_RESOURCE_MODEL)),
            Duration::from_secs(5),
        )
        .await
        .expect("authority");
        (Arc::new(authority), adapter)
    }

    #[tokio::test]
    async fn ticks_pick_up_store_changes() {
        let (authority, adapter) = authority().await;
        let handle = spawn_refresher(authority.clone(), Duration::from_millis(20));
        adapter
            .add_policy(
                "p",
                "p",
                &["alice".to_string(), "reports".to_string(), "viewer".to_string()],
            )
            .await
            .expect("add");

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let snapshot = authority.snapshot();
            if snapshot
                .engine
                .enforce(&["alice", "reports", "viewer"])
                .expect("enforce")
            {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "refresh never applied");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_before_first_tick() {
        let (authority, _) = authority().await;
        let handle = spawn_refresher(authority.clone(), Duration::from_secs(3600));
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("shutdown promptly");
        assert_eq!(authority.snapshot().generation, 1);
    }
}
