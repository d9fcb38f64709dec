//! System/health API handlers.
//!
//! # Purpose and responsibility
//! Lightweight endpoints for probes and operators: store reachability and the
//! state of the live policy snapshot.
//!
//! # Key invariants and assumptions
//! - Handlers are side-effect free.
//! - Policy status reads the snapshot without touching the store.
use crate::api::error::{ApiError, api_adapter_error};
use crate::api::openapi::ApiDoc;
use crate::api::types::{HealthStatus, PolicyStatus};
use crate::app::AppState;
use crate::middleware::ExtractionStrategy;
use axum::Json;
use axum::extract::State;
use utoipa::OpenApi;

#[utoipa::path(
    get,
    path = "/v1/system/health",
    tag = "system",
    responses(
        (status = 200, description = "Policy store reachable", body = HealthStatus),
        (status = 500, description = "Policy store unavailable", body = crate::api::types::ErrorResponse)
    )
)]
/// Probe the policy store.
///
/// # Errors
/// - Returns 500 if the store health check fails.
pub(crate) async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, ApiError> {
    let adapter = state.authority.adapter();
    adapter
        .health_check()
        .await
        .map_err(|err| api_adapter_error("policy store unavailable", &err))?;
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
        backend: adapter.backend_name().to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/system/policy",
    tag = "system",
    responses(
        (status = 200, description = "Live policy snapshot", body = PolicyStatus)
    )
)]
pub(crate) async fn policy_status(State(state): State<AppState>) -> Json<PolicyStatus> {
    let snapshot = state.authority.snapshot();
    let adapter = state.authority.adapter();
    let strategy = match &state.strategy {
        ExtractionStrategy::PathRole => "path_role".to_string(),
        ExtractionStrategy::QueryResource { param } => format!("query_resource({param})"),
    };
    Json(PolicyStatus {
        generation: snapshot.generation,
        rule_count: snapshot.rule_count,
        skipped_documents: snapshot.skipped_documents,
        loaded_at: snapshot.loaded_at,
        strategy,
        index: adapter.index().to_string(),
        backend: adapter.backend_name().to_string(),
    })
}

pub(crate) async fn openapi_document() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
