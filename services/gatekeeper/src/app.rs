//! Gatekeeper HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! Administrative and system routes are mounted without the enforcement layer;
//! only the resource routes pass through [`enforce_access`].
use crate::api;
use crate::authority::PolicyAuthority;
use crate::middleware::{CredentialVerifier, ExtractionStrategy, enforce_access};
use crate::observability;
use axum::Router;
use axum::routing::{delete, get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Clone)]
pub struct AppState {
    pub authority: Arc<PolicyAuthority>,
    pub strategy: ExtractionStrategy,
    pub verifier: Arc<dyn CredentialVerifier>,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        })
        .on_request(
            |request: &axum::http::Request<axum::body::Body>, _span: &tracing::Span| {
                tracing::info!(method = %request.method(), path = %request.uri().path(), "request");
            },
        );

    let guarded = Router::new()
        .route("/resource/view", get(api::resources::view_resource))
        .route("/resource/edit", post(api::resources::edit_resource))
        .route("/resource/delete", delete(api::resources::delete_resource))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            enforce_access,
        ));

    Router::new()
        .route("/v1/system/health", get(api::system::system_health))
        .route("/v1/system/policy", get(api::system::policy_status))
        .route("/v1/openapi.json", get(api::system::openapi_document))
        .route("/resource", post(api::admin::create_resource))
        .route(
            "/resource/:resource/assign",
            post(api::admin::assign_role).delete(api::admin::revoke_role),
        )
        .route(
            "/v1/policies",
            post(api::admin::add_policy).delete(api::admin::remove_policy),
        )
        .route(
            "/v1/policies/filter/delete",
            post(api::admin::remove_filtered_policy),
        )
        .route("/v1/policies/reload", post(api::admin::reload_policies))
        .merge(guarded)
        .layer(trace_layer)
        .with_state(state)
}
