//! Access enforcement middleware.
//!
//! # Purpose
//! Guards routes with an identity check and a policy decision. Each request
//! ends in exactly one outcome:
//! - `allowed`: forwarded with an [`AuthorizedRequest`] extension
//! - `unauthorized` (401): missing or malformed credentials, or a rejected secret
//! - `forbidden` (403): the decision engine denied the request
//! - `error` (500): the engine or the verifier failed
//!
//! # Security considerations
//! - Fails closed: no request passes when a decision could not be computed.
//! - The decision reads one snapshot for the whole request, so a concurrent
//!   reload cannot mix rules from two generations.
pub mod credentials;
pub mod extract;

pub use credentials::{
    BasicCredentials, CredentialError, CredentialVerifier, UnverifiedSecret, VerifierError,
    extract_basic_credentials,
};
pub use extract::{AuthorizedRequest, Decision, DecisionInput, ExtractionStrategy};

use crate::api::error::{api_forbidden, api_internal_message, api_unauthorized};
use crate::app::AppState;
use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::http::header::WWW_AUTHENTICATE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

fn record(outcome: &'static str) {
    metrics::counter!("gatekeeper_decisions_total", "outcome" => outcome).increment(1);
}

fn unauthorized() -> Response {
    record("unauthorized");
    let mut response = api_unauthorized("Unauthorized").into_response();
    response.headers_mut().insert(
        WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"gatekeeper\""),
    );
    response
}

fn internal_error() -> Response {
    record("error");
    api_internal_message("Error enforcing policy").into_response()
}

pub async fn enforce_access(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let credentials = match extract_basic_credentials(request.headers()) {
        Ok(credentials) => credentials,
        Err(err) => {
            tracing::info!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = %err,
                "access denied: unauthorized"
            );
            return unauthorized();
        }
    };

    match state.verifier.verify(&credentials).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(identity = %credentials.identity, "access denied: secret rejected");
            return unauthorized();
        }
        Err(err) => {
            tracing::error!(identity = %credentials.identity, error = %err, "credential verifier failed");
            return internal_error();
        }
    }

    let snapshot = state.authority.snapshot();
    let decision = state.strategy.decide(
        snapshot.engine.as_ref(),
        &DecisionInput {
            identity: &credentials.identity,
            method: request.method(),
            uri: request.uri(),
            headers: request.headers(),
            policy_generation: snapshot.generation,
        },
    );

    match decision {
        Decision::Allowed(authorized) => {
            record("allowed");
            tracing::info!(
                identity = %authorized.identity,
                resource = %authorized.resource,
                action = %authorized.action,
                admin_override = authorized.admin_override,
                generation = authorized.policy_generation,
                "access allowed"
            );
            request.extensions_mut().insert(authorized);
            next.run(request).await
        }
        Decision::Forbidden { resource, action } => {
            record("forbidden");
            tracing::info!(
                identity = %credentials.identity,
                resource = resource.as_deref().unwrap_or(""),
                action = %action,
                generation = snapshot.generation,
                "access denied: forbidden"
            );
            api_forbidden("Forbidden").into_response()
        }
        Decision::Failed(err) => {
            tracing::error!(
                identity = %credentials.identity,
                error = %err,
                generation = snapshot.generation,
                "policy decision failed"
            );
            internal_error()
        }
    }
}
