//! Administrative policy endpoints.
//!
//! # Purpose
//! Writes policy rules straight to the store. Nothing here touches the live
//! decision engine: writes become visible to enforcement after the next
//! refresh or an explicit `POST /v1/policies/reload`.
//!
//! # Security considerations
//! These routes are mounted without the enforcement layer and must only be
//! reachable from trusted networks.
use crate::api::error::{ApiError, api_adapter_error, api_internal_message, api_validation_error};
use crate::api::types::{
    AssignForm, FilteredDeleteResponse, FilteredPolicyRequest, MessageResponse, PolicyRequest,
    ReloadResponse, ReloadStatus, ResourceForm,
};
use crate::app::AppState;
use crate::authority::ReloadOutcome;
use crate::middleware::extract::ADMIN_ROLE;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Form, Json};
use policy_opensearch::GRANT_SECTION;
use policy_opensearch::model::section_for_ptype;

const GRANT_PTYPE: &str = "p";

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(api_validation_error(&format!("{field} is required")));
    }
    Ok(())
}

fn section_of(ptype: &str) -> Result<&'static str, ApiError> {
    section_for_ptype(ptype)
        .ok_or_else(|| api_validation_error(&format!("unknown ptype {ptype:?}")))
}

#[utoipa::path(
    post,
    path = "/resource",
    tag = "admin",
    request_body(content = ResourceForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Resource created, creator granted admin", body = MessageResponse),
        (status = 400, description = "Missing form field", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Store unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_resource(
    State(state): State<AppState>,
    Form(form): Form<ResourceForm>,
) -> Result<Json<MessageResponse>, ApiError> {
    require("resource", &form.resource)?;
    require("user", &form.user)?;
    state
        .authority
        .adapter()
        .add_policy(
            GRANT_SECTION,
            GRANT_PTYPE,
            &[form.user.clone(), form.resource.clone(), ADMIN_ROLE.to_string()],
        )
        .await
        .map_err(|err| api_adapter_error("Failed to assign admin role", &err))?;
    tracing::info!(user = %form.user, resource = %form.resource, "resource created");
    Ok(Json(MessageResponse::new(
        "Resource created and admin role assigned",
    )))
}

#[utoipa::path(
    post,
    path = "/resource/{resource}/assign",
    tag = "admin",
    params(("resource" = String, Path, description = "Resource name")),
    request_body(content = AssignForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Role granted", body = MessageResponse),
        (status = 400, description = "Missing form field", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Store unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn assign_role(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Form(form): Form<AssignForm>,
) -> Result<Json<MessageResponse>, ApiError> {
    require("user", &form.user)?;
    require("role", &form.role)?;
    state
        .authority
        .adapter()
        .add_policy(
            GRANT_SECTION,
            GRANT_PTYPE,
            &[form.user.clone(), resource.clone(), form.role.clone()],
        )
        .await
        .map_err(|err| api_adapter_error("Failed to assign role", &err))?;
    tracing::info!(user = %form.user, %resource, role = %form.role, "role assigned");
    Ok(Json(MessageResponse::new("Role assigned successfully")))
}

#[utoipa::path(
    delete,
    path = "/resource/{resource}/assign",
    tag = "admin",
    params(("resource" = String, Path, description = "Resource name")),
    request_body(content = AssignForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Role revoked (or was never granted)", body = MessageResponse),
        (status = 400, description = "Missing form field", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Store unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn revoke_role(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Form(form): Form<AssignForm>,
) -> Result<Json<MessageResponse>, ApiError> {
    require("user", &form.user)?;
    require("role", &form.role)?;
    state
        .authority
        .adapter()
        .remove_policy(
            GRANT_SECTION,
            GRANT_PTYPE,
            &[form.user.clone(), resource.clone(), form.role.clone()],
        )
        .await
        .map_err(|err| api_adapter_error("Failed to revoke role", &err))?;
    tracing::info!(user = %form.user, %resource, role = %form.role, "role revoked");
    Ok(Json(MessageResponse::new("Role revoked successfully")))
}

#[utoipa::path(
    post,
    path = "/v1/policies",
    tag = "admin",
    request_body = PolicyRequest,
    responses(
        (status = 201, description = "Rule stored", body = MessageResponse),
        (status = 400, description = "Invalid rule", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Store unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn add_policy(
    State(state): State<AppState>,
    Json(body): Json<PolicyRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let section = section_of(&body.ptype)?;
    state
        .authority
        .adapter()
        .add_policy(section, &body.ptype, &body.rule)
        .await
        .map_err(|err| api_adapter_error("failed to store policy", &err))?;
    Ok((StatusCode::CREATED, Json(MessageResponse::new("policy stored"))))
}

#[utoipa::path(
    delete,
    path = "/v1/policies",
    tag = "admin",
    request_body = PolicyRequest,
    responses(
        (status = 200, description = "Rule removed (or was absent)", body = MessageResponse),
        (status = 400, description = "Invalid rule", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Store unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn remove_policy(
    State(state): State<AppState>,
    Json(body): Json<PolicyRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let section = section_of(&body.ptype)?;
    state
        .authority
        .adapter()
        .remove_policy(section, &body.ptype, &body.rule)
        .await
        .map_err(|err| api_adapter_error("failed to remove policy", &err))?;
    Ok(Json(MessageResponse::new("policy removed")))
}

#[utoipa::path(
    post,
    path = "/v1/policies/filter/delete",
    tag = "admin",
    request_body = FilteredPolicyRequest,
    responses(
        (status = 200, description = "Matching rules removed", body = FilteredDeleteResponse),
        (status = 400, description = "Invalid filter", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Store unavailable", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn remove_filtered_policy(
    State(state): State<AppState>,
    Json(body): Json<FilteredPolicyRequest>,
) -> Result<Json<FilteredDeleteResponse>, ApiError> {
    let section = section_of(&body.ptype)?;
    let deleted = state
        .authority
        .adapter()
        .remove_filtered_policy(section, &body.ptype, body.field_index, &body.field_values)
        .await
        .map_err(|err| api_adapter_error("failed to remove policies", &err))?;
    Ok(Json(FilteredDeleteResponse { deleted }))
}

#[utoipa::path(
    post,
    path = "/v1/policies/reload",
    tag = "admin",
    responses(
        (status = 200, description = "Reload finished or skipped", body = ReloadResponse),
        (status = 500, description = "Reload failed, previous policy kept", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn reload_policies(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, ApiError> {
    match state.authority.reload().await {
        Ok(ReloadOutcome::Reloaded {
            generation,
            rule_count,
        }) => {
            tracing::info!(generation, rules = rule_count, "policies reloaded on demand");
            Ok(Json(ReloadResponse {
                status: ReloadStatus::Reloaded,
                generation,
                rule_count,
            }))
        }
        Ok(ReloadOutcome::Skipped) => {
            let snapshot = state.authority.snapshot();
            Ok(Json(ReloadResponse {
                status: ReloadStatus::Skipped,
                generation: snapshot.generation,
                rule_count: snapshot.rule_count,
            }))
        }
        Err(err) => {
            tracing::error!(error = %err, kind = err.kind(), "on-demand policy reload failed");
            Err(api_internal_message("policy reload failed"))
        }
    }
}
