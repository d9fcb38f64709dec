//! Sample resource endpoints mounted behind the enforcement layer.
use crate::api::types::ResourceActionResponse;
use crate::middleware::AuthorizedRequest;
use axum::{Extension, Json};

fn respond(message: &str, authorized: AuthorizedRequest) -> Json<ResourceActionResponse> {
    Json(ResourceActionResponse {
        message: message.to_string(),
        identity: authorized.identity,
        resource: authorized.resource,
        action: authorized.action,
    })
}

#[utoipa::path(
    get,
    path = "/resource/view",
    tag = "resources",
    params(("resource" = Option<String>, Query, description = "Resource to act on")),
    responses(
        (status = 200, description = "Resource viewed", body = ResourceActionResponse),
        (status = 401, description = "Missing or malformed credentials", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Denied by policy", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Decision could not be computed", body = crate::api::types::ErrorResponse)
    ),
    security(("basic" = []))
)]
pub(crate) async fn view_resource(
    Extension(authorized): Extension<AuthorizedRequest>,
) -> Json<ResourceActionResponse> {
    respond("Resource viewed", authorized)
}

#[utoipa::path(
    post,
    path = "/resource/edit",
    tag = "resources",
    params(("resource" = Option<String>, Query, description = "Resource to act on")),
    responses(
        (status = 200, description = "Resource edited", body = ResourceActionResponse),
        (status = 401, description = "Missing or malformed credentials", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Denied by policy", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Decision could not be computed", body = crate::api::types::ErrorResponse)
    ),
    security(("basic" = []))
)]
pub(crate) async fn edit_resource(
    Extension(authorized): Extension<AuthorizedRequest>,
) -> Json<ResourceActionResponse> {
    respond("Resource edited", authorized)
}

#[utoipa::path(
    delete,
    path = "/resource/delete",
    tag = "resources",
    params(("resource" = Option<String>, Query, description = "Resource to act on")),
    responses(
        (status = 200, description = "Resource deleted", body = ResourceActionResponse),
        (status = 401, description = "Missing or malformed credentials", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Denied by policy", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Decision could not be computed", body = crate::api::types::ErrorResponse)
    ),
    security(("basic" = []))
)]
pub(crate) async fn delete_resource(
    Extension(authorized): Extension<AuthorizedRequest>,
) -> Json<ResourceActionResponse> {
    respond("Resource deleted", authorized)
}
