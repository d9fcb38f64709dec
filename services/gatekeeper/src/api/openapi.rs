//! OpenAPI schema aggregation for the gatekeeper API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document served
//! at `/v1/openapi.json`.
use crate::api::{
    admin, resources, system,
    types::{
        AssignForm, ErrorResponse, FilteredDeleteResponse, FilteredPolicyRequest, HealthStatus,
        MessageResponse, PolicyRequest, PolicyStatus, ReloadResponse, ReloadStatus,
        ResourceActionResponse, ResourceForm,
    },
};
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

struct BasicAuthScheme;

impl Modify for BasicAuthScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "gatekeeper",
        version = "v1",
        description = "Policy-enforcing HTTP gateway backed by an OpenSearch policy index"
    ),
    paths(
        system::system_health,
        system::policy_status,
        admin::create_resource,
        admin::assign_role,
        admin::revoke_role,
        admin::add_policy,
        admin::remove_policy,
        admin::remove_filtered_policy,
        admin::reload_policies,
        resources::view_resource,
        resources::edit_resource,
        resources::delete_resource
    ),
    components(schemas(
        ErrorResponse,
        MessageResponse,
        ResourceForm,
        AssignForm,
        PolicyRequest,
        FilteredPolicyRequest,
        FilteredDeleteResponse,
        ReloadStatus,
        ReloadResponse,
        PolicyStatus,
        HealthStatus,
        ResourceActionResponse
    )),
    modifiers(&BasicAuthScheme),
    tags(
        (name = "system", description = "Health and policy snapshot status"),
        (name = "admin", description = "Policy administration (unguarded)"),
        (name = "resources", description = "Sample resources guarded by policy")
    )
)]
pub struct ApiDoc;
