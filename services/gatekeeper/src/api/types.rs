//! HTTP API request/response types.
//!
//! # Purpose
//! Shared payload shapes for the gatekeeper REST API and OpenAPI schema
//! generation.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Form body for creating a resource owned by `user`.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ResourceForm {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub user: String,
}

/// Form body for granting or revoking `role` on a resource.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AssignForm {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct PolicyRequest {
    /// Rule type, e.g. `p` for grants or `g` for role membership.
    pub ptype: String,
    /// Positional fields `v0`..`v5`; at least two.
    pub rule: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct FilteredPolicyRequest {
    pub ptype: String,
    /// Index of the first field matched by `field_values`.
    #[serde(default)]
    pub field_index: usize,
    /// Exact values to match; empty strings match anything.
    pub field_values: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct FilteredDeleteResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReloadStatus {
    Reloaded,
    Skipped,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ReloadResponse {
    pub status: ReloadStatus,
    pub generation: u64,
    pub rule_count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct PolicyStatus {
    pub generation: u64,
    pub rule_count: usize,
    pub skipped_documents: usize,
    pub loaded_at: DateTime<Utc>,
    pub strategy: String,
    pub index: String,
    pub backend: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub backend: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ResourceActionResponse {
    pub message: String,
    pub identity: String,
    pub resource: String,
    pub action: String,
}
