//! Gatekeeper HTTP API module.
//!
//! # Purpose
//! Route handlers grouped by surface: policy administration, sample guarded
//! resources, and system endpoints.
pub mod admin;
pub mod error;
pub mod openapi;
pub mod resources;
pub mod system;
pub mod types;
