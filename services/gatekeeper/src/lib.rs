//! Gatekeeper service library crate.
//!
//! # Purpose
//! Exposes the enforcement middleware, policy authority, background refresher,
//! HTTP API, configuration, and observability wiring for use by the binary and
//! tests.
//!
//! # Notes
//! Policy persistence lives in the `policy-opensearch` crate; this crate only
//! decides what a loaded policy means for an HTTP request.
pub mod api;
pub mod app;
pub mod authority;
pub mod config;
pub mod engine;
pub mod middleware;
pub mod observability;
pub mod refresher;
