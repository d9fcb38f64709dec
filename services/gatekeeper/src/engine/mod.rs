//! Decision engine contract.
//!
//! # Purpose
//! Separates "is this request tuple allowed" from how the rules were loaded.
//! An engine is immutable once built; a policy reload builds a new one from a
//! fresh [`PolicyModel`] and replaces the old one as a whole.
//!
//! # Call shapes
//! The path-role strategy asks `(identity, role, resource, action)` and the
//! query-resource strategy asks `(identity, resource, action)`. Engines accept
//! both and reject any other length with [`EngineError::UnsupportedArity`].
pub mod rbac;

use async_trait::async_trait;
use policy_opensearch::PolicyModel;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid policy model: {0}")]
    Model(String),
    #[error("failed to apply policy rule: {0}")]
    Policy(String),
    #[error("decision failed: {0}")]
    Decision(String),
    #[error("unsupported request length {0}")]
    UnsupportedArity(usize),
}

pub trait DecisionEngine: Send + Sync {
    fn enforce(&self, request: &[&str]) -> Result<bool, EngineError>;
}

#[async_trait]
pub trait EngineBuilder: Send + Sync {
    async fn build(&self, model: &PolicyModel) -> Result<Arc<dyn DecisionEngine>, EngineError>;
}
