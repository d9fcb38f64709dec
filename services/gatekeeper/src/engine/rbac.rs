//! Casbin-backed decision engine.
//!
//! # Purpose
//! Builds an in-memory Casbin enforcer from a loaded [`PolicyModel`] and
//! answers decisions against it.
//!
//! # Key invariants
//! - Grant rules whose length does not match the model's `p` definition are
//!   skipped at build time; Casbin would otherwise fail every decision.
//! - Rules filed under a ptype the model does not define are skipped.
//! - Role links are built once after all rules are inserted.
use crate::engine::{DecisionEngine, EngineBuilder, EngineError};
use async_trait::async_trait;
use casbin::{CoreApi, DefaultModel, Enforcer, MemoryAdapter, MgmtApi, Model};
use policy_opensearch::{GRANT_SECTION, GROUPING_SECTION, PolicyModel};
use std::collections::HashMap;
use std::sync::Arc;

/// Model for `(identity, role, resource, action)` requests: the identity must
/// hold the claimed role, and the role must be granted the action.
pub const PATH_ROLE_MODEL: &str = r#"
[request_definition]
r = sub, role, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, r.role) && r.role == p.sub && r.obj == p.obj && r.act == p.act
"#;

/// Model for `(identity, resource, role)` requests against rules written by
/// the resource administration endpoints.
pub const QUERY_RESOURCE_MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
"#;

pub struct CasbinEngine {
    enforcer: Enforcer,
}

impl DecisionEngine for CasbinEngine {
    fn enforce(&self, request: &[&str]) -> Result<bool, EngineError> {
        let decision = match *request {
            [sub, obj, act] => self.enforcer.enforce((sub, obj, act)),
            [sub, role, obj, act] => self.enforcer.enforce((sub, role, obj, act)),
            _ => return Err(EngineError::UnsupportedArity(request.len())),
        };
        decision.map_err(|err| EngineError::Decision(err.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct CasbinEngineBuilder {
    model_text: Arc<str>,
}

impl CasbinEngineBuilder {
    pub fn new(model_text: impl Into<Arc<str>>) -> Self {
        Self {
            model_text: model_text.into(),
        }
    }

    pub fn model_text(&self) -> &str {
        &self.model_text
    }

    /// Parse the model text without building an engine.
    pub async fn validate(&self) -> Result<(), EngineError> {
        DefaultModel::from_str(&self.model_text)
            .await
            .map(|_| ())
            .map_err(|err| EngineError::Model(err.to_string()))
    }
}

fn grant_arities(model: &DefaultModel) -> HashMap<String, usize> {
    model
        .get_model()
        .get(GRANT_SECTION)
        .map(|assertions| {
            assertions
                .iter()
                .map(|(ptype, assertion)| (ptype.clone(), assertion.tokens.len()))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl EngineBuilder for CasbinEngineBuilder {
    async fn build(&self, model: &PolicyModel) -> Result<Arc<dyn DecisionEngine>, EngineError> {
        let casbin_model = DefaultModel::from_str(&self.model_text)
            .await
            .map_err(|err| EngineError::Model(err.to_string()))?;
        let arities = grant_arities(&casbin_model);
        let mut enforcer = Enforcer::new(casbin_model, MemoryAdapter::default())
            .await
            .map_err(|err| EngineError::Model(err.to_string()))?;

        let mut skipped = 0usize;
        for (section, ptype, rules) in model.iter() {
            for rule in rules {
                let applied = match section {
                    GRANT_SECTION => match arities.get(ptype) {
                        Some(&arity) if arity == rule.len() => enforcer
                            .add_named_policy(ptype, rule.clone())
                            .await
                            .map(|_| true),
                        _ => Ok(false),
                    },
                    GROUPING_SECTION if rule.len() >= 2 => enforcer
                        .add_named_grouping_policy(ptype, rule.clone())
                        .await
                        .map(|_| true),
                    _ => Ok(false),
                };
                match applied {
                    Ok(true) => {}
                    Ok(false) => {
                        skipped += 1;
                        tracing::warn!(
                            section,
                            ptype,
                            fields = rule.len(),
                            "policy rule does not fit the access model, skipping"
                        );
                    }
                    Err(err) => return Err(EngineError::Policy(err.to_string())),
                }
            }
        }

        enforcer
            .build_role_links()
            .map_err(|err| EngineError::Policy(err.to_string()))?;
        tracing::debug!(rules = model.len(), skipped, "decision engine built");
        Ok(Arc::new(CasbinEngine { enforcer }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[tokio::test]
    async fn embedded_models_parse() {
        CasbinEngineBuilder::new(PATH_ROLE_MODEL)
            .validate()
            .await
            .expect("path role model");
        CasbinEngineBuilder::new(QUERY_RESOURCE_MODEL)
            .validate()
            .await
            .expect("query resource model");
    }

    #[tokio::test]
    async fn invalid_model_text_is_model_error() {
        let err = CasbinEngineBuilder::new("not a model")
            .build(&PolicyModel::new())
            .await
            .err()
            .expect("invalid model");
        assert!(matches!(err, EngineError::Model(_)));
    }

    #[tokio::test]
    async fn path_role_requires_membership_and_grant() {
        let mut model = PolicyModel::new();
        model.add_rule("p", "p", rule(&["editor", "/reports", "GET"]));
        model.add_rule("g", "g", rule(&["alice", "editor"]));
        let engine = CasbinEngineBuilder::new(PATH_ROLE_MODEL)
            .build(&model)
            .await
            .expect("engine");

        assert!(engine.enforce(&["alice", "editor", "/reports", "GET"]).expect("allow"));
        assert!(!engine.enforce(&["alice", "editor", "/reports", "DELETE"]).expect("deny"));
        assert!(!engine.enforce(&["bob", "editor", "/reports", "GET"]).expect("not member"));
    }

    #[tokio::test]
    async fn query_resource_matches_subject_resource_role() {
        let mut model = PolicyModel::new();
        model.add_rule("p", "p", rule(&["alice", "reports", "admin"]));
        model.add_rule("p", "p", rule(&["bob", "reports", "viewer"]));
        let engine = CasbinEngineBuilder::new(QUERY_RESOURCE_MODEL)
            .build(&model)
            .await
            .expect("engine");

        assert!(engine.enforce(&["alice", "reports", "admin"]).expect("admin"));
        assert!(engine.enforce(&["bob", "reports", "viewer"]).expect("viewer"));
        assert!(!engine.enforce(&["bob", "reports", "editor"]).expect("editor"));
        assert!(!engine.enforce(&["bob", "billing", "viewer"]).expect("other"));
    }

    #[tokio::test]
    async fn mismatched_rules_are_skipped_not_fatal() {
        let mut model = PolicyModel::new();
        model.add_rule("p", "p", rule(&["alice", "reports", "viewer", "extra"]));
        model.add_rule("p", "g", rule(&["alice", "editor"]));
        model.add_rule("p", "p", rule(&["bob", "reports", "viewer"]));
        let engine = CasbinEngineBuilder::new(QUERY_RESOURCE_MODEL)
            .build(&model)
            .await
            .expect("engine");

        assert!(engine.enforce(&["bob", "reports", "viewer"]).expect("bob"));
        assert!(!engine.enforce(&["alice", "reports", "viewer"]).expect("alice"));
    }

    #[tokio::test]
    async fn unsupported_request_length_is_an_error() {
        let engine = CasbinEngineBuilder::new(QUERY_RESOURCE_MODEL)
            .build(&PolicyModel::new())
            .await
            .expect("engine");
        let err = engine.enforce(&["alice", "reports"]).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedArity(2)));
    }
}
