//! Request tuple extraction and the per-request decision.
//!
//! Two strategies are supported:
//!
//! - [`ExtractionStrategy::PathRole`]: role from the `X-User-Role` header,
//!   resource from the first path segment (`/reports/q1` -> `/reports`),
//!   action from the HTTP method. Asks `(identity, role, resource, method)`.
//! - [`ExtractionStrategy::QueryResource`]: resource from a query parameter,
//!   action from the method's role name. Asks `(identity, resource, "admin")`
//!   first and allows on a match, then `(identity, resource, role)`.
//!
//! Any engine error is an internal error; nothing is allowed on an error.
use crate::engine::{DecisionEngine, EngineError};
use axum::extract::Query;
use axum::http::{HeaderMap, Method, Uri};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

pub const ROLE_HEADER: &str = "x-user-role";
pub const DEFAULT_RESOURCE_PARAM: &str = "resource";
pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionStrategy {
    PathRole,
    QueryResource { param: String },
}

impl Default for ExtractionStrategy {
    fn default() -> Self {
        ExtractionStrategy::QueryResource {
            param: DEFAULT_RESOURCE_PARAM.to_string(),
        }
    }
}

impl FromStr for ExtractionStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "path_role" | "path-role" => Ok(ExtractionStrategy::PathRole),
            "query_resource" | "query-resource" => Ok(ExtractionStrategy::default()),
            other => Err(format!("unknown extraction strategy: {other}")),
        }
    }
}

/// Role name required for a method under the query-resource strategy.
pub fn role_for_method(method: &Method) -> &'static str {
    match *method {
        Method::GET => "viewer",
        Method::POST | Method::PUT | Method::PATCH => "editor",
        Method::DELETE => "delete",
        _ => "unknown",
    }
}

/// First path segment with its leading slash; `/` for the root path.
pub fn first_path_segment(path: &str) -> String {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let segment = trimmed.split('/').next().unwrap_or("");
    format!("/{segment}")
}

fn query_value(uri: &Uri, param: &str) -> Option<String> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
    params.get(param).filter(|value| !value.is_empty()).cloned()
}

/// Request context attached to allowed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedRequest {
    pub identity: String,
    pub resource: String,
    pub action: String,
    pub role: Option<String>,
    /// Allowed through the admin grant rather than the action's role.
    pub admin_override: bool,
    pub policy_generation: u64,
}

#[derive(Debug)]
pub enum Decision {
    Allowed(AuthorizedRequest),
    Forbidden { resource: Option<String>, action: String },
    Failed(EngineError),
}

pub struct DecisionInput<'a> {
    pub identity: &'a str,
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub policy_generation: u64,
}

impl ExtractionStrategy {
    pub fn decide(&self, engine: &dyn DecisionEngine, input: &DecisionInput<'_>) -> Decision {
        match self {
            ExtractionStrategy::PathRole => decide_path_role(engine, input),
            ExtractionStrategy::QueryResource { param } => {
                decide_query_resource(engine, input, param)
            }
        }
    }
}

fn decide_path_role(engine: &dyn DecisionEngine, input: &DecisionInput<'_>) -> Decision {
    let role = input
        .headers
        .get(ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string();
    let resource = first_path_segment(input.uri.path());
    let action = input.method.as_str().to_string();

    match engine.enforce(&[input.identity, &role, &resource, &action]) {
        Ok(true) => Decision::Allowed(AuthorizedRequest {
            identity: input.identity.to_string(),
            resource,
            action,
            role: Some(role),
            admin_override: false,
            policy_generation: input.policy_generation,
        }),
        Ok(false) => Decision::Forbidden {
            resource: Some(resource),
            action,
        },
        Err(err) => Decision::Failed(err),
    }
}

fn decide_query_resource(
    engine: &dyn DecisionEngine,
    input: &DecisionInput<'_>,
    param: &str,
) -> Decision {
    let action = role_for_method(input.method).to_string();
    let Some(resource) = query_value(input.uri, param) else {
        return Decision::Forbidden {
            resource: None,
            action,
        };
    };
    let allowed = |admin_override: bool, resource: String, action: String| {
        Decision::Allowed(AuthorizedRequest {
            identity: input.identity.to_string(),
            resource,
            action,
            role: None,
            admin_override,
            policy_generation: input.policy_generation,
        })
    };

    match engine.enforce(&[input.identity, &resource, ADMIN_ROLE]) {
        Ok(true) => return allowed(true, resource, action),
        Ok(false) => {}
        Err(err) => return Decision::Failed(err),
    }
    match engine.enforce(&[input.identity, &resource, &action]) {
        Ok(true) => allowed(false, resource, action),
        Ok(false) => Decision::Forbidden {
            resource: Some(resource),
            action,
        },
        Err(err) => Decision::Failed(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Allows exactly the listed tuples and records every question asked.
    #[derive(Default)]
    struct TableEngine {
        allowed: HashSet<Vec<String>>,
        asked: Mutex<Vec<Vec<String>>>,
    }

    impl TableEngine {
        fn allowing(rows: &[&[&str]]) -> Self {
            Self {
                allowed: rows
                    .iter()
                    .map(|row| row.iter().map(|f| f.to_string()).collect())
                    .collect(),
                asked: Mutex::new(Vec::new()),
            }
        }

        fn asked(&self) -> Vec<Vec<String>> {
            self.asked.lock().expect("lock").clone()
        }
    }

    impl DecisionEngine for TableEngine {
        fn enforce(&self, request: &[&str]) -> Result<bool, EngineError> {
            let row: Vec<String> = request.iter().map(|f| f.to_string()).collect();
            self.asked.lock().expect("lock").push(row.clone());
            Ok(self.allowed.contains(&row))
        }
    }

    struct BrokenEngine;

    impl DecisionEngine for BrokenEngine {
        fn enforce(&self, _request: &[&str]) -> Result<bool, EngineError> {
            Err(EngineError::Decision("matcher exploded".to_string()))
        }
    }

    fn input<'a>(
        method: &'a Method,
        uri: &'a Uri,
        headers: &'a HeaderMap,
    ) -> DecisionInput<'a> {
        DecisionInput {
            identity: "alice",
            method,
            uri,
            headers,
            policy_generation: 7,
        }
    }

    #[test]
    fn method_role_mapping() {
        assert_eq!(role_for_method(&Method::GET), "viewer");
        assert_eq!(role_for_method(&Method::POST), "editor");
        assert_eq!(role_for_method(&Method::PUT), "editor");
        assert_eq!(role_for_method(&Method::PATCH), "editor");
        assert_eq!(role_for_method(&Method::DELETE), "delete");
        assert_eq!(role_for_method(&Method::OPTIONS), "unknown");
    }

    #[test]
    fn first_segment_extraction() {
        assert_eq!(first_path_segment("/reports"), "/reports");
        assert_eq!(first_path_segment("/reports/q1/summary"), "/reports");
        assert_eq!(first_path_segment("/"), "/");
        assert_eq!(first_path_segment(""), "/");
    }

    #[test]
    fn strategy_parsing() {
        assert_eq!(
            "path_role".parse::<ExtractionStrategy>().expect("parse"),
            ExtractionStrategy::PathRole
        );
        assert_eq!(
            "query-resource".parse::<ExtractionStrategy>().expect("parse"),
            ExtractionStrategy::default()
        );
        assert!("jwt".parse::<ExtractionStrategy>().is_err());
    }

    #[test]
    fn path_role_asks_identity_role_resource_method() {
        let engine = TableEngine::allowing(&[&["alice", "editor", "/reports", "GET"]]);
        let method = Method::GET;
        let uri: Uri = "/reports".parse().expect("uri");
        let mut headers = HeaderMap::new();
        headers.insert(ROLE_HEADER, "editor".parse().expect("header"));

        let decision = ExtractionStrategy::PathRole.decide(&engine, &input(&method, &uri, &headers));
        match decision {
            Decision::Allowed(authorized) => {
                assert_eq!(authorized.resource, "/reports");
                assert_eq!(authorized.action, "GET");
                assert_eq!(authorized.role.as_deref(), Some("editor"));
                assert_eq!(authorized.policy_generation, 7);
            }
            other => panic!("unexpected decision: {other:?}"),
        }
        assert_eq!(engine.asked(), vec![vec!["alice", "editor", "/reports", "GET"]]);
    }

    #[test]
    fn path_role_without_header_uses_empty_role() {
        let engine = TableEngine::default();
        let method = Method::GET;
        let uri: Uri = "/reports/q1".parse().expect("uri");
        let headers = HeaderMap::new();

        let decision = ExtractionStrategy::PathRole.decide(&engine, &input(&method, &uri, &headers));
        assert!(matches!(decision, Decision::Forbidden { .. }));
        assert_eq!(engine.asked(), vec![vec!["alice", "", "/reports", "GET"]]);
    }

    #[test]
    fn admin_grant_overrides_missing_action_role() {
        let engine = TableEngine::allowing(&[&["alice", "reports", "admin"]]);
        let method = Method::DELETE;
        let uri: Uri = "/resource/delete?resource=reports".parse().expect("uri");
        let headers = HeaderMap::new();

        let decision =
            ExtractionStrategy::default().decide(&engine, &input(&method, &uri, &headers));
        match decision {
            Decision::Allowed(authorized) => {
                assert!(authorized.admin_override);
                assert_eq!(authorized.action, "delete");
            }
            other => panic!("unexpected decision: {other:?}"),
        }
        assert_eq!(engine.asked().len(), 1);
    }

    #[test]
    fn query_resource_checks_action_role_after_admin() {
        let engine = TableEngine::allowing(&[&["alice", "reports", "viewer"]]);
        let method = Method::GET;
        let uri: Uri = "/resource/view?resource=reports".parse().expect("uri");
        let headers = HeaderMap::new();

        let decision =
            ExtractionStrategy::default().decide(&engine, &input(&method, &uri, &headers));
        assert!(matches!(
            decision,
            Decision::Allowed(AuthorizedRequest {
                admin_override: false,
                ..
            })
        ));
        assert_eq!(
            engine.asked(),
            vec![
                vec!["alice", "reports", "admin"],
                vec!["alice", "reports", "viewer"]
            ]
        );
    }

    #[test]
    fn query_resource_denies_other_roles() {
        let engine = TableEngine::allowing(&[&["alice", "reports", "viewer"]]);
        let method = Method::POST;
        let uri: Uri = "/resource/edit?resource=reports".parse().expect("uri");
        let headers = HeaderMap::new();
        let decision =
            ExtractionStrategy::default().decide(&engine, &input(&method, &uri, &headers));
        assert!(matches!(decision, Decision::Forbidden { .. }));
    }

    #[test]
    fn missing_or_empty_resource_is_forbidden_without_asking() {
        let engine = TableEngine::default();
        let method = Method::GET;
        let headers = HeaderMap::new();
        for raw in ["/resource/view", "/resource/view?resource=", "/resource/view?other=x"] {
            let uri: Uri = raw.parse().expect("uri");
            let decision =
                ExtractionStrategy::default().decide(&engine, &input(&method, &uri, &headers));
            assert!(matches!(
                decision,
                Decision::Forbidden { resource: None, .. }
            ));
        }
        assert!(engine.asked().is_empty());
    }

    #[test]
    fn custom_query_parameter_is_honoured() {
        let engine = TableEngine::allowing(&[&["alice", "billing", "viewer"]]);
        let method = Method::GET;
        let uri: Uri = "/resource/view?target=billing".parse().expect("uri");
        let headers = HeaderMap::new();
        let strategy = ExtractionStrategy::QueryResource {
            param: "target".to_string(),
        };
        let decision = strategy.decide(&engine, &input(&method, &uri, &headers));
        assert!(matches!(decision, Decision::Allowed(_)));
    }

    #[test]
    fn engine_errors_fail_closed_under_both_strategies() {
        let method = Method::GET;
        let uri: Uri = "/reports?resource=reports".parse().expect("uri");
        let headers = HeaderMap::new();
        for strategy in [ExtractionStrategy::PathRole, ExtractionStrategy::default()] {
            let decision = strategy.decide(&BrokenEngine, &input(&method, &uri, &headers));
            assert!(matches!(decision, Decision::Failed(_)));
        }
    }
}
