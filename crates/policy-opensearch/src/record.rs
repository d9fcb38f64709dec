//! Stored policy document shape.
//!
//! # Purpose
//! Defines the seven-field keyword schema, the record written for each rule,
//! the deterministic document id, and the per-document decode step used by
//! the bulk loader.
//!
//! # Key invariants
//! - The document id is derived from `v0:v1:v2` only. Two rules that agree on
//!   those fields and differ in `v3..v5` overwrite each other.
//! - Fields supplied by the caller are always written (empty strings included),
//!   so records written through the adapter never contain positional gaps.
use crate::errors::ParseError;
use crate::model::{GRANT_SECTION, section_for_ptype};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Maximum number of positional fields (`v0`..`v5`).
pub const MAX_FIELDS: usize = 6;
/// Minimum number of fields accepted for a write.
pub const MIN_FIELDS: usize = 2;

pub const FIELD_NAMES: [&str; MAX_FIELDS] = ["v0", "v1", "v2", "v3", "v4", "v5"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub ptype: String,
    pub v0: String,
    pub v1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v5: Option<String>,
}

impl PolicyRecord {
    pub fn from_rule(ptype: &str, rule: &[String]) -> Result<Self, String> {
        if ptype.is_empty() {
            return Err("ptype must not be empty".to_string());
        }
        validate_len(rule)?;
        let field = |idx: usize| rule.get(idx).cloned();
        Ok(Self {
            ptype: ptype.to_string(),
            v0: rule[0].clone(),
            v1: rule[1].clone(),
            v2: field(2),
            v3: field(3),
            v4: field(4),
            v5: field(5),
        })
    }

    pub fn document_id(&self) -> String {
        key_for(&self.v0, &self.v1, self.v2.as_deref().unwrap_or(""))
    }

    /// Positional fields in order, stopping at the first absent one.
    pub fn fields(&self) -> Vec<String> {
        let mut out = vec![self.v0.clone(), self.v1.clone()];
        for value in [&self.v2, &self.v3, &self.v4, &self.v5] {
            match value {
                Some(value) => out.push(value.clone()),
                None => break,
            }
        }
        out
    }
}

/// Derive the document id for a rule without building a record.
pub fn document_id(rule: &[String]) -> Result<String, String> {
    validate_len(rule)?;
    Ok(key_for(
        &rule[0],
        &rule[1],
        rule.get(2).map(String::as_str).unwrap_or(""),
    ))
}

fn key_for(v0: &str, v1: &str, v2: &str) -> String {
    format!("{v0}:{v1}:{v2}").replace('/', "_")
}

fn validate_len(rule: &[String]) -> Result<(), String> {
    if rule.len() < MIN_FIELDS {
        return Err(format!(
            "rule needs at least {MIN_FIELDS} fields, got {}",
            rule.len()
        ));
    }
    if rule.len() > MAX_FIELDS {
        return Err(format!(
            "rule has at most {MAX_FIELDS} fields, got {}",
            rule.len()
        ));
    }
    Ok(())
}

/// Index body creating the exact-match schema.
pub fn index_mapping() -> Value {
    let mut properties = Map::new();
    properties.insert("ptype".to_string(), json!({ "type": "keyword" }));
    for name in FIELD_NAMES {
        properties.insert(name.to_string(), json!({ "type": "keyword" }));
    }
    json!({ "mappings": { "properties": properties } })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Contiguous fields required; section discovered from the ptype.
    #[default]
    Strict,
    /// Truncate at the first missing field and file everything under `p`.
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRule {
    pub section: String,
    pub ptype: String,
    pub rule: Vec<String>,
}

pub fn decode_source(source: &Value, mode: DecodeMode) -> Result<DecodedRule, ParseError> {
    let object = source.as_object().ok_or(ParseError::NotAnObject)?;
    let ptype = object
        .get("ptype")
        .and_then(Value::as_str)
        .filter(|ptype| !ptype.is_empty())
        .ok_or(ParseError::MissingPtype)?;

    let rule = match mode {
        DecodeMode::Legacy => legacy_fields(object),
        DecodeMode::Strict => strict_fields(object)?,
    };
    if rule.is_empty() {
        return Err(ParseError::EmptyRule);
    }

    let section = match mode {
        DecodeMode::Legacy => GRANT_SECTION,
        DecodeMode::Strict => section_for_ptype(ptype)
            .ok_or_else(|| ParseError::UnknownSection(ptype.to_string()))?,
    };

    Ok(DecodedRule {
        section: section.to_string(),
        ptype: ptype.to_string(),
        rule,
    })
}

fn legacy_fields(object: &Map<String, Value>) -> Vec<String> {
    FIELD_NAMES
        .iter()
        .map_while(|name| object.get(*name).and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

fn strict_fields(object: &Map<String, Value>) -> Result<Vec<String>, ParseError> {
    let mut rule = Vec::new();
    let mut first_missing: Option<&str> = None;
    for name in FIELD_NAMES {
        match object.get(name) {
            None | Some(Value::Null) => {
                first_missing.get_or_insert(name);
            }
            Some(Value::String(value)) => {
                if let Some(missing) = first_missing {
                    return Err(ParseError::NonContiguous {
                        missing: missing.to_string(),
                        present: name.to_string(),
                    });
                }
                rule.push(value.clone());
            }
            Some(_) => {
                return Err(ParseError::InvalidField {
                    field: name.to_string(),
                });
            }
        }
    }
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn document_id_replaces_slashes() {
        let record =
            PolicyRecord::from_rule("p", &rule(&["alice", "/reports/q1", "GET"])).expect("record");
        assert_eq!(record.document_id(), "alice:_reports_q1:GET");
    }

    #[test]
    fn document_id_treats_missing_third_field_as_empty() {
        assert_eq!(
            document_id(&rule(&["alice", "editor"])).expect("id"),
            "alice:editor:"
        );
    }

    #[test]
    fn document_id_ignores_trailing_fields() {
        let a = document_id(&rule(&["alice", "reports", "viewer", "allow"])).expect("id");
        let b = document_id(&rule(&["alice", "reports", "viewer", "deny"])).expect("id");
        assert_eq!(a, b);
    }

    #[test]
    fn from_rule_rejects_short_and_long_rules() {
        assert!(PolicyRecord::from_rule("p", &rule(&["alice"])).is_err());
        assert!(PolicyRecord::from_rule("p", &rule(&["a", "b", "c", "d", "e", "f", "g"])).is_err());
        assert!(PolicyRecord::from_rule("", &rule(&["a", "b"])).is_err());
    }

    #[test]
    fn record_serialization_omits_absent_fields_only() {
        let record = PolicyRecord::from_rule("p", &rule(&["alice", "reports", ""])).expect("record");
        let value = serde_json::to_value(&record).expect("json");
        assert_eq!(value["v2"], "");
        assert!(value.get("v3").is_none());
    }

    #[test]
    fn mapping_declares_keyword_fields() {
        let mapping = index_mapping();
        let properties = &mapping["mappings"]["properties"];
        for name in ["ptype", "v0", "v1", "v2", "v3", "v4", "v5"] {
            assert_eq!(properties[name]["type"], "keyword", "{name}");
        }
    }

    #[test]
    fn strict_decode_discovers_section() {
        let grouping = json!({ "ptype": "g", "v0": "alice", "v1": "editor" });
        let decoded = decode_source(&grouping, DecodeMode::Strict).expect("decoded");
        assert_eq!(decoded.section, "g");
        assert_eq!(decoded.rule, rule(&["alice", "editor"]));
    }

    #[test]
    fn strict_decode_rejects_gaps() {
        let gapped = json!({ "ptype": "p", "v0": "alice", "v2": "viewer" });
        let err = decode_source(&gapped, DecodeMode::Strict).unwrap_err();
        assert_eq!(
            err,
            ParseError::NonContiguous {
                missing: "v1".to_string(),
                present: "v2".to_string()
            }
        );
    }

    #[test]
    fn legacy_decode_truncates_and_uses_grant_section() {
        let gapped = json!({ "ptype": "g", "v0": "alice", "v2": "viewer" });
        let decoded = decode_source(&gapped, DecodeMode::Legacy).expect("decoded");
        assert_eq!(decoded.section, "p");
        assert_eq!(decoded.rule, rule(&["alice"]));
    }

    #[test]
    fn decode_rejects_bad_ptype_and_fields() {
        assert_eq!(
            decode_source(&json!({ "v0": "a" }), DecodeMode::Strict).unwrap_err(),
            ParseError::MissingPtype
        );
        assert_eq!(
            decode_source(&json!({ "ptype": 7, "v0": "a" }), DecodeMode::Legacy).unwrap_err(),
            ParseError::MissingPtype
        );
        assert_eq!(
            decode_source(&json!({ "ptype": "p", "v0": 1 }), DecodeMode::Strict).unwrap_err(),
            ParseError::InvalidField {
                field: "v0".to_string()
            }
        );
        assert_eq!(
            decode_source(&json!({ "ptype": "p" }), DecodeMode::Legacy).unwrap_err(),
            ParseError::EmptyRule
        );
        assert_eq!(
            decode_source(&json!("p"), DecodeMode::Strict).unwrap_err(),
            ParseError::NotAnObject
        );
        assert_eq!(
            decode_source(&json!({ "ptype": "x", "v0": "a" }), DecodeMode::Strict).unwrap_err(),
            ParseError::UnknownSection("x".to_string())
        );
    }
}
