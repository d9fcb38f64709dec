//! In-memory policy model.
//!
//! # Purpose
//! Holds loaded rules grouped by section (`p` for grants, `g` for groupings)
//! and then by ptype, preserving insertion order and duplicates.
use std::collections::BTreeMap;

pub const GRANT_SECTION: &str = "p";
pub const GROUPING_SECTION: &str = "g";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyModel {
    sections: BTreeMap<String, BTreeMap<String, Vec<Vec<String>>>>,
}

impl PolicyModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, section: &str, ptype: &str, rule: Vec<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .entry(ptype.to_string())
            .or_default()
            .push(rule);
    }

    pub fn rules(&self, section: &str, ptype: &str) -> &[Vec<String>] {
        self.sections
            .get(section)
            .and_then(|ptypes| ptypes.get(ptype))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate `(section, ptype, rules)` in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &[Vec<String>])> {
        self.sections.iter().flat_map(|(section, ptypes)| {
            ptypes
                .iter()
                .map(move |(ptype, rules)| (section.as_str(), ptype.as_str(), rules.as_slice()))
        })
    }

    /// Total number of rules across all sections.
    pub fn len(&self) -> usize {
        self.iter().map(|(_, _, rules)| rules.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Map a ptype to the section it belongs to (`p2` -> `p`, `g3` -> `g`).
pub fn section_for_ptype(ptype: &str) -> Option<&'static str> {
    let mut chars = ptype.chars();
    let head = chars.next()?;
    if !chars.as_str().chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match head {
        'p' => Some(GRANT_SECTION),
        'g' => Some(GROUPING_SECTION),
        _ => None,
    }
}
