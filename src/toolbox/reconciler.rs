//! Tool order reconciliation and priority ranking.
//!
//! Turns the parser's raw tool sequence into the order the toolbar uses.
//! Entries are trimmed, order and duplicates are kept, and each name is
//! ranked by its first occurrence. Names missing from the taxonomy are
//! passed through and reported by default; the `drop` policy removes them.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use super::taxonomy::Taxonomy;
use crate::inference::config::UnknownToolPolicy;

// ─── Priority Map ───────────────────────────────────────────────────────────

/// Tool name → zero-based index of its first occurrence in the tool order.
///
/// Always rebuilt from a whole tool order, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PriorityMap {
    ranks: BTreeMap<String, usize>,
}

impl PriorityMap {
    pub fn from_order(order: &[String]) -> Self {
        let mut ranks = BTreeMap::new();
        for (index, name) in order.iter().enumerate() {
            ranks.entry(name.clone()).or_insert(index);
        }
        Self { ranks }
    }

    pub fn rank(&self, name: &str) -> Option<usize> {
        self.ranks.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Unique names, lowest rank first.
    pub fn ranked(&self) -> Vec<&str> {
        let mut names: Vec<(&str, usize)> =
            self.ranks.iter().map(|(n, r)| (n.as_str(), *r)).collect();
        names.sort_by_key(|(_, rank)| *rank);
        names.into_iter().map(|(n, _)| n).collect()
    }

    /// The first `max` names by rank.
    pub fn top(&self, max: usize) -> Vec<String> {
        self.ranked()
            .into_iter()
            .take(max)
            .map(str::to_string)
            .collect()
    }
}

// ─── Reconcile ──────────────────────────────────────────────────────────────

/// A reconciled tool order with its ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Trimmed tool order; duplicates kept.
    pub tool_order: Vec<String>,
    pub priority: PriorityMap,
    /// Names not found in the taxonomy, first occurrence order.
    pub unknown: Vec<String>,
}

impl Reconciled {
    /// The primary-tools view: unique names in rank order, at most `max`.
    ///
    /// The full tool order and priority map stay untruncated.
    pub fn primary_tools(&self, max: usize) -> Vec<String> {
        self.priority.top(max)
    }
}

/// Normalize a raw tool order against the taxonomy.
pub fn reconcile(raw: &[String], taxonomy: &Taxonomy, policy: UnknownToolPolicy) -> Reconciled {
    let mut tool_order = Vec::with_capacity(raw.len());
    let mut unknown = Vec::new();
    let mut seen_unknown = HashSet::new();

    for entry in raw {
        let name = entry.trim();
        if name.is_empty() {
            continue;
        }
        if !taxonomy.contains(name) {
            if seen_unknown.insert(name.to_string()) {
                unknown.push(name.to_string());
            }
            if policy == UnknownToolPolicy::Drop {
                continue;
            }
        }
        tool_order.push(name.to_string());
    }

    if !unknown.is_empty() {
        tracing::warn!(
            unknown = ?unknown,
            policy = ?policy,
            "tool order contains names outside the taxonomy"
        );
    }

    let priority = PriorityMap::from_order(&tool_order);
    tracing::debug!(
        entries = tool_order.len(),
        unique = priority.len(),
        "reconciled tool order"
    );

    Reconciled {
        tool_order,
        priority,
        unknown,
    }
}

/// Order live toolbar buttons by priority.
///
/// Ranked names come first, lowest rank first; unranked names keep their
/// original relative order after them.
pub fn arrange<S: AsRef<str>>(available: &[S], priority: &PriorityMap) -> Vec<String> {
    let mut buttons: Vec<&str> = available.iter().map(AsRef::as_ref).collect();
    buttons.sort_by_key(|name| priority.rank(name).unwrap_or(usize::MAX));
    buttons.into_iter().map(str::to_string).collect()
}

// ─── Tests ──────────────────────────────────────────────────────────────────
