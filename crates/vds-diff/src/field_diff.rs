//! Field-level diff: compare the object forms of two components.
//!
//! Object forms are `serde_json` maps keyed by wire field name. Only
//! top-level keys are compared; a change anywhere inside a nested value
//! counts as one modification of its key.

use serde_json::{Map, Value};

/// The result of comparing two object forms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldDiff {
    /// Changes in key order.
    pub changes: Vec<FieldChange>,
}

impl FieldDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn additions(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FieldChange::Added { .. }))
            .count()
    }

    pub fn removals(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FieldChange::Removed { .. }))
            .count()
    }

    pub fn modifications(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, FieldChange::Modified { .. }))
            .count()
    }
}

/// A single changed field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldChange {
    Added { key: String, value: Value },
    Removed { key: String, value: Value },
    Modified { key: String, old: Value, new: Value },
}

impl FieldChange {
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Removed { key, .. } | Self::Modified { key, .. } => key,
        }
    }

    /// Past-tense verb for summaries.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Added { .. } => "added",
            Self::Removed { .. } => "removed",
            Self::Modified { .. } => "modified",
        }
    }
}

/// Compare two object forms, skipping any key in `ignore`.
///
/// The result is ordered by key, so equal inputs always summarize the same
/// way.
pub fn diff_fields(old: &Map<String, Value>, new: &Map<String, Value>, ignore: &[&str]) -> FieldDiff {
    let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
    keys.sort_unstable();
    keys.dedup();

    let changes = keys
        .into_iter()
        .filter(|key| !ignore.contains(&key.as_str()))
        .filter_map(|key| match (old.get(key), new.get(key)) {
            (Some(a), Some(b)) if a != b => Some(FieldChange::Modified {
                key: key.clone(),
                old: a.clone(),
                new: b.clone(),
            }),
            (Some(a), None) => Some(FieldChange::Removed {
                key: key.clone(),
                value: a.clone(),
            }),
            (None, Some(b)) => Some(FieldChange::Added {
                key: key.clone(),
                value: b.clone(),
            }),
            _ => None,
        })
        .collect();

    FieldDiff { changes }
}
