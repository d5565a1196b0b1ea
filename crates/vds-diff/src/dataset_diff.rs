//! Dataset-level diff: compare two versions component by component.

use std::fmt;

use bytes::Bytes;
use serde_json::{Map, Value};
use vds_dataset::{Component, Dataset, KIND_KEY};

use crate::error::{DiffError, DiffResult};
use crate::field_diff::{diff_fields, FieldDiff};
use crate::script_diff::{diff_scripts, ScriptDiff};

/// Keys never reported as field changes. Script addresses are compared by
/// content through [`ScriptDiff`] instead.
const IGNORED_KEYS: &[&str] = &[KIND_KEY, "scriptPath"];

/// Changes to one component slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDiff {
    /// Display label, e.g. `Structure`.
    pub label: &'static str,
    pub fields: FieldDiff,
    /// Present when the component carries a script on either side.
    pub script: Option<ScriptDiff>,
}

impl ComponentDiff {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.script.as_ref().map_or(true, ScriptDiff::is_empty)
    }

    /// Changed fields, plus one for a changed script.
    pub fn change_count(&self) -> usize {
        let script = self.script.as_ref().is_some_and(|s| !s.is_empty());
        self.fields.len() + usize::from(script)
    }

    fn write_summary(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.change_count();
        write!(f, "{}: {} change{}", self.label, n, if n == 1 { "" } else { "s" })?;
        for change in &self.fields.changes {
            write!(f, "\n\t- {} {}", change.verb(), change.key())?;
        }
        if let Some(script) = self.script.as_ref().filter(|s| !s.is_empty()) {
            write!(f, "\n\t- script {}", script.describe())?;
        }
        Ok(())
    }
}

/// Every component that differs between two versions, in the order
/// Structure, Meta, Transform, Viz.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatasetDiff {
    pub components: Vec<ComponentDiff>,
}

impl DatasetDiff {
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn component(&self, label: &str) -> Option<&ComponentDiff> {
        self.components.iter().find(|c| c.label == label)
    }

    /// Human-readable change list, one header line per component followed
    /// by one indented line per change. Empty when nothing changed.
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DatasetDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            component.write_summary(f)?;
        }
        Ok(())
    }
}

fn object_form<C: Component>(slot: Option<&C>) -> DiffResult<Map<String, Value>> {
    let Some(value) = slot else {
        return Ok(Map::new());
    };
    let object = value.to_object().map_err(|source| DiffError::Encode {
        component: C::NAME,
        source,
    })?;
    match object.into_value() {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn diff_component<C: Component>(
    label: &'static str,
    old: Option<&C>,
    new: Option<&C>,
    script: impl Fn(&C) -> Option<&Bytes>,
) -> DiffResult<Option<ComponentDiff>> {
    let fields = diff_fields(&object_form(old)?, &object_form(new)?, IGNORED_KEYS);
    let old_script = old.and_then(&script);
    let new_script = new.and_then(&script);
    let script = (old_script.is_some() || new_script.is_some())
        .then(|| diff_scripts(old_script.map(|b| &b[..]), new_script.map(|b| &b[..])));

    let diff = ComponentDiff {
        label,
        fields,
        script,
    };
    Ok((!diff.is_empty()).then_some(diff))
}

/// Compare the Structure, Meta, Transform and Viz of two versions.
///
/// Components are compared by object form, so reference-only slots must be
/// dereferenced first or they compare as empty. Scripts are compared by
/// their in-memory bytes; a side without loaded bytes compares as an empty
/// script. Commit and body address are not compared: the body is covered
/// by the structure checksum, and the commit is what the diff describes.
pub fn diff_datasets(old: &Dataset, new: &Dataset) -> DiffResult<DatasetDiff> {
    let components = [
        diff_component("Structure", old.structure.as_ref(), new.structure.as_ref(), |_| None)?,
        diff_component("Meta", old.meta.as_ref(), new.meta.as_ref(), |_| None)?,
        diff_component("Transform", old.transform.as_ref(), new.transform.as_ref(), |t| {
            t.script.as_ref()
        })?,
        diff_component("Viz", old.viz.as_ref(), new.viz.as_ref(), |v| v.script.as_ref())?,
    ]
    .into_iter()
    .flatten()
    .collect();
    Ok(DatasetDiff { components })
}
