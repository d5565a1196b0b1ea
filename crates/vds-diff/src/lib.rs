//! Diff engine for dataset versions.
//!
//! Compares two versions component by component and renders the result
//! as the change list that becomes a commit message.
//!
//! # Key Types
//!
//! - [`DatasetDiff`] / [`ComponentDiff`] -- Per-component change sets with a text summary
//! - [`FieldDiff`] / [`FieldChange`] -- Top-level field changes of one object form
//! - [`ScriptDiff`] -- Line counts between two script versions

pub mod dataset_diff;
pub mod error;
pub mod field_diff;
pub mod script_diff;

pub use dataset_diff::{diff_datasets, ComponentDiff, DatasetDiff};
pub use error::{DiffError, DiffResult};
pub use field_diff::{diff_fields, FieldChange, FieldDiff};
pub use script_diff::{diff_scripts, ScriptDiff};
