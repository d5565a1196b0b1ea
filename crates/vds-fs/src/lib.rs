//! Save and load pipeline for versioned datasets.
//!
//! Saving streams the body once through three concurrent analyzers
//! (checksum, validation, shape), describes the change against the
//! previous version, signs the commit, then writes the package: scripts
//! before the components that point at them, every component before the
//! top-level `dataset.json`. Loading reads that document back and
//! dereferences each component.
//!
//! # Key Types
//!
//! - [`Saver`] -- Configured create path; see also [`create_dataset`]
//! - [`SaveConfig`] / [`LoadConfig`] -- Pipeline knobs, TOML friendly
//! - [`Cancellation`] -- Stops analysis and writes in flight
//! - [`LogEntry`] -- One version of a dataset's history
//! - [`FsError`] -- Every failure the pipeline reports

pub mod analyze;
pub mod cancel;
pub mod clock;
pub mod commit_msg;
pub mod config;
pub mod deref;
pub mod error;
pub mod load;
pub mod log;
pub mod package;
pub mod save;
pub mod write;

pub use analyze::{analyze_body, body_checksum, value_depth, BodyStats};
pub use cancel::Cancellation;
pub use clock::{Clock, FixedClock, SystemClock};
pub use commit_msg::clean_title_and_message;
pub use config::{LoadConfig, SaveConfig};
pub use deref::{
    deref_commit, deref_component, deref_dataset, deref_meta, deref_structure, deref_transform,
    deref_viz, load_component,
};
pub use error::{FsError, FsResult};
pub use load::{load_body, load_dataset, load_dataset_refs, load_rows, load_scripts};
pub use log::{log, LogEntry};
pub use package::{body_file_name, package_keypath, DATASET_FILE};
pub use save::{body_from_bytes, create_dataset, validate_dataset, BodyReader, Prepared, Saver};
pub use write::write_dataset;
