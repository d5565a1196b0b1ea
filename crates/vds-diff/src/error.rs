//! Error types for the diff crate.

use vds_dataset::DatasetError;

/// Errors that can occur during diff operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A component could not be encoded for comparison.
    #[error("encoding {component} for diff: {source}")]
    Encode {
        component: &'static str,
        #[source]
        source: DatasetError,
    },
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
