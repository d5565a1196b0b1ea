use std::fmt::Display;

use vds_store::StoreError;
use vds_types::Address;

/// Errors from loading, dereferencing and saving datasets.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// The caller supplied an unusable combination of inputs.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A read or write against the content store failed.
    #[error("store I/O while {context}: {source}")]
    StoreIo {
        context: String,
        #[source]
        source: StoreError,
    },

    /// Every read attempt came back empty.
    #[error("store returned no bytes for {0}")]
    EmptyRead(Address),

    #[error("serialization error in {context}: {message}")]
    Serialization { context: String, message: String },

    /// The body has entries that fail its schema.
    #[error("{count} entries failed schema validation")]
    Validation { count: usize },

    #[error("checksum error: {0}")]
    Checksum(String),

    #[error("signing error: {0}")]
    Signing(String),

    /// A document was written before something it points at had an address.
    #[error("dependency order error: {0}")]
    DependencyOrder(String),

    /// The new version is identical to the previous one.
    #[error("no changes detected")]
    NoChanges,

    #[error("operation cancelled")]
    Cancelled,
}

impl FsError {
    pub(crate) fn store(context: impl Into<String>) -> impl FnOnce(StoreError) -> Self {
        let context = context.into();
        move |source| Self::StoreIo { context, source }
    }

    pub(crate) fn serialization<E: Display>(context: impl Into<String>) -> impl FnOnce(E) -> Self {
        let context = context.into();
        move |err| Self::Serialization {
            context,
            message: err.to_string(),
        }
    }
}

/// Result alias for dataset filesystem operations.
pub type FsResult<T> = Result<T, FsError>;
