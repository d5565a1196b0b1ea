use thiserror::Error;
use vds_crypto::SignatureError;

/// Errors from encoding, decoding, and checking dataset components.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A string where a reference was expected is not a valid address.
    #[error("invalid {component} reference {reference:?}: {reason}")]
    InvalidReference {
        component: &'static str,
        reference: String,
        reason: String,
    },

    /// The encoded value is neither a reference string nor an object.
    #[error("{component} must be a reference string or an object, found {found}")]
    UnexpectedValue {
        component: &'static str,
        found: &'static str,
    },

    /// The object carries another component's kind tag.
    #[error("{component} has kind {found:?}, expected {expected:?}")]
    KindMismatch {
        component: &'static str,
        expected: &'static str,
        found: String,
    },

    /// A free-form key names one of the component's own fields.
    #[error("{component} extra key {key:?} is reserved")]
    ReservedKey { component: &'static str, key: String },

    #[error("unknown data format {0:?}")]
    UnknownFormat(String),

    #[error("invalid format config for {format}: {reason}")]
    InvalidFormatConfig { format: String, reason: String },

    /// JSON (de)serialization of a component failed.
    #[error("{component}: {source}")]
    Json {
        component: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Signature verification failed.
    #[error("commit signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("commit is not signed")]
    Unsigned,
}

impl DatasetError {
    pub(crate) fn json(component: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::Json { component, source }
    }
}

/// Result alias for dataset model operations.
pub type DatasetResult<T> = Result<T, DatasetError>;
