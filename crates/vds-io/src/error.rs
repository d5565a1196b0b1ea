use thiserror::Error;

/// Errors from reading or validating a body.
#[derive(Debug, Error)]
pub enum IoError {
    /// No reader exists for this format.
    #[error("unsupported body format: {0}")]
    UnsupportedFormat(String),

    #[error("structure has no format")]
    MissingFormat,

    #[error("csv entry {index}: {source}")]
    Csv {
        index: usize,
        #[source]
        source: csv::Error,
    },

    #[error("json body: {0}")]
    Json(#[from] serde_json::Error),

    /// The body parsed but its top level cannot hold entries.
    #[error("json body must be an array or an object, found {0}")]
    NotAContainer(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for body I/O.
pub type IoResult<T> = Result<T, IoError>;
