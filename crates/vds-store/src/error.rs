use vds_types::{Address, ObjectId};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(Address),

    /// A directory address named a file the directory does not contain.
    #[error("{dir} has no entry named {name:?}")]
    NoSuchEntry { dir: Address, name: String },

    /// A file segment was used on an address that is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(Address),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The object data is malformed or cannot be decoded.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// A file added to a batch could not be written.
    #[error("writing {name:?} failed: {reason}")]
    WriteFailed { name: String, reason: String },

    /// A background write task panicked or was aborted.
    #[error("batch task failed: {0}")]
    TaskFailed(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
