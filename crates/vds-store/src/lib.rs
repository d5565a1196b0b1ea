//! Content-addressed object storage for versioned datasets.
//!
//! Every encoded document, body and script is stored as an immutable object
//! identified by its BLAKE3 hash (domain-separated by object kind). Writes go
//! through a [`Batch`] that reports completions asynchronously and may wrap
//! everything it wrote in a directory object.
//!
//! # Layers
//!
//! - [`ObjectStore`] -- synchronous hash-keyed backend (read/write/pin)
//!   - [`InMemoryObjectStore`] -- `HashMap`-based, for tests and embedding
//!   - [`FileObjectStore`] -- one file per object under a root directory
//! - [`ContentStore`] -- the async contract the dataset engines consume
//!   - [`CafsStore`] -- adapts any `ObjectStore` into a `ContentStore`
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Writes are idempotent: the same bytes always land at the same address.
//! 3. Completion events arrive in arbitrary order; callers match them by name.
//! 4. The store never interprets file contents; only directory listings are
//!    decoded, to resolve `/<ns>/<dir>/<file>` addresses.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod cafs;
pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

pub use cafs::{CafsBatch, CafsStore};
pub use error::{StoreError, StoreResult};
pub use fs::FileObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Directory, DirectoryEntry, ObjectKind, StoredObject};
pub use traits::{Added, Batch, BatchOptions, ContentStore, ObjectStore};

/// A `ContentStore` held entirely in memory.
pub type MemoryStore = CafsStore<InMemoryObjectStore>;

/// A `ContentStore` persisted under a directory on disk.
pub type DiskStore = CafsStore<FileObjectStore>;
