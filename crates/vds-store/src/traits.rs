use async_trait::async_trait;
use bytes::Bytes;
use vds_types::{Address, ObjectId};

use crate::error::StoreResult;
use crate::object::StoredObject;

/// Synchronous hash-keyed object backend.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written. The same object always produces
///   the same ID.
/// - Writes are idempotent.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync + 'static {
    /// Read an object by its ID. Returns `Ok(None)` if it does not exist.
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content-addressed ID.
    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Ask the backend to retain this object beyond any eviction policy.
    fn pin(&self, id: &ObjectId) -> StoreResult<()>;

    fn is_pinned(&self, id: &ObjectId) -> StoreResult<bool>;
}

/// Options for a write batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    /// Pin every object the batch writes.
    pub pin: bool,
    /// On close, write a directory object listing every added file.
    pub wrap_directory: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            pin: true,
            wrap_directory: true,
        }
    }
}

/// Completion event for one file added to a [`Batch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Added {
    /// The name the file was added under.
    pub name: String,
    /// Where the file's bytes now live.
    pub address: Address,
}

/// Content store consumed by the dataset engines.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read the bytes stored at `address`.
    ///
    /// `/<ns>/<dir>/<file>` addresses resolve through the directory listing.
    async fn get(&self, address: &Address) -> StoreResult<Bytes>;

    /// Open a new write batch.
    async fn new_batch(&self, options: BatchOptions) -> StoreResult<Box<dyn Batch>>;
}

/// A group of object writes that complete asynchronously.
///
/// Files are added by name; each addition eventually yields exactly one
/// completion event, in arbitrary order relative to other additions. A
/// failed write yields an `Err` event. After [`Batch::close`] no further
/// events arrive.
#[async_trait]
pub trait Batch: Send {
    /// Queue `data` to be stored under the logical name `name`.
    async fn add_file(&mut self, name: &str, data: Bytes) -> StoreResult<()>;

    /// Wait for the next completion. Returns `None` only when no addition is
    /// outstanding.
    async fn next_completion(&mut self) -> Option<StoreResult<Added>>;

    /// Wait for outstanding writes, write the wrapping directory if
    /// requested, and surface the first error seen by any write.
    ///
    /// Returns the directory address when the batch wraps its files.
    async fn close(self: Box<Self>) -> StoreResult<Option<Address>>;
}
