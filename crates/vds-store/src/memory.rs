use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use vds_types::ObjectId;

use crate::error::StoreResult;
use crate::object::StoredObject;
use crate::traits::ObjectStore;

#[derive(Default)]
struct Inner {
    objects: HashMap<ObjectId, StoredObject>,
    pins: HashSet<ObjectId>,
}

/// Object backend held in a `HashMap`, for tests and embedding.
///
/// Objects and pins sit behind one lock, so a reader never sees a pin for
/// an object that is not there yet.
#[derive(Default)]
pub struct InMemoryObjectStore {
    inner: RwLock<Inner>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().expect("lock poisoned")
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().expect("lock poisoned")
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.state().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().objects.is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.state().objects.values().map(StoredObject::size).sum()
    }

    pub fn pinned_count(&self) -> usize {
        self.state().pins.len()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.state().objects.get(id).cloned())
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        self.state_mut()
            .objects
            .entry(id)
            .or_insert_with(|| object.clone());
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.state().objects.contains_key(id))
    }

    fn pin(&self, id: &ObjectId) -> StoreResult<()> {
        self.state_mut().pins.insert(*id);
        Ok(())
    }

    fn is_pinned(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.state().pins.contains(id))
    }
}

impl fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("InMemoryObjectStore")
            .field("objects", &state.objects.len())
            .field("pins", &state.pins.len())
            .finish()
    }
}
