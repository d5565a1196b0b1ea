use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, trace};
use vds_types::{Address, ObjectId, DEFAULT_NAMESPACE};

use crate::error::{StoreError, StoreResult};
use crate::object::{Directory, DirectoryEntry, ObjectKind, StoredObject};
use crate::traits::{Added, Batch, BatchOptions, ContentStore, ObjectStore};

/// Content-addressed file store over any [`ObjectStore`] backend.
///
/// Backend calls run on the blocking pool so disk-backed stores never stall
/// the runtime.
#[derive(Debug)]
pub struct CafsStore<B> {
    backend: Arc<B>,
    namespace: String,
}

impl<B> Clone for CafsStore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            namespace: self.namespace.clone(),
        }
    }
}

impl<B: ObjectStore> CafsStore<B> {
    pub fn new(backend: B) -> Self {
        Self::with_namespace(backend, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(backend: B, namespace: impl Into<String>) -> Self {
        Self {
            backend: Arc::new(backend),
            namespace: namespace.into(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl CafsStore<crate::memory::InMemoryObjectStore> {
    /// An empty in-memory store in the default namespace.
    pub fn in_memory() -> Self {
        Self::new(crate::memory::InMemoryObjectStore::new())
    }
}

impl CafsStore<crate::fs::FileObjectStore> {
    /// Open a disk-backed store rooted at `root`.
    pub fn open(root: impl Into<std::path::PathBuf>) -> StoreResult<Self> {
        Ok(Self::new(crate::fs::FileObjectStore::open(root)?))
    }
}

fn read_required<B: ObjectStore>(backend: &B, address: &Address, id: &ObjectId) -> StoreResult<StoredObject> {
    backend
        .read(id)?
        .ok_or_else(|| StoreError::NotFound(address.clone()))
}

fn resolve<B: ObjectStore>(backend: &B, address: &Address) -> StoreResult<Bytes> {
    let object = read_required(backend, address, &address.object_id())?;
    let Some(name) = address.file_name() else {
        return Ok(object.data);
    };
    if object.kind != ObjectKind::Directory {
        return Err(StoreError::NotADirectory(address.root()));
    }
    let dir = Directory::from_stored_object(&object)?;
    let entry = dir.get(name).ok_or_else(|| StoreError::NoSuchEntry {
        dir: address.root(),
        name: name.to_string(),
    })?;
    let file = read_required(backend, &entry.address, &entry.address.object_id())?;
    Ok(file.data)
}

async fn blocking<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::TaskFailed(e.to_string()))?
}

#[async_trait]
impl<B: ObjectStore> ContentStore for CafsStore<B> {
    async fn get(&self, address: &Address) -> StoreResult<Bytes> {
        if address.namespace() != self.namespace {
            return Err(StoreError::NotFound(address.clone()));
        }
        let backend = Arc::clone(&self.backend);
        let address = address.clone();
        blocking(move || resolve(backend.as_ref(), &address)).await
    }

    async fn new_batch(&self, options: BatchOptions) -> StoreResult<Box<dyn Batch>> {
        Ok(Box::new(CafsBatch::new(
            Arc::clone(&self.backend),
            self.namespace.clone(),
            options,
        )))
    }
}

/// Write batch produced by [`CafsStore::new_batch`].
///
/// Each added file is written by its own blocking task; completions are
/// delivered through a channel in whatever order the writes finish.
pub struct CafsBatch<B> {
    backend: Arc<B>,
    namespace: String,
    options: BatchOptions,
    tasks: JoinSet<()>,
    tx: mpsc::UnboundedSender<StoreResult<Added>>,
    rx: mpsc::UnboundedReceiver<StoreResult<Added>>,
    outstanding: usize,
    entries: Vec<DirectoryEntry>,
    failed: Option<(String, String)>,
}

impl<B: ObjectStore> CafsBatch<B> {
    fn new(backend: Arc<B>, namespace: String, options: BatchOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            namespace,
            options,
            tasks: JoinSet::new(),
            tx,
            rx,
            outstanding: 0,
            entries: Vec::new(),
            failed: None,
        }
    }

    fn record(&mut self, event: &StoreResult<Added>) {
        self.outstanding -= 1;
        match event {
            Ok(added) => self
                .entries
                .push(DirectoryEntry::new(added.name.clone(), added.address.clone())),
            Err(StoreError::WriteFailed { name, reason }) => {
                self.failed.get_or_insert_with(|| (name.clone(), reason.clone()));
            }
            Err(e) => {
                self.failed.get_or_insert_with(|| (String::new(), e.to_string()));
            }
        }
    }
}

fn write_file<B: ObjectStore>(backend: &B, namespace: &str, pin: bool, data: Bytes) -> StoreResult<Address> {
    let id = backend.write(&StoredObject::file(data))?;
    if pin {
        backend.pin(&id)?;
    }
    Ok(Address::for_object(namespace, &id))
}

#[async_trait]
impl<B: ObjectStore> Batch for CafsBatch<B> {
    async fn add_file(&mut self, name: &str, data: Bytes) -> StoreResult<()> {
        let backend = Arc::clone(&self.backend);
        let namespace = self.namespace.clone();
        let pin = self.options.pin;
        let tx = self.tx.clone();
        let name = name.to_string();
        trace!(name = %name, size = data.len(), "queueing file");
        self.outstanding += 1;
        self.tasks.spawn_blocking(move || {
            let event = write_file(backend.as_ref(), &namespace, pin, data)
                .map(|address| Added {
                    name: name.clone(),
                    address,
                })
                .map_err(|e| StoreError::WriteFailed {
                    name,
                    reason: e.to_string(),
                });
            // The receiver lives as long as the batch.
            let _ = tx.send(event);
        });
        Ok(())
    }

    async fn next_completion(&mut self) -> Option<StoreResult<Added>> {
        if self.outstanding == 0 {
            return None;
        }
        loop {
            tokio::select! {
                biased;
                Some(event) = self.rx.recv() => {
                    self.record(&event);
                    return Some(event);
                }
                Some(joined) = self.tasks.join_next() => {
                    if let Err(e) = joined {
                        let event = Err(StoreError::TaskFailed(e.to_string()));
                        self.record(&event);
                        return Some(event);
                    }
                }
                else => return None,
            }
        }
    }

    async fn close(mut self: Box<Self>) -> StoreResult<Option<Address>> {
        while self.next_completion().await.is_some() {}
        while let Some(joined) = self.tasks.join_next().await {
            joined.map_err(|e| StoreError::TaskFailed(e.to_string()))?;
        }
        if let Some((name, reason)) = self.failed.take() {
            return Err(StoreError::WriteFailed { name, reason });
        }
        if !self.options.wrap_directory {
            return Ok(None);
        }

        let dir = Directory::new(std::mem::take(&mut self.entries));
        let object = dir.to_stored_object()?;
        let backend = Arc::clone(&self.backend);
        let pin = self.options.pin;
        let id = blocking(move || {
            let id = backend.write(&object)?;
            if pin {
                backend.pin(&id)?;
            }
            Ok(id)
        })
        .await?;
        let address = Address::for_object(&self.namespace, &id);
        debug!(dir = %address.short(), files = dir.len(), "batch closed");
        Ok(Some(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FileObjectStore;
    use crate::memory::InMemoryObjectStore;

    async fn write_all(store: &CafsStore<InMemoryObjectStore>, files: &[(&str, &str)]) -> (Vec<Added>, Address) {
        let mut batch = store.new_batch(BatchOptions::default()).await.unwrap();
        for (name, data) in files {
            batch.add_file(name, Bytes::from(data.to_string())).await.unwrap();
        }
        let mut added = Vec::new();
        while let Some(event) = batch.next_completion().await {
            added.push(event.unwrap());
        }
        let dir = batch.close().await.unwrap().unwrap();
        (added, dir)
    }

    #[tokio::test]
    async fn every_file_completes_once() {
        let store = CafsStore::in_memory();
        let (mut added, _) = write_all(&store, &[("meta.json", "{}"), ("body.csv", "a\n1\n")]).await;
        added.sort_by(|a, b| a.name.cmp(&b.name));
        let names: Vec<_> = added.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["body.csv", "meta.json"]);
    }

    #[tokio::test]
    async fn files_resolve_through_wrapping_directory() {
        let store = CafsStore::in_memory();
        let (added, dir) = write_all(&store, &[("meta.json", "{\"title\":\"t\"}")]).await;
        let via_dir = store.get(&dir.join("meta.json")).await.unwrap();
        let direct = store.get(&added[0].address).await.unwrap();
        assert_eq!(via_dir, direct);
        assert_eq!(&via_dir[..], b"{\"title\":\"t\"}");
    }

    #[tokio::test]
    async fn same_files_produce_same_directory() {
        let store = CafsStore::in_memory();
        let (_, first) = write_all(&store, &[("a", "1"), ("b", "2")]).await;
        let (_, second) = write_all(&store, &[("b", "2"), ("a", "1")]).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn close_drains_unconsumed_completions() {
        let store = CafsStore::in_memory();
        let mut batch = store.new_batch(BatchOptions::default()).await.unwrap();
        batch.add_file("x", Bytes::from_static(b"x")).await.unwrap();
        let dir = batch.close().await.unwrap().unwrap();
        assert_eq!(&store.get(&dir.join("x")).await.unwrap()[..], b"x");
    }

    #[tokio::test]
    async fn unwrapped_batch_returns_no_directory() {
        let store = CafsStore::in_memory();
        let options = BatchOptions {
            pin: false,
            wrap_directory: false,
        };
        let mut batch = store.new_batch(options).await.unwrap();
        batch.add_file("x", Bytes::from_static(b"x")).await.unwrap();
        let added = batch.next_completion().await.unwrap().unwrap();
        assert!(batch.close().await.unwrap().is_none());
        assert!(!store.backend().is_pinned(&added.address.object_id()).unwrap());
    }

    #[tokio::test]
    async fn pinned_batch_pins_files_and_directory() {
        let store = CafsStore::in_memory();
        let (added, dir) = write_all(&store, &[("a", "1")]).await;
        assert!(store.backend().is_pinned(&added[0].address.object_id()).unwrap());
        assert!(store.backend().is_pinned(&dir.object_id()).unwrap());
    }

    #[tokio::test]
    async fn empty_batch_has_no_completions() {
        let store = CafsStore::in_memory();
        let mut batch = store.new_batch(BatchOptions::default()).await.unwrap();
        assert!(batch.next_completion().await.is_none());
    }

    #[tokio::test]
    async fn lookup_errors() {
        let store = CafsStore::in_memory();
        let (added, dir) = write_all(&store, &[("a", "1")]).await;

        let missing = Address::for_object(DEFAULT_NAMESPACE, &ObjectId::from_bytes(b"missing"));
        assert!(matches!(store.get(&missing).await, Err(StoreError::NotFound(_))));

        let foreign = Address::for_object("other", &dir.object_id());
        assert!(matches!(store.get(&foreign).await, Err(StoreError::NotFound(_))));

        assert!(matches!(
            store.get(&dir.join("b")).await,
            Err(StoreError::NoSuchEntry { .. })
        ));
        assert!(matches!(
            store.get(&added[0].address.join("a")).await,
            Err(StoreError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn disk_store_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CafsStore::new(FileObjectStore::open(tmp.path()).unwrap());
        let mut batch = store.new_batch(BatchOptions::default()).await.unwrap();
        batch.add_file("body.json", Bytes::from_static(b"[1,2]")).await.unwrap();
        let dir = batch.close().await.unwrap().unwrap();

        let reopened = CafsStore::open(tmp.path()).unwrap();
        assert_eq!(&reopened.get(&dir.join("body.json")).await.unwrap()[..], b"[1,2]");
    }
}
