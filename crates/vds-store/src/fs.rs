use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::debug;
use vds_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ObjectStore;

/// Object store persisted as one file per object.
///
/// Layout under `root`:
///
/// ```text
/// objects/<hex id>   kind tag byte followed by the object bytes
/// pins/<hex id>      empty marker file
/// ```
///
/// Objects are written to a temporary file and renamed into place, so a
/// reader never observes a partially written object.
#[derive(Debug, Clone)]
pub struct FileObjectStore {
    root: PathBuf,
}

impl FileObjectStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("objects"))?;
        fs::create_dir_all(root.join("pins"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join("objects").join(id.to_hex())
    }

    fn pin_path(&self, id: &ObjectId) -> PathBuf {
        self.root.join("pins").join(id.to_hex())
    }
}

impl ObjectStore for FileObjectStore {
    fn read(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        let raw = match fs::read(self.object_path(id)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (&tag, data) = raw.split_first().ok_or_else(|| StoreError::CorruptObject {
            id: *id,
            reason: "empty object file".into(),
        })?;
        let kind = ObjectKind::from_tag(tag).ok_or_else(|| StoreError::CorruptObject {
            id: *id,
            reason: format!("unknown kind tag {tag:#04x}"),
        })?;
        let obj = StoredObject::new(kind, Bytes::copy_from_slice(data));
        if obj.compute_id() != *id {
            return Err(StoreError::CorruptObject {
                id: *id,
                reason: "content does not match its hash".into(),
            });
        }
        Ok(Some(obj))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let mut tmp = tempfile::NamedTempFile::new_in(self.root.join("objects"))?;
        tmp.write_all(&[object.kind.tag()])?;
        tmp.write_all(&object.data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        debug!(id = %id.short_hex(), size = object.size(), "object written");
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.object_path(id).exists())
    }

    fn pin(&self, id: &ObjectId) -> StoreResult<()> {
        fs::write(self.pin_path(id), b"")?;
        Ok(())
    }

    fn is_pinned(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.pin_path(id).exists())
    }
}
