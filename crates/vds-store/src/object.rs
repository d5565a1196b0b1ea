use bytes::Bytes;
use serde::{Deserialize, Serialize};
use vds_crypto::ContentHasher;
use vds_types::{Address, ObjectId};

use crate::error::{StoreError, StoreResult};

/// The kind of object stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Opaque file bytes: an encoded document, a body, or a script.
    File,
    /// Listing of the files written by one wrapping batch.
    Directory,
}

impl ObjectKind {
    /// One-byte tag used by on-disk backends.
    pub fn tag(&self) -> u8 {
        match self {
            Self::File => b'f',
            Self::Directory => b'd',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'f' => Some(Self::File),
            b'd' => Some(Self::Directory),
            _ => None,
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// A stored object: kind tag + raw bytes.
///
/// `StoredObject` is the unit of storage. Its ID is derived from its kind
/// and bytes, never from the name it was added under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Bytes,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: impl Into<Bytes>) -> Self {
        Self {
            kind,
            data: data.into(),
        }
    }

    pub fn file(data: impl Into<Bytes>) -> Self {
        Self::new(ObjectKind::File, data)
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Compute the content-addressed ID for this object.
    pub fn compute_id(&self) -> ObjectId {
        let hasher = match self.kind {
            ObjectKind::File => &ContentHasher::FILE,
            ObjectKind::Directory => &ContentHasher::DIRECTORY,
        };
        hasher.hash(&self.data)
    }
}

/// A single named file inside a [`Directory`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub address: Address,
}

impl DirectoryEntry {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

/// Listing that wraps every file written by one batch.
///
/// Entries are sorted by name and unique, so the same set of files always
/// produces the same directory address.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub entries: Vec<DirectoryEntry>,
}

impl Directory {
    /// Build a directory; when a name repeats, the last entry wins.
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        let mut entries: Vec<DirectoryEntry> = entries.into_iter().rev().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries.dedup_by(|a, b| a.name == b.name);
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data = serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Directory, data))
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        if obj.kind != ObjectKind::Directory {
            return Err(StoreError::CorruptObject {
                id: obj.compute_id(),
                reason: format!("expected directory, got {}", obj.kind),
            });
        }
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vds_types::DEFAULT_NAMESPACE;

    fn addr(seed: &[u8]) -> Address {
        Address::for_object(DEFAULT_NAMESPACE, &ObjectId::from_bytes(seed))
    }

    #[test]
    fn directory_sorts_and_dedups() {
        let dir = Directory::new(vec![
            DirectoryEntry::new("structure.json", addr(b"s")),
            DirectoryEntry::new("dataset.json", addr(b"d1")),
            DirectoryEntry::new("dataset.json", addr(b"d2")),
        ]);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.entries[0].name, "dataset.json");
        assert_eq!(dir.get("dataset.json").unwrap().address, addr(b"d2"));
        assert!(dir.get("meta.json").is_none());
    }

    #[test]
    fn directory_roundtrip() {
        let dir = Directory::new(vec![DirectoryEntry::new("body.csv", addr(b"body"))]);
        let stored = dir.to_stored_object().unwrap();
        assert_eq!(Directory::from_stored_object(&stored).unwrap(), dir);
    }

    #[test]
    fn file_is_not_a_directory() {
        let err = Directory::from_stored_object(&StoredObject::file(&b"[]"[..])).unwrap_err();
        assert!(matches!(err, StoreError::CorruptObject { .. }));
    }

    #[test]
    fn kinds_produce_different_ids() {
        let file = StoredObject::new(ObjectKind::File, &b"{}"[..]);
        let dir = StoredObject::new(ObjectKind::Directory, &b"{}"[..]);
        assert_ne!(file.compute_id(), dir.compute_id());
    }

    #[test]
    fn kind_tags_roundtrip() {
        for kind in [ObjectKind::File, ObjectKind::Directory] {
            assert_eq!(ObjectKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ObjectKind::from_tag(b'x'), None);
    }
}
