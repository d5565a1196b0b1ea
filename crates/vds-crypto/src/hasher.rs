use vds_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a file object and a directory listing with identical
/// bytes never share an address.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for file objects (encoded documents, bodies, scripts).
    pub const FILE: Self = Self {
        domain: "vds-file-v1",
    };
    /// Hasher for directory listings that wrap a batch of files.
    pub const DIRECTORY: Self = Self {
        domain: "vds-dir-v1",
    };
    /// Hasher for body checksums recorded in a structure.
    pub const CHECKSUM: Self = Self {
        domain: "vds-body-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = self.start();
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }

    /// Start an incremental hash for content that arrives in chunks.
    pub fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }

    /// Verify that data produces the expected object ID.
    pub fn verify(&self, data: &[u8], expected: &ObjectId) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"a,b\n1,2\n";
        assert_eq!(ContentHasher::FILE.hash(data), ContentHasher::FILE.hash(data));
    }

    #[test]
    fn domains_separate_identical_bytes() {
        let data = b"same content";
        let file = ContentHasher::FILE.hash(data);
        let dir = ContentHasher::DIRECTORY.hash(data);
        let sum = ContentHasher::CHECKSUM.hash(data);
        assert_ne!(file, dir);
        assert_ne!(file, sum);
        assert_ne!(dir, sum);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut h = ContentHasher::CHECKSUM.start();
        h.update(b"a,b\n");
        h.update(b"1,2\n");
        let incremental = ObjectId::from_hash(*h.finalize().as_bytes());
        assert_eq!(incremental, ContentHasher::CHECKSUM.hash(b"a,b\n1,2\n"));
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::FILE.hash(b"original");
        assert!(ContentHasher::FILE.verify(b"original", &id));
        assert!(!ContentHasher::FILE.verify(b"tampered", &id));
    }
}
