use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;
use crate::object::ObjectId;

/// Namespace used by the bundled stores.
pub const DEFAULT_NAMESPACE: &str = "vds";

/// Store key under which an encoded object lives.
///
/// Two shapes are valid:
///
/// - `/<namespace>/<hash>` names a single object
/// - `/<namespace>/<hash>/<file>` names `file` inside the directory object
///   `<hash>`
///
/// The hash segment is the lowercase hex of an [`ObjectId`]. Addresses
/// serialize as plain JSON strings; that string form is what a reference-only
/// sub-document encodes to.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    /// Parse and validate an address string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let invalid = |reason| TypeError::InvalidAddress {
            address: s.to_string(),
            reason,
        };
        let rest = s.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;
        if s.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }
        let segments: Vec<&str> = rest.split('/').collect();
        if segments.len() < 2 || segments.len() > 3 {
            return Err(invalid("expected /<namespace>/<hash>[/<file>]"));
        }
        if segments.iter().any(|seg| seg.is_empty()) {
            return Err(invalid("empty path segment"));
        }
        ObjectId::from_hex(segments[1]).map_err(|_| invalid("hash segment is not a 32-byte hex digest"))?;
        Ok(Self(s.to_string()))
    }

    /// Address of a single object in the given namespace.
    pub fn for_object(namespace: &str, id: &ObjectId) -> Self {
        Self(format!("/{namespace}/{}", id.to_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split('/')
    }

    pub fn namespace(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// The object this address points at: the object itself, or the
    /// wrapping directory when a file segment is present.
    pub fn object_id(&self) -> ObjectId {
        self.segments()
            .nth(1)
            .and_then(|h| ObjectId::from_hex(h).ok())
            .unwrap_or_else(|| ObjectId::from_hash([0; 32]))
    }

    /// The file segment, if this address names an entry in a directory.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().nth(2)
    }

    /// Address of `name` inside the directory this address points at.
    ///
    /// Joining onto an address that already has a file segment replaces it.
    pub fn join(&self, name: &str) -> Self {
        Self(format!("/{}/{}/{name}", self.namespace(), self.object_id().to_hex()))
    }

    /// The address with any file segment removed.
    pub fn root(&self) -> Self {
        Self::for_object(self.namespace(), &self.object_id())
    }

    /// Short form for logs: namespace plus the first 8 hash characters.
    pub fn short(&self) -> String {
        match self.file_name() {
            Some(file) => format!("/{}/{}../{file}", self.namespace(), self.object_id().short_hex()),
            None => format!("/{}/{}..", self.namespace(), self.object_id().short_hex()),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
