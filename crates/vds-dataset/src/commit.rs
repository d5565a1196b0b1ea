use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use vds_crypto::{Signature, SigningKey, VerifyingKey};
use vds_types::Address;

use crate::component::{check_kind, component_serde, shadow, CanonicalObject, Component};
use crate::error::{DatasetError, DatasetResult};

/// Longest title a normalized commit carries.
pub const MAX_TITLE_LEN: usize = 70;

/// Domain tag that opens every signable byte string.
pub const SIGNABLE_DOMAIN: &[u8] = b"vds-commit-v1";

/// Authorship record for one dataset version.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Commit {
    pub(crate) path: Option<Address>,
    /// One line, at most [`MAX_TITLE_LEN`] characters once normalized.
    pub title: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Hex Ed25519 signature over [`Commit::signable_bytes`].
    pub signature: String,
}

/// RFC 3339 in UTC with nanosecond precision, e.g.
/// `2024-01-02T03:04:05.000000006Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl Commit {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Bytes covered by the commit signature.
    ///
    /// Layout: [`SIGNABLE_DOMAIN`], then timestamp, title and message, each
    /// as a big-endian `u64` byte length followed by its UTF-8 bytes. The
    /// timestamp is [`format_timestamp`] output, or empty when unset.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let ts = self.timestamp.as_ref().map(format_timestamp).unwrap_or_default();
        let fields = [ts.as_bytes(), self.title.as_bytes(), self.message.as_bytes()];
        let mut out = Vec::with_capacity(
            SIGNABLE_DOMAIN.len() + fields.iter().map(|f| 8 + f.len()).sum::<usize>(),
        );
        out.extend_from_slice(SIGNABLE_DOMAIN);
        for field in fields {
            out.extend_from_slice(&(field.len() as u64).to_be_bytes());
            out.extend_from_slice(field);
        }
        out
    }

    pub fn sign(&mut self, key: &SigningKey) {
        self.signature = key.sign(&self.signable_bytes()).to_hex();
    }

    pub fn verify(&self, key: &VerifyingKey) -> DatasetResult<()> {
        if self.signature.is_empty() {
            return Err(DatasetError::Unsigned);
        }
        let signature = Signature::from_hex(&self.signature)?;
        key.verify(&self.signable_bytes(), &signature)?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct CommitObject {
    kind: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    signature: String,
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    title: String,
}

impl Component for Commit {
    const NAME: &'static str = "commit";
    const KIND: &'static str = "commit:0";
    const FIELDS: &'static [&'static str] = &["kind", "message", "signature", "timestamp", "title"];

    fn path(&self) -> Option<&Address> {
        self.path.as_ref()
    }

    fn set_path(&mut self, path: Option<Address>) {
        self.path = path;
    }

    fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.message.is_empty()
            && self.timestamp.is_none()
            && self.signature.is_empty()
    }

    fn assign(&mut self, other: &Self) {
        if other.path.is_some() {
            self.path = other.path.clone();
        }
        if !other.title.is_empty() {
            self.title = other.title.clone();
        }
        if !other.message.is_empty() {
            self.message = other.message.clone();
        }
        if other.timestamp.is_some() {
            self.timestamp = other.timestamp;
        }
        if !other.signature.is_empty() {
            self.signature = other.signature.clone();
        }
    }

    fn to_object(&self) -> DatasetResult<CanonicalObject> {
        let mut obj = CanonicalObject::new::<Self>();
        obj.put("message", &self.message)?;
        obj.put("signature", &self.signature)?;
        obj.put("timestamp", &self.timestamp.as_ref().map(format_timestamp))?;
        obj.put("title", &self.title)?;
        Ok(obj)
    }

    fn from_object(object: Map<String, Value>) -> DatasetResult<Self> {
        let o: CommitObject = shadow::<Self, _>(object)?;
        check_kind::<Self>(o.kind.as_deref())?;
        Ok(Self {
            path: None,
            title: o.title,
            message: o.message,
            timestamp: o.timestamp,
            signature: o.signature,
        })
    }
}

component_serde!(Commit);

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::nanoseconds(6)
    }

    #[test]
    fn signable_bytes_layout_is_pinned() {
        let commit = Commit {
            timestamp: Some(fixed_time()),
            ..Commit::new("t", "")
        };
        let mut expected = b"vds-commit-v1".to_vec();
        expected.extend_from_slice(&30u64.to_be_bytes());
        expected.extend_from_slice(b"2024-01-02T03:04:05.000000006Z");
        expected.extend_from_slice(&1u64.to_be_bytes());
        expected.extend_from_slice(b"t");
        expected.extend_from_slice(&0u64.to_be_bytes());
        assert_eq!(commit.signable_bytes(), expected);
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        let a = Commit::new("ab", "c");
        let b = Commit::new("a", "bc");
        assert_ne!(a.signable_bytes(), b.signable_bytes());
    }

    #[test]
    fn sign_then_verify() {
        let key = SigningKey::generate();
        let mut commit = Commit {
            timestamp: Some(fixed_time()),
            ..Commit::new("initial", "details")
        };
        commit.sign(&key);
        commit.verify(&key.verifying_key()).unwrap();

        commit.message.push('!');
        assert!(matches!(
            commit.verify(&key.verifying_key()),
            Err(DatasetError::Signature(_))
        ));
    }

    #[test]
    fn unsigned_commit_fails_verification() {
        let key = SigningKey::generate();
        assert!(matches!(
            Commit::new("x", "").verify(&key.verifying_key()),
            Err(DatasetError::Unsigned)
        ));
    }

    #[test]
    fn timestamp_roundtrips_with_nanoseconds() {
        let commit = Commit {
            timestamp: Some(fixed_time()),
            signature: "00ff".into(),
            ..Commit::new("title", "message")
        };
        let decoded = Commit::from_json(&commit.to_canonical_json().unwrap()).unwrap();
        assert_eq!(decoded, commit);
    }
}
