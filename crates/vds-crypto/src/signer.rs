use std::fmt;

/// Ed25519 signing key (private). Required to create a dataset version.
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Ed25519 verifying key (public).
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Ed25519 signature over a commit's signable bytes.
///
/// Stored on a commit as lowercase hex (see [`Signature::to_hex`]).
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    /// Parse a 64-character hex secret, as written by `vds keygen`.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        Ok(Self::from_bytes(decode_32(s.trim())?))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        use ed25519_dalek::Signer;
        Signature(self.0.sign(message))
    }
}

impl VerifyingKey {
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), SignatureError> {
        use ed25519_dalek::Verifier;
        self.0
            .verify(message, &signature.0)
            .map_err(|_| SignatureError::InvalidSignature)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignatureError> {
        let key = ed25519_dalek::VerifyingKey::from_bytes(&bytes)
            .map_err(|_| SignatureError::InvalidKey)?;
        Ok(Self(key))
    }

    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        Self::from_bytes(decode_32(s.trim())?)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }
}

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(s).map_err(|_| SignatureError::Malformed)?;
        let arr: [u8; 64] = bytes.try_into().map_err(|_| SignatureError::Malformed)?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&arr)))
    }
}

fn decode_32(s: &str) -> Result<[u8; 32], SignatureError> {
    let bytes = hex::decode(s).map_err(|_| SignatureError::InvalidKey)?;
    bytes.try_into().map_err(|_| SignatureError::InvalidKey)
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyingKey({})", self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", hex::encode(&self.0.to_bytes()[..8]))
    }
}

/// Errors from signing operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid key")]
    InvalidKey,
    #[error("malformed signature encoding")]
    Malformed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let sk = SigningKey::generate();
        let sig = sk.sign(b"commit bytes");
        assert!(sk.verifying_key().verify(b"commit bytes", &sig).is_ok());
        assert_eq!(
            sk.verifying_key().verify(b"other bytes", &sig),
            Err(SignatureError::InvalidSignature)
        );
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let sig = SigningKey::generate().sign(b"message");
        assert!(SigningKey::generate().verifying_key().verify(b"message", &sig).is_err());
    }

    #[test]
    fn key_hex_roundtrip() {
        let sk = SigningKey::generate();
        let restored = SigningKey::from_hex(&sk.to_hex()).unwrap();
        assert_eq!(sk.verifying_key(), restored.verifying_key());
        let vk = VerifyingKey::from_hex(&sk.verifying_key().to_hex()).unwrap();
        assert_eq!(vk, sk.verifying_key());
    }

    #[test]
    fn signature_hex_roundtrip() {
        let sig = SigningKey::from_bytes([7; 32]).sign(b"x");
        assert_eq!(sig.to_hex().len(), 128);
        assert_eq!(Signature::from_hex(&sig.to_hex()).unwrap(), sig);
        assert_eq!(Signature::from_hex("abcd"), Err(SignatureError::Malformed));
    }

    #[test]
    fn signing_is_deterministic_for_fixed_key() {
        let sk = SigningKey::from_bytes([1; 32]);
        assert_eq!(sk.sign(b"same"), sk.sign(b"same"));
    }

    #[test]
    fn debug_redacts_signing_key() {
        let debug = format!("{:?}", SigningKey::generate());
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn bad_key_hex_is_rejected() {
        assert_eq!(SigningKey::from_hex("zz").unwrap_err(), SignatureError::InvalidKey);
    }
}
