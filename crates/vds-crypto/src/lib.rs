//! Cryptographic primitives for versioned datasets.
//!
//! Provides domain-separated BLAKE3 hashing for object addresses and body
//! checksums, and Ed25519 signing/verification for commits.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod hasher;
pub mod signer;

pub use hasher::ContentHasher;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
