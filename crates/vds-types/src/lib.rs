//! Identifier types shared by every versioned-dataset crate.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- BLAKE3 content hash of a stored object
//! - [`Address`] -- store key under which an encoded object can be fetched,
//!   either `/<namespace>/<hash>` or `/<namespace>/<hash>/<file>` for an
//!   entry inside a wrapping directory

pub mod address;
pub mod error;
pub mod object;

pub use address::{Address, DEFAULT_NAMESPACE};
pub use error::TypeError;
pub use object::ObjectId;
