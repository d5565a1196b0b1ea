//! Reading and validating dataset bodies.
//!
//! A body is read as a sequence of [`Entry`] values through an
//! [`EntryReader`]; [`new_entry_reader`] picks the reader for a
//! [`vds_dataset::Structure`]'s format. [`Validator`] counts entries that
//! fail the structure's schema.

pub mod entry;
pub mod error;
pub mod validate;

pub use entry::{entries, new_entry_reader, CsvEntryReader, Entry, EntryReader, JsonEntryReader};
pub use error::{IoError, IoResult};
pub use validate::{count_invalid_entries, Validator, Violation};
