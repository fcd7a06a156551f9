//! The encrypted on-disk format
//!
//! A database file is a cleartext preamble (tag, key-stretch salt and
//! iteration count, verify hash, wrapped session keys, IV) followed by a
//! Twofish-CBC encrypted stream of type-tagged field frames, an eof
//! marker and an HMAC-SHA256 over the cleartext field data.
//!
//! [`from_reader`] dispatches on the leading tag so further format
//! versions can be routed to their own codecs; v3 is the only version
//! written today.

mod fields;
mod read;
mod write;

pub use fields::{HeaderField, RecordField};
pub use read::{from_reader, open};

pub(crate) use fields::END;
pub(crate) use write::write_v3;
