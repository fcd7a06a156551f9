#![deny(missing_docs)]

//! Module to read and write Password Safe v3 database files.
//!
//! Databases can be read with the [`pwsafe_rs::open`] function, which
//! verifies the passphrase against the stored verify hash and checks the
//! record stream against its HMAC before returning a [`Database`]. The
//! passphrase is requested through a callback so interactive hosts can
//! defer prompting until the file has been recognized.
//!
//! ```
//! # fn main() -> Result<(), pwsafe_rs::Error> {
//! use pwsafe_rs::{Database, Record};
//!
//! let mut database = Database::default();
//! let mut record = Record::new();
//! record.set_title("example.org");
//! record.set_username("admin");
//! record.set_password("hunter2");
//! database.add_record(record);
//!
//! let mut buf = Vec::new();
//! database.write(&mut buf, "master passphrase")?;
//!
//! let reloaded = pwsafe_rs::from_reader(buf.as_slice(), || Ok("master passphrase".into()))?;
//! assert_eq!(reloaded.records().len(), 1);
//! assert_eq!(reloaded.records()[0].title(), "example.org");
//! # Ok(())
//! # }
//! ```
//!
//! Alternatively, [`pwsafe_rs::from_reader`] can be used to read a database
//! from a non file source (such as in-memory or a network stream).
//!
//! [`pwsafe_rs::from_reader`]: ./fn.from_reader.html
//! [`pwsafe_rs::open`]: ./fn.open.html

pub mod binary;
mod crypto;
mod database;
pub mod errors;
mod utils;

pub use binary::{from_reader, open, HeaderField, RecordField};
pub use database::{Database, Header, Record};
pub use errors::{Error, PassphraseError};
