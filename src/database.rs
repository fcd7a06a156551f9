//! Password safe data types
//!
//! A database is a [`Header`] of database-wide metadata fields and an
//! ordered sequence of [`Record`]s, each a map from an 8-bit field tag to
//! raw bytes. Well-known tags have typed accessors; unrecognized tags are
//! kept verbatim so they survive a load and save cycle.
//!
//! A database is obtained from [`crate::open`] or [`crate::from_reader`],
//! or built in memory:
//!
//! ```
//! use pwsafe_rs::{Database, Record};
//!
//! let mut database = Database::default();
//! let mut record = Record::new();
//! record.set_title("mail");
//! record.set_password("swordfish");
//! database.add_record(record);
//! ```

use crate::binary::{self, HeaderField, RecordField};
use crate::errors::Error;
use crate::utils;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Field storage shared by headers and records. The tag order is stable,
/// so a save emits fields deterministically.
pub(crate) type FieldMap = BTreeMap<u8, Vec<u8>>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// Database-wide metadata fields
pub struct Header {
    fields: FieldMap,
}

impl Header {
    pub(crate) fn from_fields(fields: FieldMap) -> Header {
        Header { fields }
    }

    /// Raw bytes of a header field, if present
    pub fn field(&self, id: impl Into<u8>) -> Option<&[u8]> {
        self.fields.get(&id.into()).map(Vec::as_slice)
    }

    /// Store a header field, replacing any previous value under the same
    /// tag. The frame terminator tag (`0xff`) is structural and is ignored.
    pub fn set_field(&mut self, id: impl Into<u8>, data: impl Into<Vec<u8>>) {
        let ty = id.into();
        if ty == binary::END {
            return;
        }
        self.fields.insert(ty, data.into());
    }

    /// Remove a header field, returning its previous bytes
    pub fn remove_field(&mut self, id: impl Into<u8>) -> Option<Vec<u8>> {
        self.fields.remove(&id.into())
    }

    /// Iterate all fields in tag order
    pub fn fields(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.fields.iter().map(|(ty, data)| (*ty, data.as_slice()))
    }

    /// Raw on-disk format version field
    pub fn version_field(&self) -> Option<&[u8]> {
        self.field(HeaderField::Version)
    }

    /// Time of the last save, or the zero timestamp (the Unix epoch) when
    /// the field is absent or malformed
    pub fn mtime(&self) -> DateTime<Utc> {
        utils::decode_time_field(self.field(HeaderField::SaveTimestamp).unwrap_or(&[]))
    }

    /// Stamp the save timestamp field. Saving does not do this
    /// implicitly; hosts that want it call this before writing.
    pub fn set_mtime(&mut self, time: DateTime<Utc>) {
        self.set_field(HeaderField::SaveTimestamp, utils::encode_time_field(time));
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// A single stored credential and its metadata
pub struct Record {
    fields: FieldMap,
}

impl Record {
    /// Create a record with a fresh random identifier
    pub fn new() -> Record {
        let mut record = Record::default();
        record.set_field(RecordField::Uuid, Uuid::new_v4().as_bytes().to_vec());
        record
    }

    pub(crate) fn from_fields(fields: FieldMap) -> Record {
        Record { fields }
    }

    /// Raw bytes of a record field, if present
    pub fn field(&self, id: impl Into<u8>) -> Option<&[u8]> {
        self.fields.get(&id.into()).map(Vec::as_slice)
    }

    /// Store a record field, replacing any previous value under the same
    /// tag. The frame terminator tag (`0xff`) is structural and is ignored.
    pub fn set_field(&mut self, id: impl Into<u8>, data: impl Into<Vec<u8>>) {
        let ty = id.into();
        if ty == binary::END {
            return;
        }
        self.fields.insert(ty, data.into());
    }

    /// Remove a record field, returning its previous bytes
    pub fn remove_field(&mut self, id: impl Into<u8>) -> Option<Vec<u8>> {
        self.fields.remove(&id.into())
    }

    /// Iterate all fields in tag order
    pub fn fields(&self) -> impl Iterator<Item = (u8, &[u8])> {
        self.fields.iter().map(|(ty, data)| (*ty, data.as_slice()))
    }

    fn text_field(&self, id: RecordField) -> String {
        self.field(id)
            .map(|data| String::from_utf8_lossy(data).into_owned())
            .unwrap_or_default()
    }

    fn time_field(&self, id: RecordField) -> DateTime<Utc> {
        utils::decode_time_field(self.field(id).unwrap_or(&[]))
    }

    /// Identifier of this record as lowercase hex, empty when unset
    pub fn uuid(&self) -> String {
        utils::to_hex_string(self.field(RecordField::Uuid).unwrap_or(&[]))
    }

    /// Title of this record
    pub fn title(&self) -> String {
        self.text_field(RecordField::Title)
    }

    /// Stored account name
    pub fn username(&self) -> String {
        self.text_field(RecordField::Username)
    }

    /// Stored password
    pub fn password(&self) -> String {
        self.text_field(RecordField::Password)
    }

    /// Free-form notes
    pub fn notes(&self) -> String {
        self.text_field(RecordField::Notes)
    }

    /// Group path this record is filed under
    pub fn group(&self) -> String {
        self.text_field(RecordField::Group)
    }

    /// Stored URL
    pub fn url(&self) -> String {
        self.text_field(RecordField::Url)
    }

    /// Time the record was created
    pub fn ctime(&self) -> DateTime<Utc> {
        self.time_field(RecordField::CreationTime)
    }

    /// Time the record was last accessed
    pub fn atime(&self) -> DateTime<Utc> {
        self.time_field(RecordField::LastAccessTime)
    }

    /// Time the record was last changed
    pub fn mtime(&self) -> DateTime<Utc> {
        self.time_field(RecordField::ModifiedTime)
    }

    /// Time the password was last changed
    pub fn password_mtime(&self) -> DateTime<Utc> {
        self.time_field(RecordField::PasswordModifiedTime)
    }

    /// Time the password expires
    pub fn expiry(&self) -> DateTime<Utc> {
        self.time_field(RecordField::ExpiryTime)
    }

    /// Set the title
    pub fn set_title(&mut self, title: &str) {
        self.set_field(RecordField::Title, title);
    }

    /// Set the stored account name
    pub fn set_username(&mut self, username: &str) {
        self.set_field(RecordField::Username, username);
    }

    /// Set the stored password
    pub fn set_password(&mut self, password: &str) {
        self.set_field(RecordField::Password, password);
    }

    /// Set the notes
    pub fn set_notes(&mut self, notes: &str) {
        self.set_field(RecordField::Notes, notes);
    }

    /// Set the group path
    pub fn set_group(&mut self, group: &str) {
        self.set_field(RecordField::Group, group);
    }

    /// Set the stored URL
    pub fn set_url(&mut self, url: &str) {
        self.set_field(RecordField::Url, url);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
/// An in-memory password safe database
///
/// Owned by a single caller; load it, mutate it through the accessors,
/// then write it back out. Record order is preserved from the file and
/// on output.
pub struct Database {
    header: Header,
    records: Vec<Record>,
}

impl Database {
    pub(crate) fn from_parts(header: Header, records: Vec<Record>) -> Database {
        Database { header, records }
    }

    /// On-disk format version written by this library
    pub fn version(&self) -> &'static str {
        "v3"
    }

    /// Database-wide metadata
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Mutable database-wide metadata
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Stored records in file order, as a read-only view
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Mutable access to the stored records
    pub fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    /// Append a record at the end of the file order
    pub fn add_record(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Serialize and encrypt this database to the given output stream
    ///
    /// Salt, session keys, IV and frame padding are drawn from the OS
    /// secure RNG, so two saves of the same database produce different
    /// bytes that load back to the same contents.
    pub fn write<W: Write>(&self, sink: W, passphrase: &str) -> Result<(), Error> {
        self.write_with_rng(sink, passphrase, &mut OsRng)
    }

    /// Serialize and encrypt with a caller-supplied secure RNG
    pub fn write_with_rng<W, R>(&self, sink: W, passphrase: &str, rng: &mut R) -> Result<(), Error>
    where
        W: Write,
        R: RngCore + CryptoRng,
    {
        binary::write_v3(self, sink, passphrase, rng)
    }

    /// Save this database to a file path
    pub fn save<P: AsRef<Path>>(&self, path: P, passphrase: &str) -> Result<(), Error> {
        let file = File::create(path)?;
        self.write(file, passphrase)
    }
}
