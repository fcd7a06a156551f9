use crate::crypto::{self, HmacSha256};
use crate::errors::Error;
use hmac::Mac;
use rand::{CryptoRng, RngCore};

pub(crate) const V3_TAG: &[u8; 4] = b"PWS3";
pub(crate) const V3_EOF: &[u8; 16] = b"PWS3-EOFPWS3-EOF";

/// Frame terminator tag. Purely structural: it delimits the header and
/// each record and is never stored in a field map.
pub(crate) const END: u8 = 0xff;

/// Round a length up to the next multiple of `alignment`.
pub(crate) fn align_to(len: usize, alignment: usize) -> usize {
    (len + alignment - 1) / alignment * alignment
}

/// Bytes a field frame occupies before padding: length prefix, type tag
/// and the data itself.
pub(crate) fn frame_len(data_len: usize) -> usize {
    4 + 1 + data_len
}

/// Bytes a field frame occupies on disk once padded to the cipher block
/// boundary.
pub(crate) fn padded_frame_len(data_len: usize) -> usize {
    align_to(frame_len(data_len), crypto::BLOCK_SIZE)
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
/// Field types for the database header
pub enum HeaderField {
    /// On-disk format version
    Version,
    /// Identifier of the database itself
    Uuid,
    /// Serialized user preference string
    Preferences,
    /// Expanded/collapsed display state of the entry tree
    TreeStatus,
    /// Time of the last save
    SaveTimestamp,
    /// Deprecated combined user and host of the last save
    WhoSaved,
    /// Application that performed the last save
    WhatSaved,
    /// User that performed the last save
    LastSavedByUser,
    /// Host that performed the last save
    LastSavedOnHost,
    /// Name of the database
    DatabaseName,
    /// Description of the database
    DatabaseDescription,
    /// Saved database filters
    DatabaseFilter,
    /// Recently used entries
    RecentlyUsed,
    /// Named password policies
    NamedPolicies,
    /// Names of groups that contain no entries
    EmptyGroups,
    /// Yubico configuration
    Yubico,
    /// Frame terminator, not a storable field
    End,
    /// A field type not interpreted by this library
    Unknown(u8),
}

impl From<u8> for HeaderField {
    fn from(id: u8) -> HeaderField {
        match id {
            0x00 => HeaderField::Version,
            0x01 => HeaderField::Uuid,
            0x02 => HeaderField::Preferences,
            0x03 => HeaderField::TreeStatus,
            0x04 => HeaderField::SaveTimestamp,
            0x05 => HeaderField::WhoSaved,
            0x06 => HeaderField::WhatSaved,
            0x07 => HeaderField::LastSavedByUser,
            0x08 => HeaderField::LastSavedOnHost,
            0x09 => HeaderField::DatabaseName,
            0x0a => HeaderField::DatabaseDescription,
            0x0b => HeaderField::DatabaseFilter,
            0x0f => HeaderField::RecentlyUsed,
            0x10 => HeaderField::NamedPolicies,
            0x11 => HeaderField::EmptyGroups,
            0x12 => HeaderField::Yubico,
            0xff => HeaderField::End,
            x => HeaderField::Unknown(x),
        }
    }
}

impl From<HeaderField> for u8 {
    fn from(id: HeaderField) -> u8 {
        match id {
            HeaderField::Version => 0x00,
            HeaderField::Uuid => 0x01,
            HeaderField::Preferences => 0x02,
            HeaderField::TreeStatus => 0x03,
            HeaderField::SaveTimestamp => 0x04,
            HeaderField::WhoSaved => 0x05,
            HeaderField::WhatSaved => 0x06,
            HeaderField::LastSavedByUser => 0x07,
            HeaderField::LastSavedOnHost => 0x08,
            HeaderField::DatabaseName => 0x09,
            HeaderField::DatabaseDescription => 0x0a,
            HeaderField::DatabaseFilter => 0x0b,
            HeaderField::RecentlyUsed => 0x0f,
            HeaderField::NamedPolicies => 0x10,
            HeaderField::EmptyGroups => 0x11,
            HeaderField::Yubico => 0x12,
            HeaderField::End => 0xff,
            HeaderField::Unknown(x) => x,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
/// Field types for a stored record
pub enum RecordField {
    /// Identifier of the record
    Uuid,
    /// Group path the record is filed under
    Group,
    /// Title of the record
    Title,
    /// Stored account name
    Username,
    /// Free-form notes
    Notes,
    /// Stored password
    Password,
    /// Time the record was created
    CreationTime,
    /// Time the password was last changed
    PasswordModifiedTime,
    /// Time the record was last accessed
    LastAccessTime,
    /// Time the password expires
    ExpiryTime,
    /// Time the record was last changed
    ModifiedTime,
    /// Stored URL
    Url,
    /// Autotype sequence
    Autotype,
    /// Previous passwords
    History,
    /// Password generation policy
    Policy,
    /// Days until the password expires
    ExpiryInterval,
    /// Command to run on activation
    RunCommand,
    /// Double-click action
    DoubleClick,
    /// Stored e-mail address
    Email,
    /// Marks the record as protected against accidental edits
    Protected,
    /// Symbol set for password generation
    PasswordSymbols,
    /// Shift double-click action
    ShiftDoubleClick,
    /// Name of a shared password policy
    PolicyName,
    /// Keyboard shortcut for the record
    KeyboardShortcut,
    /// Frame terminator, not a storable field
    End,
    /// A field type not interpreted by this library
    Unknown(u8),
}

impl From<u8> for RecordField {
    fn from(id: u8) -> RecordField {
        match id {
            0x01 => RecordField::Uuid,
            0x02 => RecordField::Group,
            0x03 => RecordField::Title,
            0x04 => RecordField::Username,
            0x05 => RecordField::Notes,
            0x06 => RecordField::Password,
            0x07 => RecordField::CreationTime,
            0x08 => RecordField::PasswordModifiedTime,
            0x09 => RecordField::LastAccessTime,
            0x0a => RecordField::ExpiryTime,
            0x0c => RecordField::ModifiedTime,
            0x0d => RecordField::Url,
            0x0e => RecordField::Autotype,
            0x0f => RecordField::History,
            0x10 => RecordField::Policy,
            0x11 => RecordField::ExpiryInterval,
            0x12 => RecordField::RunCommand,
            0x13 => RecordField::DoubleClick,
            0x14 => RecordField::Email,
            0x15 => RecordField::Protected,
            0x16 => RecordField::PasswordSymbols,
            0x17 => RecordField::ShiftDoubleClick,
            0x18 => RecordField::PolicyName,
            0x19 => RecordField::KeyboardShortcut,
            0xff => RecordField::End,
            x => RecordField::Unknown(x),
        }
    }
}

impl From<RecordField> for u8 {
    fn from(id: RecordField) -> u8 {
        match id {
            RecordField::Uuid => 0x01,
            RecordField::Group => 0x02,
            RecordField::Title => 0x03,
            RecordField::Username => 0x04,
            RecordField::Notes => 0x05,
            RecordField::Password => 0x06,
            RecordField::CreationTime => 0x07,
            RecordField::PasswordModifiedTime => 0x08,
            RecordField::LastAccessTime => 0x09,
            RecordField::ExpiryTime => 0x0a,
            RecordField::ModifiedTime => 0x0c,
            RecordField::Url => 0x0d,
            RecordField::Autotype => 0x0e,
            RecordField::History => 0x0f,
            RecordField::Policy => 0x10,
            RecordField::ExpiryInterval => 0x11,
            RecordField::RunCommand => 0x12,
            RecordField::DoubleClick => 0x13,
            RecordField::Email => 0x14,
            RecordField::Protected => 0x15,
            RecordField::PasswordSymbols => 0x16,
            RecordField::ShiftDoubleClick => 0x17,
            RecordField::PolicyName => 0x18,
            RecordField::KeyboardShortcut => 0x19,
            RecordField::End => 0xff,
            RecordField::Unknown(x) => x,
        }
    }
}

/// A single field frame borrowed from the decrypted record stream.
pub(crate) struct Frame<'a> {
    pub(crate) ty: u8,
    pub(crate) data: &'a [u8],
}

/// Iterates the field frames of a decrypted, block-aligned record stream.
pub(crate) struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> FrameReader<'a> {
        FrameReader { buf, pos: 0 }
    }

    /// The next frame, or `None` once the stream ends on a frame boundary.
    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame<'a>>, Error> {
        let remaining = self.buf.len() - self.pos;
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < crypto::BLOCK_SIZE {
            return Err(Error::Corrupted(
                "field frame shorter than one cipher block".into(),
            ));
        }

        let data_len = u32::from_le_bytes([
            self.buf[self.pos],
            self.buf[self.pos + 1],
            self.buf[self.pos + 2],
            self.buf[self.pos + 3],
        ]) as usize;
        if data_len > remaining {
            return Err(Error::Corrupted(format!(
                "field of {} bytes exceeds the {} remaining stream bytes",
                data_len, remaining
            )));
        }
        let total = padded_frame_len(data_len);
        if total > remaining {
            return Err(Error::Corrupted(format!(
                "field frame of {} bytes exceeds the {} remaining stream bytes",
                total, remaining
            )));
        }

        let ty = self.buf[self.pos + 4];
        let data = &self.buf[self.pos + 5..self.pos + 5 + data_len];
        self.pos += total;
        Ok(Some(Frame { ty, data }))
    }
}

/// Serializes field frames into a plaintext buffer, feeding the cleartext
/// data of every frame into the record HMAC and filling the padding with
/// fresh randomness.
pub(crate) struct FrameWriter<'a, R: RngCore + CryptoRng> {
    buf: &'a mut Vec<u8>,
    hmac: &'a mut HmacSha256,
    rng: &'a mut R,
}

impl<'a, R: RngCore + CryptoRng> FrameWriter<'a, R> {
    pub(crate) fn new(
        buf: &'a mut Vec<u8>,
        hmac: &'a mut HmacSha256,
        rng: &'a mut R,
    ) -> FrameWriter<'a, R> {
        FrameWriter { buf, hmac, rng }
    }

    /// Append one field frame. Only the data bytes enter the HMAC; the
    /// length prefix, type tag and padding do not.
    pub(crate) fn write_field(&mut self, ty: u8, data: &[u8]) -> Result<(), Error> {
        self.buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        self.buf.push(ty);
        self.buf.extend_from_slice(data);
        self.hmac.update(data);

        let padding = padded_frame_len(data.len()) - frame_len(data.len());
        if padding > 0 {
            let start = self.buf.len();
            self.buf.resize(start + padding, 0);
            crypto::fill_random(&mut *self.rng, &mut self.buf[start..])?;
        }
        Ok(())
    }

    /// Append the frame that terminates the header or the current record.
    pub(crate) fn finish_group(&mut self) -> Result<(), Error> {
        self.write_field(END, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_rounds_up_to_block_multiples() {
        assert_eq!(align_to(0, 16), 0);
        assert_eq!(align_to(1, 16), 16);
        assert_eq!(align_to(16, 16), 16);
        assert_eq!(align_to(17, 16), 32);
    }

    #[test]
    fn frame_lengths_cover_prefix_tag_and_data() {
        assert_eq!(frame_len(0), 5);
        assert_eq!(frame_len(11), 16);
        // 11 data bytes fill a block exactly, 12 spill into a second one
        assert_eq!(padded_frame_len(0), 16);
        assert_eq!(padded_frame_len(11), 16);
        assert_eq!(padded_frame_len(12), 32);
    }

    #[test]
    fn tag_conversions_round_trip() {
        for id in 0u8..=0xff {
            assert_eq!(u8::from(HeaderField::from(id)), id);
            assert_eq!(u8::from(RecordField::from(id)), id);
        }
        assert_eq!(HeaderField::from(0x0c), HeaderField::Unknown(0x0c));
        assert_eq!(RecordField::from(0x0b), RecordField::Unknown(0x0b));
        assert_eq!(HeaderField::from(0xff), HeaderField::End);
        assert_eq!(RecordField::from(0xff), RecordField::End);
    }

    fn frame_bytes(ty: u8, data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
        buf.push(ty);
        buf.extend_from_slice(data);
        buf.resize(padded_frame_len(data.len()), 0);
        buf
    }

    #[test]
    fn frames_parse_back_out_of_a_stream() {
        let mut stream = frame_bytes(0x03, b"title");
        stream.extend(frame_bytes(END, &[]));

        let mut reader = FrameReader::new(&stream);
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.ty, 0x03);
        assert_eq!(frame.data, b"title");
        let frame = reader.next_frame().unwrap().unwrap();
        assert_eq!(frame.ty, END);
        assert_eq!(frame.data, b"");
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn oversized_field_lengths_are_rejected() {
        let mut stream = frame_bytes(0x03, b"title");
        stream[0] = 0xee; // data length far beyond the stream
        let mut reader = FrameReader::new(&stream);
        assert!(matches!(
            reader.next_frame(),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn partial_blocks_are_rejected() {
        let stream = [0u8; 8];
        let mut reader = FrameReader::new(&stream);
        assert!(matches!(
            reader.next_frame(),
            Err(Error::Corrupted(_))
        ));
    }
}
