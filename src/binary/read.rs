use super::fields::{self, FrameReader, V3_EOF, V3_TAG};
use crate::crypto::{self, SessionKeys};
use crate::database::{Database, FieldMap, Header, Record};
use crate::errors::{Error, PassphraseError};
use crate::utils;
use hmac::Mac;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zeroize::Zeroize;

/// Read a database from an input stream
///
/// The passphrase supplier is invoked once, after the leading tag has been
/// recognized. A returned [`Database`] has passed both the passphrase
/// check and the end-to-end record integrity check.
///
/// [`Database`]: ../struct.Database.html
pub fn from_reader<R, F>(mut reader: R, passphrase: F) -> Result<Database, Error>
where
    R: Read,
    F: FnOnce() -> Result<String, PassphraseError>,
{
    let mut tag = [0u8; 4];
    reader.read_exact(&mut tag)?;

    match &tag {
        V3_TAG => read_v3(reader, passphrase),
        _ => Err(Error::BadTag),
    }
}

/// Read a database from a given path
///
/// The file handle is dropped once the database is in memory; close
/// failures on a read path cannot affect the parsed data.
pub fn open<P, F>(path: P, passphrase: F) -> Result<Database, Error>
where
    P: AsRef<Path>,
    F: FnOnce() -> Result<String, PassphraseError>,
{
    let file = File::open(path)?;
    from_reader(file, passphrase)
}

/// The v3 load path, entered with the tag already consumed.
fn read_v3<R, F>(mut reader: R, passphrase: F) -> Result<Database, Error>
where
    R: Read,
    F: FnOnce() -> Result<String, PassphraseError>,
{
    let salt: [u8; 32] = utils::read_array(&mut reader)?;
    let iterations = u32::from_le_bytes(utils::read_array(&mut reader)?);

    let mut passphrase = passphrase().map_err(Error::Other)?;
    let (stretched, verify) = crypto::stretch_key(&passphrase, &salt, iterations);
    passphrase.zeroize();

    let expected_verify: [u8; 32] = utils::read_array(&mut reader)?;
    if !verify.matches(&expected_verify) {
        return Err(Error::BadPassphrase);
    }

    let mut wrapped = [[0u8; 16]; 4];
    for block in wrapped.iter_mut() {
        *block = utils::read_array(&mut reader)?;
    }
    let iv: [u8; 16] = utils::read_array(&mut reader)?;
    let keys = SessionKeys::unwrap_blocks(&wrapped, &stretched)?;

    // Everything after the preamble is ciphertext, then the eof marker,
    // then the record HMAC.
    let mut stream = Vec::new();
    reader.read_to_end(&mut stream)?;
    if stream.len() < V3_EOF.len() + 32 {
        return Err(Error::Corrupted(
            "not enough bytes for eof marker and hmac".into(),
        ));
    }
    let hmac_start = stream.len() - 32;
    let eof_start = hmac_start - V3_EOF.len();
    let mut expected_hmac = [0u8; 32];
    expected_hmac.copy_from_slice(&stream[hmac_start..]);
    if &stream[eof_start..hmac_start] != V3_EOF {
        return Err(Error::Corrupted("invalid eof marker".into()));
    }
    stream.truncate(eof_start);

    if stream.len() % crypto::BLOCK_SIZE != 0 {
        return Err(Error::Corrupted(format!(
            "record stream of {} bytes is not block aligned",
            stream.len()
        )));
    }
    keys.decrypt_records(&iv, &mut stream)?;

    let parsed = parse_record_stream(&keys, &stream, &expected_hmac);
    stream.zeroize();
    let (header, records) = parsed?;

    Ok(Database::from_parts(header, records))
}

/// Split the decrypted stream into the header and the record sequence,
/// accumulating the record HMAC over the cleartext data of every frame.
fn parse_record_stream(
    keys: &SessionKeys,
    stream: &[u8],
    expected_hmac: &[u8; 32],
) -> Result<(Header, Vec<Record>), Error> {
    let mut hmac = keys.record_hmac();
    let mut frames = FrameReader::new(stream);
    let mut header = None;
    let mut records = Vec::new();
    let mut current = FieldMap::new();

    while let Some(frame) = frames.next_frame()? {
        hmac.update(frame.data);
        if frame.ty == fields::END {
            if header.is_none() {
                header = Some(Header::from_fields(std::mem::take(&mut current)));
            } else {
                records.push(Record::from_fields(std::mem::take(&mut current)));
            }
        } else {
            // last write wins for duplicate tags; unknown tags are kept
            current.insert(frame.ty, frame.data.to_vec());
        }
    }

    let header =
        header.ok_or_else(|| Error::Corrupted("record stream has no header terminator".into()))?;

    hmac.verify_slice(expected_hmac)
        .map_err(|_| Error::Corrupted("record hmac mismatch".into()))?;

    Ok((header, records))
}
