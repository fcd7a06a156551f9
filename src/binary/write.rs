use super::fields::{FrameWriter, V3_EOF, V3_TAG};
use crate::crypto::{self, SessionKeys};
use crate::database::Database;
use crate::errors::Error;
use hmac::Mac;
use rand::{CryptoRng, RngCore};
use std::io::Write;

/// Key-stretch rounds applied to every database this library writes.
/// Loading honors whatever count the file declares.
pub(crate) const STRETCH_ITERATIONS: u32 = 4096;

/// Serialize and encrypt a database to the sink.
pub(crate) fn write_v3<W, R>(
    db: &Database,
    mut sink: W,
    passphrase: &str,
    rng: &mut R,
) -> Result<(), Error>
where
    W: Write,
    R: RngCore + CryptoRng,
{
    let mut salt = [0u8; 32];
    crypto::fill_random(rng, &mut salt)?;
    let keys = SessionKeys::generate(rng)?;
    let mut iv = [0u8; 16];
    crypto::fill_random(rng, &mut iv)?;

    // Serialize the header fields and then every record, each group
    // closed by a terminator frame. The HMAC sees cleartext data only.
    let mut hmac = keys.record_hmac();
    let mut stream = Vec::new();
    {
        let mut frames = FrameWriter::new(&mut stream, &mut hmac, rng);
        for (ty, data) in db.header().fields() {
            frames.write_field(ty, data)?;
        }
        frames.finish_group()?;
        for record in db.records() {
            for (ty, data) in record.fields() {
                frames.write_field(ty, data)?;
            }
            frames.finish_group()?;
        }
    }

    let (stretched, verify) = crypto::stretch_key(passphrase, &salt, STRETCH_ITERATIONS);

    // Every frame is block padded, so the stream encrypts in place.
    keys.encrypt_records(&iv, &mut stream)?;
    let wrapped = keys.wrap_blocks(&stretched)?;

    sink.write_all(V3_TAG)?;
    sink.write_all(&salt)?;
    sink.write_all(&STRETCH_ITERATIONS.to_le_bytes())?;
    sink.write_all(verify.as_bytes())?;
    for block in &wrapped {
        sink.write_all(block)?;
    }
    sink.write_all(&iv)?;
    sink.write_all(&stream)?;
    sink.write_all(V3_EOF)?;
    sink.write_all(hmac.finalize().into_bytes().as_slice())?;
    Ok(())
}
