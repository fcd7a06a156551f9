use crate::errors::Error;

use cipher::generic_array::GenericArray;
use cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use std::io;
use subtle::ConstantTimeEq;
use twofish::Twofish;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Twofish block size, the alignment unit for the whole record stream.
pub(crate) const BLOCK_SIZE: usize = 16;

/// Iterated SHA-256 of the passphrase and salt. Keys the Twofish cipher
/// that wraps the session keys, never the record stream itself.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct StretchedKey([u8; 32]);

/// SHA-256 of the stretched key, stored in the preamble so a passphrase
/// can be checked without touching the record stream.
pub(crate) struct VerifyHash([u8; 32]);

impl VerifyHash {
    /// Constant-time comparison against the on-disk verify hash.
    pub(crate) fn matches(&self, expected: &[u8; 32]) -> bool {
        self.0.as_slice().ct_eq(expected.as_slice()).into()
    }

    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Derive the stretched key and its verify hash from a passphrase.
///
/// The stretch is `iterations` extra rounds of SHA-256 over the initial
/// digest of passphrase and salt.
pub(crate) fn stretch_key(
    passphrase: &str,
    salt: &[u8; 32],
    iterations: u32,
) -> (StretchedKey, VerifyHash) {
    let mut digest = Sha256::new();
    digest.update(passphrase.as_bytes());
    digest.update(salt);
    let mut hash: [u8; 32] = digest.finalize().into();
    for _ in 0..iterations {
        hash = Sha256::digest(hash).into();
    }
    let verify: [u8; 32] = Sha256::digest(hash).into();
    (StretchedKey(hash), VerifyHash(verify))
}

/// The two 32-byte session keys carried inside a database file: one for
/// the record cipher, one for the record HMAC. On disk each is split
/// into 16-byte halves wrapped with Twofish under the stretched key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct SessionKeys {
    cipher: [u8; 32],
    hmac: [u8; 32],
}

impl SessionKeys {
    /// Draw fresh session keys from the RNG.
    pub(crate) fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<SessionKeys, Error> {
        let mut keys = SessionKeys {
            cipher: [0u8; 32],
            hmac: [0u8; 32],
        };
        fill_random(rng, &mut keys.cipher)?;
        fill_random(rng, &mut keys.hmac)?;
        Ok(keys)
    }

    /// Recover the session keys from the four wrapped preamble blocks.
    pub(crate) fn unwrap_blocks(
        blocks: &[[u8; 16]; 4],
        key: &StretchedKey,
    ) -> Result<SessionKeys, Error> {
        let unwrapper = key_cipher(key)?;
        let mut keys = SessionKeys {
            cipher: [0u8; 32],
            hmac: [0u8; 32],
        };
        keys.cipher[..16].copy_from_slice(&blocks[0]);
        keys.cipher[16..].copy_from_slice(&blocks[1]);
        keys.hmac[..16].copy_from_slice(&blocks[2]);
        keys.hmac[16..].copy_from_slice(&blocks[3]);
        for half in keys.cipher.chunks_exact_mut(BLOCK_SIZE) {
            unwrapper.decrypt_block(GenericArray::from_mut_slice(half));
        }
        for half in keys.hmac.chunks_exact_mut(BLOCK_SIZE) {
            unwrapper.decrypt_block(GenericArray::from_mut_slice(half));
        }
        Ok(keys)
    }

    /// Produce the four wrapped blocks for the file preamble.
    pub(crate) fn wrap_blocks(&self, key: &StretchedKey) -> Result<[[u8; 16]; 4], Error> {
        let wrapper = key_cipher(key)?;
        let mut blocks = [[0u8; 16]; 4];
        blocks[0].copy_from_slice(&self.cipher[..16]);
        blocks[1].copy_from_slice(&self.cipher[16..]);
        blocks[2].copy_from_slice(&self.hmac[..16]);
        blocks[3].copy_from_slice(&self.hmac[16..]);
        for block in blocks.iter_mut() {
            wrapper.encrypt_block(GenericArray::from_mut_slice(&mut block[..]));
        }
        Ok(blocks)
    }

    /// Fresh HMAC accumulator keyed for this database's record stream.
    pub(crate) fn record_hmac(&self) -> HmacSha256 {
        <HmacSha256 as Mac>::new_from_slice(&self.hmac).expect("hmac accepts any key size")
    }

    /// CBC-decrypt the record stream in place. The caller has already
    /// checked that the length is a multiple of the block size.
    pub(crate) fn decrypt_records(&self, iv: &[u8; 16], data: &mut [u8]) -> Result<(), Error> {
        let mut decryptor = cbc::Decryptor::<Twofish>::new_from_slices(&self.cipher, iv)
            .map_err(|e| Error::Other(e.to_string().into()))?;
        for block in data.chunks_exact_mut(BLOCK_SIZE) {
            decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }

    /// CBC-encrypt the record stream in place.
    pub(crate) fn encrypt_records(&self, iv: &[u8; 16], data: &mut [u8]) -> Result<(), Error> {
        let mut encryptor = cbc::Encryptor::<Twofish>::new_from_slices(&self.cipher, iv)
            .map_err(|e| Error::Other(e.to_string().into()))?;
        for block in data.chunks_exact_mut(BLOCK_SIZE) {
            encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
}

/// Twofish instance keyed by the stretched key, used only to wrap and
/// unwrap the session key halves in ECB.
fn key_cipher(key: &StretchedKey) -> Result<Twofish, Error> {
    Twofish::new_from_slice(&key.0).map_err(|e| Error::Other(e.to_string().into()))
}

/// Fill a buffer from the RNG, surfacing failures as I/O errors.
pub(crate) fn fill_random<R: RngCore + CryptoRng>(
    rng: &mut R,
    buf: &mut [u8],
) -> Result<(), Error> {
    rng.try_fill_bytes(buf)
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_iteration_stretch_is_plain_digest() {
        let salt = [7u8; 32];
        let (stretched, _) = stretch_key("passphrase", &salt, 0);

        let mut digest = Sha256::new();
        digest.update(b"passphrase");
        digest.update(salt);
        let expected: [u8; 32] = digest.finalize().into();

        assert_eq!(stretched.0, expected);
    }

    #[test]
    fn each_iteration_hashes_once_more() {
        let salt = [7u8; 32];
        let (once, _) = stretch_key("passphrase", &salt, 1);
        let (zero, _) = stretch_key("passphrase", &salt, 0);

        let expected: [u8; 32] = Sha256::digest(zero.0).into();
        assert_eq!(once.0, expected);
    }

    #[test]
    fn verify_hash_is_digest_of_stretched_key() {
        let salt = [1u8; 32];
        let (stretched, verify) = stretch_key("pw", &salt, 16);
        let expected: [u8; 32] = Sha256::digest(stretched.0).into();
        assert!(verify.matches(&expected));
        assert_eq!(verify.as_bytes(), &expected);
    }

    #[test]
    fn verify_hash_rejects_other_passphrases() {
        let salt = [1u8; 32];
        let (_, verify) = stretch_key("pw", &salt, 16);
        let (_, other) = stretch_key("pw2", &salt, 16);
        assert!(!verify.matches(other.as_bytes()));
    }

    #[test]
    fn session_keys_survive_wrap_and_unwrap() {
        let salt = [2u8; 32];
        let (stretched, _) = stretch_key("pw", &salt, 4);
        let mut rng = rand::rngs::OsRng;
        let keys = SessionKeys::generate(&mut rng).unwrap();

        let blocks = keys.wrap_blocks(&stretched).unwrap();
        let unwrapped = SessionKeys::unwrap_blocks(&blocks, &stretched).unwrap();

        assert_eq!(keys.cipher, unwrapped.cipher);
        assert_eq!(keys.hmac, unwrapped.hmac);
        // the wrapped halves must not leak the cleartext keys
        assert_ne!(&blocks[0][..], &keys.cipher[..16]);
        assert_ne!(&blocks[2][..], &keys.hmac[..16]);
    }

    #[test]
    fn record_encryption_round_trips() {
        let mut rng = rand::rngs::OsRng;
        let keys = SessionKeys::generate(&mut rng).unwrap();
        let iv = [9u8; 16];

        let mut data = vec![0x5au8; 64];
        keys.encrypt_records(&iv, &mut data).unwrap();
        assert_ne!(data, vec![0x5au8; 64]);
        keys.decrypt_records(&iv, &mut data).unwrap();
        assert_eq!(data, vec![0x5au8; 64]);
    }
}
