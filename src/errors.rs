//! Error types for pwsafe-rs

use thiserror::Error;

/// Error returned by a passphrase supplier callback.
pub type PassphraseError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
/// Wrapper error type for this library
///
/// [`BadTag`] and [`BadPassphrase`] are recoverable: the caller can try
/// another format or prompt for the passphrase again. [`Corrupted`] and
/// [`Io`] are terminal for that load.
///
/// [`BadTag`]: ./enum.Error.html#variant.BadTag
/// [`BadPassphrase`]: ./enum.Error.html#variant.BadPassphrase
/// [`Corrupted`]: ./enum.Error.html#variant.Corrupted
/// [`Io`]: ./enum.Error.html#variant.Io
pub enum Error {
    /// The source, sink or random generator failed, including a source
    /// that ended before the fixed-size preamble was complete.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The leading four bytes are not a recognized database tag.
    #[error("unrecognized database tag")]
    BadTag,
    /// The stored verify hash does not match the supplied passphrase.
    #[error("passphrase is incorrect")]
    BadPassphrase,
    /// An integrity or structure check failed: bad eof marker, HMAC
    /// mismatch, misaligned ciphertext or a malformed field frame.
    #[error("corrupt database: {0}")]
    Corrupted(String),
    /// A failure outside the format itself, such as a passphrase callback
    /// error or a cipher that could not be constructed.
    #[error("database error: {0}")]
    Other(#[source] PassphraseError),
}
