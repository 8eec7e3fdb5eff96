//! Error types for the cardtag library.

use thiserror::Error;

use crate::record::Field;

/// The main error type for cardtag operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Card record failed validation.
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),

    /// Reader or tag communication failure.
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Response frame could not be parsed.
    #[error("apdu error: {0}")]
    Apdu(#[from] ApduError),

    /// PC/SC subsystem error.
    #[cfg(feature = "pcsc")]
    #[error("pcsc error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No reader is attached.
    #[error("no NFC reader found")]
    NoReader,

    /// No tag is in range of the reader.
    #[error("no tag detected")]
    NoTag,

    /// An on-demand read is already running.
    #[error("a tag read is already in progress")]
    ReadInProgress,

    /// Requested pages fall outside the addressable range.
    #[error("pages {start}..{start}+{count} exceed the addressable page range")]
    PageOutOfRange { start: u8, count: usize },

    /// Nothing to send.
    #[error("empty payload")]
    EmptyPayload,
}

/// Response frame errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApduError {
    /// Response too short to contain a status word.
    #[error("response too short: need at least 2 bytes, got {0}")]
    TooShort(usize),
}

/// Record codec validation failures.
///
/// Messages mirror what the writer tool shows the user when a card cannot be encoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Encoded string has the wrong length.
    #[error("encoded data must be exactly {expected} characters long, got {got}")]
    Length { expected: usize, got: usize },

    /// A field contains characters outside printable ASCII.
    #[error("{0} must contain printable ASCII only")]
    NonAscii(Field),

    /// A field contains the reserved padding character.
    #[error("{0} must not contain the reserved filler '-'")]
    ReservedFiller(Field),

    #[error("identifier must be 4 characters long and start with 'YG', got {0:?}")]
    Identifier(String),

    #[error("passcode must be 5 to 10 digits, got {0:?}")]
    Passcode(String),

    #[error("konami id must be numeric and at most 8 digits, got {0:?}")]
    KonamiId(String),

    #[error("variant must be a 4-digit number, got {0:?}")]
    Variant(String),

    #[error("set id must be 3 to 4 characters long, got {0:?}")]
    SetId(String),

    #[error("language must be exactly 2 characters, got {0:?}")]
    Lang(String),

    #[error("card number must be exactly 3 characters, got {0:?}")]
    Number(String),

    /// Rarity too long (at most 2 on encode, at most 4 on decode).
    #[error("rarity must be at most {max} characters, got {value:?}")]
    Rarity { value: String, max: usize },

    #[error("edition must be at most 2 characters, got {0:?}")]
    Edition(String),
}

/// Result type alias for cardtag operations.
pub type Result<T> = std::result::Result<T, Error>;
