//! Reader and tag identity types.

use std::fmt;

/// An attached reader as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReaderHandle {
    name: String,
}

impl ReaderHandle {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the platform reader name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ReaderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Tag UID as returned by the reader (4, 7 or 10 bytes).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TagUid(Vec<u8>);

impl TagUid {
    /// Creates a UID from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Parses a UID from a hex string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid hex.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s)?))
    }

    /// Returns the UID bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the UID as uppercase hex, e.g. `04A1B2C3`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.0)
    }

    /// Returns the UID as space-separated byte pairs, e.g. `04 A1 B2 C3`.
    #[must_use]
    pub fn spaced(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagUid({})", self.to_hex())
    }
}
