//! Reader command frames.
//!
//! Tags are driven through the reader's pseudo-APDU interface (class byte `0xFF`):
//! ```text
//! ┌──────┬──────┬──────┬──────┬──────────┬───────────┐
//! │ CLA  │ INS  │  P1  │  P2  │ Lc / Le  │   data    │
//! │ 0xFF │      │ 0x00 │ page │  1 byte  │ Lc bytes  │
//! └──────┴──────┴──────┴──────┴──────────┴───────────┘
//! ```
//! Every response ends with a two-byte status word; `90 00` is success.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ApduError;

/// Class byte of reader pseudo-APDUs.
pub const READER_CLASS: u8 = 0xFF;

/// Instructions understood by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    /// Read binary pages from tag memory.
    ReadBinary = 0xB0,
    /// Get data; with P1 = 0 returns the tag UID.
    GetData = 0xCA,
    /// Write binary pages to tag memory.
    UpdateBinary = 0xD6,
}

impl Instruction {
    /// Parses an instruction byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xB0 => Some(Self::ReadBinary),
            0xCA => Some(Self::GetData),
            0xD6 => Some(Self::UpdateBinary),
            _ => None,
        }
    }
}

impl From<Instruction> for u8 {
    fn from(ins: Instruction) -> Self {
        ins as Self
    }
}

/// Builds the "get tag identifier" command (`FF CA 00 00 00`).
#[must_use]
pub fn get_uid() -> Bytes {
    Bytes::from_static(&[READER_CLASS, Instruction::GetData as u8, 0x00, 0x00, 0x00])
}

/// Builds a page read command returning `len` bytes from `page`.
#[must_use]
pub fn read_page(page: u8, len: u8) -> Bytes {
    Bytes::copy_from_slice(&[READER_CLASS, Instruction::ReadBinary as u8, 0x00, page, len])
}

/// Builds a page write command storing `data` at `page`.
///
/// The length byte caps `data` at 255 bytes; anything past that is not sent.
#[must_use]
pub fn update_page(page: u8, data: &[u8]) -> Bytes {
    let data = &data[..data.len().min(usize::from(u8::MAX))];
    let mut buf = BytesMut::with_capacity(5 + data.len());
    buf.put_u8(READER_CLASS);
    buf.put_u8(Instruction::UpdateBinary as u8);
    buf.put_u8(0x00);
    buf.put_u8(page);
    buf.put_u8(data.len() as u8);
    buf.put_slice(data);
    buf.freeze()
}

/// Two-byte response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    pub sw1: u8,
    pub sw2: u8,
}

impl StatusWord {
    /// `90 00`.
    pub const SUCCESS: Self = Self::new(0x90, 0x00);
    /// `63 00`, generic reader failure (no tag answered).
    pub const FAILURE: Self = Self::new(0x63, 0x00);
    /// `6A 82`, page not found.
    pub const NOT_FOUND: Self = Self::new(0x6A, 0x82);
    /// `6D 00`, instruction not supported.
    pub const INS_NOT_SUPPORTED: Self = Self::new(0x6D, 0x00);

    #[must_use]
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1, self.sw2)
    }
}

/// A response frame split into payload and status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub data: Bytes,
    pub status: StatusWord,
}

impl ApduResponse {
    #[must_use]
    pub const fn new(data: Bytes, status: StatusWord) -> Self {
        Self { data, status }
    }

    /// Builds a successful response carrying `data`.
    #[must_use]
    pub const fn success(data: Bytes) -> Self {
        Self::new(data, StatusWord::SUCCESS)
    }

    /// Builds an empty response with the given status.
    #[must_use]
    pub const fn status(status: StatusWord) -> Self {
        Self::new(Bytes::new(), status)
    }

    /// Splits a raw reader response (`data || SW1 SW2`).
    ///
    /// # Errors
    ///
    /// Returns [`ApduError::TooShort`] if there is no room for the status word.
    pub fn from_raw(raw: &[u8]) -> Result<Self, ApduError> {
        let Some(split) = raw.len().checked_sub(2) else {
            return Err(ApduError::TooShort(raw.len()));
        };
        let (data, sw) = raw.split_at(split);
        Ok(Self::new(
            Bytes::copy_from_slice(data),
            StatusWord::new(sw[0], sw[1]),
        ))
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_uid_frame() {
        assert_eq!(&get_uid()[..], &[0xFF, 0xCA, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_read_page_frame() {
        assert_eq!(&read_page(4, 4)[..], &[0xFF, 0xB0, 0x00, 0x04, 0x04]);
    }

    #[test]
    fn test_update_page_frame() {
        let frame = update_page(7, b"YG01");
        assert_eq!(
            &frame[..],
            &[0xFF, 0xD6, 0x00, 0x07, 0x04, b'Y', b'G', b'0', b'1']
        );
    }

    #[test]
    fn test_instruction_from_byte() {
        assert_eq!(Instruction::from_byte(0xCA), Some(Instruction::GetData));
        assert_eq!(Instruction::from_byte(0x00), None);
        let ins: u8 = Instruction::UpdateBinary.into();
        assert_eq!(ins, 0xD6);
    }

    #[test]
    fn test_status_word() {
        assert!(StatusWord::SUCCESS.is_success());
        assert!(!StatusWord::FAILURE.is_success());
        assert_eq!(StatusWord::NOT_FOUND.to_string(), "6A 82");
    }

    #[test]
    fn test_response_from_raw() {
        let resp = ApduResponse::from_raw(&[0x04, 0xA1, 0x90, 0x00]).unwrap();
        assert_eq!(&resp.data[..], &[0x04, 0xA1]);
        assert!(resp.is_success());

        let empty = ApduResponse::from_raw(&[0x63, 0x00]).unwrap();
        assert!(empty.data.is_empty());
        assert_eq!(empty.status, StatusWord::FAILURE);

        assert_eq!(ApduResponse::from_raw(&[0x90]), Err(ApduError::TooShort(1)));
    }
}
