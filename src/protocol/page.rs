//! Tag memory pages.
//!
//! Tag memory is addressed in 4-byte pages. Pages 0-3 hold the UID, lock and capability bytes;
//! user data starts at page 4.

use bytes::{BufMut, Bytes, BytesMut};

/// Bytes per page.
pub const PAGE_SIZE: u8 = 4;

/// First page of user memory.
pub const USER_PAGE_START: u8 = 4;

/// Pages read by default (pages 4 through 15).
pub const DEFAULT_READ_PAGES: u8 = 12;

/// Splits `data` into `page_size` chunks, zero-padding the last one.
#[must_use]
pub fn chunk(data: &[u8], page_size: u8) -> Vec<Bytes> {
    let size = usize::from(page_size.max(1));
    data.chunks(size)
        .map(|piece| {
            let mut page = BytesMut::with_capacity(size);
            page.put_slice(piece);
            page.put_bytes(0, size - piece.len());
            page.freeze()
        })
        .collect()
}

/// Number of pages needed to hold `len` bytes.
#[must_use]
pub fn pages_for(len: usize, page_size: u8) -> usize {
    len.div_ceil(usize::from(page_size.max(1)))
}

/// Renders raw tag memory as text.
///
/// Valid UTF-8 is returned with trailing NUL bytes stripped; anything else falls back to
/// lowercase hex so a read always yields something displayable.
#[must_use]
pub fn payload_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.trim_end_matches('\0').to_owned(),
        Err(_) => hex::encode(data),
    }
}
