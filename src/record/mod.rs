//! Tag record format.
//!
//! This module contains the card identity record and its fixed-width text encoding:
//! - Field layout table
//! - Encoding/decoding with validation
//! - Printed set code parsing

pub mod codec;
pub mod layout;
pub mod set_code;

pub use codec::{CardRecord, decode, encode};
pub use layout::{
    FILLER, Field, FieldSpan, LAYOUT, PRODUCT_PREFIX, RECORD_LEN, TAG_SUFFIX, TERMINATOR,
    UNKNOWN_KONAMI_ID,
};
pub use set_code::SetCode;
