//! Protocol definitions for reader communication.
//!
//! This module contains the low-level protocol types including:
//! - Reader command frames and status words
//! - Tag page addressing and chunking

pub mod apdu;
pub mod page;

pub use apdu::{ApduResponse, Instruction, READER_CLASS, StatusWord};
pub use page::{DEFAULT_READ_PAGES, PAGE_SIZE, USER_PAGE_START};
