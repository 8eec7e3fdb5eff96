//! Data types for readers and tags.

pub mod tag;

pub use tag::{ReaderHandle, TagUid};
