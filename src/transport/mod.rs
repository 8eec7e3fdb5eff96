//! Transport layer for reader communication.
//!
//! This module provides the abstraction over the hardware boundary. Each call to
//! [`ReaderTransport::transmit`] is one complete transaction: connect to the tag, send one
//! command, disconnect. No connection is held between calls, so implementations take `&self`
//! and can be shared freely between the polling loop and an on-demand read.

pub mod mock;
#[cfg(feature = "pcsc")]
pub mod pcsc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::protocol::ApduResponse;
use crate::types::ReaderHandle;

/// Trait for reader transport implementations.
pub trait ReaderTransport: Send + Sync {
    /// Lists attached readers in platform order. An empty list is not an error.
    fn list_readers(&self) -> BoxFuture<'_, Result<Vec<ReaderHandle>>>;

    /// Sends one command frame to the tag on `reader` and returns its response.
    ///
    /// A non-success status word is returned as a response, not an error; errors are reserved
    /// for failures to reach the tag at all.
    fn transmit<'a>(
        &'a self,
        reader: &'a ReaderHandle,
        command: &'a [u8],
    ) -> BoxFuture<'a, Result<ApduResponse>>;
}

pub use mock::MockTransport;
#[cfg(feature = "pcsc")]
pub use pcsc::PcscTransport;
