//! # cardtag
//!
//! A Rust library for reading and writing trading-card identity records on NFC tags.
//!
//! A card is stored on the tag as a fixed 42-character record in 4-byte user pages starting at
//! page 4. Tags are reached through a PC/SC contactless reader, one command per transaction.
//!
//! ## Features
//!
//! - Fixed-width record codec with per-field validation
//! - Reader/tag presence polling with edge-triggered notifications
//! - Page-by-page reads that skip failed pages and writes that stop at the first one
//! - Async/await based API using Tokio
//! - In-memory tag emulator for tests and hardware-free development
//! - Relay client forwarding records to a remote listener
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cardtag::{CardRecord, EventDispatcher, MockTransport, SessionConfig, TagSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cardtag::Error> {
//!     let transport = Arc::new(MockTransport::with_reader());
//!     transport.present_tag(&[0x04, 0xA1, 0xB2, 0xC3]).await;
//!
//!     let config = SessionConfig::new().write_delay(Duration::ZERO);
//!     let session = TagSession::new(transport, EventDispatcher::new(64), config);
//!     session.poll().await;
//!     assert!(session.snapshot().tag_present());
//!
//!     let record: CardRecord = "YG0189631139--4007----0000LOB-EN001UR1EXXX".parse()?;
//!     let report = session.write(&record.encode()?).await?;
//!     println!("{}", report.message());
//!
//!     let read = session.read().await?;
//!     assert_eq!(read.record()?, record);
//!     Ok(())
//! }
//! ```
//!
//! With the `pcsc` feature, `transport::PcscTransport` drives real readers, and a
//! [`TagMonitor`] keeps polling in the background:
//!
//! ```ignore
//! let transport = Arc::new(PcscTransport::establish()?);
//! let mut monitor = TagMonitor::new(transport, MonitorConfig::new());
//! let mut events = monitor.subscribe();
//! monitor.start();
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.message());
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`record`] - Card record layout, codec and set code parsing
//! - [`protocol`] - Reader command frames, status words and page helpers
//! - [`types`] - Reader handles and tag UIDs
//! - [`transport`] - Reader transports (PC/SC and an in-memory emulator)
//! - [`session`] - Presence state machine and multi-page reads and writes
//! - [`event`] - Async event system for notifications
//! - [`monitor`] - Background polling loop and on-demand operations
//! - [`relay`] - Client for the record relay listener

pub mod error;
pub mod event;
pub mod monitor;
pub mod protocol;
pub mod record;
pub mod relay;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use error::{ApduError, Error, Result, ValidationError};
pub use event::{Event, EventDispatcher, EventFilter, EventKind, Subscription};
pub use monitor::{MonitorConfig, TagMonitor};
pub use protocol::{ApduResponse, StatusWord};
pub use record::{CardRecord, Field, SetCode, decode, encode};
pub use relay::{RelayClient, RelayConfig};
pub use session::{
    PageFailure, PageFault, ReadReport, SessionConfig, SessionSnapshot, TagSession,
    TagSessionState, WriteReport,
};
pub use transport::{MockTransport, ReaderTransport};
#[cfg(feature = "pcsc")]
pub use transport::PcscTransport;
pub use types::{ReaderHandle, TagUid};
