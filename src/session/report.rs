//! Results of multi-page tag operations.

use std::fmt;

use bytes::Bytes;

use crate::error::ValidationError;
use crate::protocol::StatusWord;
use crate::record::CardRecord;

/// Why a single page transaction failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFault {
    /// The tag answered with a non-success status word.
    Status(StatusWord),
    /// The transaction never completed (tag removed, reader error).
    Transport(String),
}

impl fmt::Display for PageFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "response {status}"),
            Self::Transport(message) => f.write_str(message),
        }
    }
}

/// A failed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page: u8,
    pub fault: PageFault,
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}: {}", self.page, self.fault)
    }
}

/// Outcome of a tag read.
///
/// Failed pages are skipped: their bytes are absent from `data`, and `data` holds the successful
/// pages back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReport {
    /// Pages that were read, in order.
    pub pages_read: Vec<u8>,
    /// Pages that failed.
    pub failures: Vec<PageFailure>,
    /// Concatenated bytes of the pages that were read.
    pub data: Bytes,
    /// `data` as text (NULs stripped) or lowercase hex if it is not UTF-8.
    pub text: String,
}

impl ReadReport {
    /// Returns true if every page was read.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Decodes the card record stored on the tag.
    pub fn record(&self) -> Result<CardRecord, ValidationError> {
        CardRecord::from_tag_text(&self.text)
    }

    /// Returns the status line for display.
    #[must_use]
    pub fn message(&self) -> String {
        if self.is_complete() {
            format!("Read {} pages.", self.pages_read.len())
        } else {
            format!(
                "Read {} pages, {} failed.",
                self.pages_read.len(),
                self.failures.len()
            )
        }
    }
}

/// Outcome of a tag write.
///
/// Writing stops at the first failed page. Pages before it stay written; nothing is rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    /// Pages written successfully, in order.
    pub pages_written: Vec<u8>,
    /// Pages the payload needed.
    pub pages_total: usize,
    /// The page that aborted the write, if any.
    pub failure: Option<PageFailure>,
}

impl WriteReport {
    /// Returns true if every page was written.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Returns the status line for display.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.failure {
            None => "Write successful.".to_owned(),
            Some(PageFailure {
                page,
                fault: PageFault::Status(status),
            }) => format!("Write failed: Error writing to tag at page {page}, response: {status}"),
            Some(PageFailure {
                page,
                fault: PageFault::Transport(message),
            }) => format!("Write failed: Exception transmitting to page {page}: {message}"),
        }
    }
}
