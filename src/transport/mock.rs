//! In-memory tag emulator.
//!
//! [`MockTransport`] answers the same pseudo-APDUs a PC/SC reader does, against a scripted
//! reader list and tag. It is used by the test suite and is handy for driving a UI without
//! hardware.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::protocol::{ApduResponse, Instruction, PAGE_SIZE, READER_CLASS, StatusWord};
use crate::transport::ReaderTransport;
use crate::types::ReaderHandle;

/// Default reader name reported by [`MockTransport::with_reader`].
pub const MOCK_READER: &str = "Mock PICC Reader 00 00";

/// Number of pages in the emulated tag (NTAG213 layout).
pub const MOCK_PAGES: u8 = 45;

#[derive(Debug, Default)]
struct MockState {
    readers: Vec<ReaderHandle>,
    enumeration_error: Option<String>,
    uid: Option<Bytes>,
    uid_status: Option<StatusWord>,
    memory: HashMap<u8, [u8; PAGE_SIZE as usize]>,
    read_faults: HashMap<u8, StatusWord>,
    write_faults: HashMap<u8, StatusWord>,
    transport_faults: HashSet<u8>,
    remove_after: Option<usize>,
    log: Vec<Bytes>,
}

/// Scripted reader and tag.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    /// Creates a transport with no readers attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport with one reader and no tag.
    #[must_use]
    pub fn with_reader() -> Self {
        Self {
            state: Mutex::new(MockState {
                readers: vec![ReaderHandle::new(MOCK_READER)],
                ..MockState::default()
            }),
        }
    }

    /// Replaces the attached reader list.
    pub async fn set_readers(&self, names: &[&str]) {
        self.state.lock().await.readers = names.iter().map(|n| ReaderHandle::new(*n)).collect();
    }

    /// Makes reader enumeration fail until cleared with `None`.
    pub async fn fail_enumeration(&self, message: Option<&str>) {
        self.state.lock().await.enumeration_error = message.map(str::to_owned);
    }

    /// Places a tag with the given UID on the reader.
    pub async fn present_tag(&self, uid: &[u8]) {
        let mut state = self.state.lock().await;
        state.uid = Some(Bytes::copy_from_slice(uid));
        state.remove_after = None;
    }

    /// Takes the tag off the reader.
    pub async fn remove_tag(&self) {
        self.state.lock().await.uid = None;
    }

    /// Takes the tag off the reader after `transactions` more completed transactions.
    pub async fn remove_tag_after(&self, transactions: usize) {
        self.state.lock().await.remove_after = Some(transactions);
    }

    /// Makes the UID command answer with `status` while a tag is present.
    pub async fn fail_uid(&self, status: Option<StatusWord>) {
        self.state.lock().await.uid_status = status;
    }

    /// Makes reads of `page` answer with `status`.
    pub async fn fail_read(&self, page: u8, status: StatusWord) {
        self.state.lock().await.read_faults.insert(page, status);
    }

    /// Makes writes to `page` answer with `status`.
    pub async fn fail_write(&self, page: u8, status: StatusWord) {
        self.state.lock().await.write_faults.insert(page, status);
    }

    /// Makes any transaction addressing `page` fail at the transport level.
    pub async fn drop_page(&self, page: u8) {
        self.state.lock().await.transport_faults.insert(page);
    }

    /// Loads bytes into tag memory starting at `page`.
    pub async fn load(&self, page: u8, data: &[u8]) {
        let mut state = self.state.lock().await;
        for (i, piece) in data.chunks(usize::from(PAGE_SIZE)).enumerate() {
            let mut buf = [0u8; PAGE_SIZE as usize];
            buf[..piece.len()].copy_from_slice(piece);
            state.memory.insert(page + i as u8, buf);
        }
    }

    /// Returns `count` pages of tag memory starting at `page`.
    pub async fn memory(&self, page: u8, count: u8) -> Vec<u8> {
        let state = self.state.lock().await;
        (page..page.saturating_add(count))
            .flat_map(|p| state.memory.get(&p).copied().unwrap_or_default())
            .collect()
    }

    /// Returns every command frame transmitted so far.
    pub async fn transmitted(&self) -> Vec<Bytes> {
        self.state.lock().await.log.clone()
    }
}

impl MockState {
    fn execute(&mut self, command: &[u8]) -> Result<ApduResponse> {
        let Some(uid) = self.uid.clone() else {
            return Err(Error::Transport {
                message: "no tag present".into(),
            });
        };

        if command.len() < 5 || command[0] != READER_CLASS {
            return Ok(ApduResponse::status(StatusWord::INS_NOT_SUPPORTED));
        }
        let page = command[3];
        let len = usize::from(command[4]);

        match Instruction::from_byte(command[1]) {
            Some(Instruction::GetData) => Ok(match self.uid_status {
                Some(status) => ApduResponse::status(status),
                None => ApduResponse::success(uid),
            }),
            Some(Instruction::ReadBinary) => {
                if self.transport_faults.contains(&page) {
                    return Err(Error::Transport {
                        message: format!("transaction on page {page} failed"),
                    });
                }
                if let Some(status) = self.read_faults.get(&page) {
                    return Ok(ApduResponse::status(*status));
                }
                if page >= MOCK_PAGES {
                    return Ok(ApduResponse::status(StatusWord::NOT_FOUND));
                }
                let data: Vec<u8> = (page..=u8::MAX)
                    .flat_map(|p| self.memory.get(&p).copied().unwrap_or_default())
                    .take(len)
                    .collect();
                Ok(ApduResponse::success(Bytes::from(data)))
            }
            Some(Instruction::UpdateBinary) => {
                if self.transport_faults.contains(&page) {
                    return Err(Error::Transport {
                        message: format!("transaction on page {page} failed"),
                    });
                }
                if let Some(status) = self.write_faults.get(&page) {
                    return Ok(ApduResponse::status(*status));
                }
                if page >= MOCK_PAGES || command.len() != 5 + len {
                    return Ok(ApduResponse::status(StatusWord::NOT_FOUND));
                }
                let mut buf = [0u8; PAGE_SIZE as usize];
                let n = len.min(buf.len());
                buf[..n].copy_from_slice(&command[5..5 + n]);
                self.memory.insert(page, buf);
                Ok(ApduResponse::success(Bytes::new()))
            }
            None => Ok(ApduResponse::status(StatusWord::INS_NOT_SUPPORTED)),
        }
    }

    fn count_transaction(&mut self) {
        if let Some(remaining) = self.remove_after {
            if remaining <= 1 {
                self.uid = None;
                self.remove_after = None;
            } else {
                self.remove_after = Some(remaining - 1);
            }
        }
    }
}

impl ReaderTransport for MockTransport {
    fn list_readers(&self) -> BoxFuture<'_, Result<Vec<ReaderHandle>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            if let Some(message) = &state.enumeration_error {
                return Err(Error::Transport {
                    message: message.clone(),
                });
            }
            Ok(state.readers.clone())
        })
    }

    fn transmit<'a>(
        &'a self,
        reader: &'a ReaderHandle,
        command: &'a [u8],
    ) -> BoxFuture<'a, Result<ApduResponse>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if !state.readers.contains(reader) {
                return Err(Error::Transport {
                    message: format!("reader {reader} is not attached"),
                });
            }
            state.log.push(Bytes::copy_from_slice(command));
            let response = state.execute(command)?;
            state.count_transaction();
            Ok(response)
        })
    }
}
