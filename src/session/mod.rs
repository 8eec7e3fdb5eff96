//! Tag session: presence polling and multi-page reads and writes.
//!
//! A [`TagSession`] turns single-command transactions on a [`ReaderTransport`] into the
//! operations the application needs:
//! - [`TagSession::poll`] samples reader/tag presence and publishes edge-triggered notifications
//! - [`TagSession::read`] reads user pages, skipping pages that fail
//! - [`TagSession::write`] writes a payload page by page, stopping at the first failure
//!
//! Every page is its own connect/transmit/disconnect cycle, so a failure only ever costs one
//! page.

pub mod report;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use tokio::sync::{Mutex, watch};

use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher};
use crate::protocol::{DEFAULT_READ_PAGES, PAGE_SIZE, USER_PAGE_START, apdu, page};
use crate::record::TAG_SUFFIX;
use crate::transport::ReaderTransport;
use crate::types::{ReaderHandle, TagUid};

pub use report::{PageFailure, PageFault, ReadReport, WriteReport};
pub use state::{
    Notification, Observation, SessionSnapshot, StateMachine, TagSessionState, transition,
};

/// Default pause between page writes, letting the tag finish its write cycle.
pub const DEFAULT_WRITE_DELAY: Duration = Duration::from_millis(200);

/// Number of addressable pages.
const PAGE_SPACE: usize = 256;

/// Configuration for tag operations.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// First page read and written.
    pub page_start: u8,
    /// Pages read by [`TagSession::read`].
    pub read_pages: u8,
    /// Bytes per page.
    pub page_size: u8,
    /// Pause between page writes.
    pub write_delay: Duration,
}

impl SessionConfig {
    /// Creates a configuration for the standard user-memory layout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            page_start: USER_PAGE_START,
            read_pages: DEFAULT_READ_PAGES,
            page_size: PAGE_SIZE,
            write_delay: DEFAULT_WRITE_DELAY,
        }
    }

    /// Sets the first page.
    #[must_use]
    pub const fn page_start(mut self, page: u8) -> Self {
        self.page_start = page;
        self
    }

    /// Sets the number of pages read.
    #[must_use]
    pub const fn read_pages(mut self, count: u8) -> Self {
        self.read_pages = count;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn page_size(mut self, size: u8) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the pause between page writes.
    #[must_use]
    pub const fn write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader/tag session over a shared transport.
pub struct TagSession<T> {
    transport: Arc<T>,
    dispatcher: EventDispatcher,
    config: SessionConfig,
    machine: Mutex<StateMachine>,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl<T: ReaderTransport> TagSession<T> {
    /// Creates a new session.
    #[must_use]
    pub fn new(transport: Arc<T>, dispatcher: EventDispatcher, config: SessionConfig) -> Self {
        let (snapshot, _) = watch::channel(SessionSnapshot::initial());
        Self {
            transport,
            dispatcher,
            config,
            machine: Mutex::new(StateMachine::new()),
            snapshot,
        }
    }

    /// Returns the session configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the dispatcher notifications are sent on.
    #[must_use]
    pub const fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Returns the state as of the last completed poll.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns a receiver that observes every snapshot update.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.subscribe()
    }

    /// Samples reader and tag presence once.
    ///
    /// Polls are serialized: a second caller waits until the first poll, including its
    /// transport I/O, has finished. The snapshot is updated before notifications are
    /// dispatched.
    pub async fn poll(&self) -> Vec<Notification> {
        let mut machine = self.machine.lock().await;

        let observation = self.observe().await;
        let notifications = machine.apply(observation);
        self.snapshot.send_replace(machine.snapshot().clone());

        for notification in &notifications {
            match notification {
                Notification::StateChanged(state) => {
                    tracing::debug!("session state changed: {:?}", state);
                    self.dispatcher.dispatch(Event::StateChanged(*state));
                }
                Notification::TagDetected(uid) => {
                    tracing::info!("tag detected: {}", uid);
                    self.dispatcher.dispatch(Event::TagDetected(uid.clone()));
                }
            }
        }

        notifications
    }

    async fn observe(&self) -> Observation {
        let readers = match self.transport.list_readers().await {
            Ok(readers) => readers,
            Err(e) => {
                tracing::warn!("reader enumeration failed: {}", e);
                self.dispatcher
                    .diagnostic(format!("Error checking device: {e}"));
                return Observation::NoReader;
            }
        };

        let Some(reader) = readers.into_iter().next() else {
            self.dispatcher.diagnostic("NO NFC READER DETECTED");
            return Observation::NoReader;
        };
        self.dispatcher.diagnostic(format!("Using reader: {reader}"));

        match self.transport.transmit(&reader, &apdu::get_uid()).await {
            Ok(resp) if resp.is_success() && !resp.data.is_empty() => {
                Observation::TagPresent(TagUid::from_bytes(&resp.data))
            }
            Ok(resp) => {
                tracing::trace!("no tag answered: {}", resp.status);
                Observation::ReaderIdle
            }
            Err(e) => {
                tracing::trace!("uid request failed: {}", e);
                self.dispatcher.diagnostic(format!("Error reading tag: {e}"));
                Observation::ReaderIdle
            }
        }
    }

    async fn first_reader(&self) -> Result<ReaderHandle> {
        self.transport
            .list_readers()
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoReader)
    }

    /// Reads the configured user pages.
    pub async fn read(&self) -> Result<ReadReport> {
        self.read_pages(self.config.page_start, self.config.read_pages)
            .await
    }

    /// Reads `count` pages starting at `start`.
    ///
    /// A page that fails is reported and skipped; the read carries on with the next page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReader`] if no reader is attached and [`Error::NoTag`] if no page
    /// transaction reached a tag. A tag that rejects every page still gives an empty report.
    pub async fn read_pages(&self, start: u8, count: u8) -> Result<ReadReport> {
        check_range(start, usize::from(count))?;
        let reader = self.first_reader().await?;

        let capacity = usize::from(count) * usize::from(self.config.page_size);
        let mut data = BytesMut::with_capacity(capacity);
        let mut pages_read = Vec::with_capacity(usize::from(count));
        let mut failures = Vec::new();

        for page in (0..count).map(|i| start + i) {
            let command = apdu::read_page(page, self.config.page_size);
            let fault = match self.transport.transmit(&reader, &command).await {
                Ok(resp) if resp.is_success() => {
                    data.put_slice(&resp.data);
                    pages_read.push(page);
                    tracing::debug!("read page {}", page);
                    self.dispatcher
                        .diagnostic(format!("Page {page} read successfully."));
                    continue;
                }
                Ok(resp) => PageFault::Status(resp.status),
                Err(e) => PageFault::Transport(e.to_string()),
            };

            tracing::warn!("skipping page {}: {}", page, fault);
            self.dispatcher
                .diagnostic(format!("Failed to read page {page}: {fault}"));
            failures.push(PageFailure { page, fault });
        }

        // A tag that answered at all, even with error statuses, yields a (possibly empty) report.
        let unreachable = failures
            .iter()
            .all(|f| matches!(f.fault, PageFault::Transport(_)));
        if count > 0 && pages_read.is_empty() && unreachable {
            return Err(Error::NoTag);
        }

        let data = data.freeze();
        let text = page::payload_text(&data);
        Ok(ReadReport {
            pages_read,
            failures,
            data,
            text,
        })
    }

    /// Writes `payload` starting at the configured first page.
    pub async fn write(&self, payload: &str) -> Result<WriteReport> {
        self.write_at(payload, self.config.page_start).await
    }

    /// Writes `payload` followed by the tag suffix, one page per transaction, starting at
    /// `start`.
    ///
    /// Stops at the first page that fails. Pages already written are left as they are; the
    /// report says how far the write got.
    ///
    /// # Errors
    ///
    /// Returns an error only if the write cannot start: empty payload, payload past the last
    /// page, or no reader.
    pub async fn write_at(&self, payload: &str, start: u8) -> Result<WriteReport> {
        if payload.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let mut data = BytesMut::with_capacity(payload.len() + TAG_SUFFIX.len());
        data.put_slice(payload.as_bytes());
        data.put_slice(TAG_SUFFIX.as_bytes());
        check_range(start, page::pages_for(data.len(), self.config.page_size))?;
        let pages = page::chunk(&data, self.config.page_size);

        let reader = self.first_reader().await?;
        let mut report = WriteReport {
            pages_written: Vec::with_capacity(pages.len()),
            pages_total: pages.len(),
            failure: None,
        };

        for (i, chunk) in pages.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.write_delay).await;
            }

            let page = start + i as u8;
            let command = apdu::update_page(page, chunk);
            let fault = match self.transport.transmit(&reader, &command).await {
                Ok(resp) if resp.is_success() => {
                    report.pages_written.push(page);
                    tracing::debug!("wrote page {}", page);
                    self.dispatcher
                        .diagnostic(format!("Successfully wrote page {page}"));
                    continue;
                }
                Ok(resp) => PageFault::Status(resp.status),
                Err(e) => PageFault::Transport(e.to_string()),
            };

            tracing::warn!("write aborted at page {}: {}", page, fault);
            report.failure = Some(PageFailure { page, fault });
            break;
        }

        tracing::info!("{}", report.message());
        Ok(report)
    }
}

fn check_range(start: u8, count: usize) -> Result<()> {
    if usize::from(start) + count > PAGE_SPACE {
        return Err(Error::PageOutOfRange { start, count });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventFilter, Subscription};
    use crate::protocol::{Instruction, StatusWord};
    use crate::record::CardRecord;
    use crate::transport::MockTransport;
    use crate::transport::mock::MOCK_READER;

    const RECORD: &str = "YG0189631139--4007----0000LOB-EN001UR1EXXX";
    const UID: [u8; 4] = [0xAA, 0xBB, 0xCC, 0xDD];

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn session(transport: &Arc<MockTransport>) -> TagSession<MockTransport> {
        init_tracing();
        TagSession::new(
            Arc::clone(transport),
            EventDispatcher::new(256),
            SessionConfig::new(),
        )
    }

    async fn tag_with(uid: &[u8]) -> Arc<MockTransport> {
        let transport = Arc::new(MockTransport::with_reader());
        transport.present_tag(uid).await;
        transport
    }

    fn drain_transitions(sub: &mut Subscription) -> Vec<Event> {
        let filter = EventFilter::transitions();
        std::iter::from_fn(|| sub.try_recv())
            .filter(|e| filter.matches(e))
            .collect()
    }

    fn written_pages(log: &[bytes::Bytes]) -> Vec<u8> {
        log.iter()
            .filter(|cmd| cmd[1] == Instruction::UpdateBinary as u8)
            .map(|cmd| cmd[3])
            .collect()
    }

    #[tokio::test]
    async fn test_poll_transition_sequence() {
        let transport = Arc::new(MockTransport::new());
        let session = session(&transport);
        let mut sub = session.dispatcher().subscribe();

        // No readers.
        session.poll().await;
        // Reader attached, tag read fails.
        transport.set_readers(&[MOCK_READER]).await;
        session.poll().await;
        // Tag answers.
        transport.present_tag(&UID).await;
        session.poll().await;
        // Same tag again.
        let repeat = session.poll().await;

        assert!(repeat.is_empty());
        let events = drain_transitions(&mut sub);
        assert_eq!(events.len(), 4);
        assert!(matches!(
            events[0],
            Event::StateChanged(TagSessionState::NoReader)
        ));
        assert!(matches!(
            events[1],
            Event::StateChanged(TagSessionState::ReaderIdle)
        ));
        assert!(matches!(
            events[2],
            Event::StateChanged(TagSessionState::TagPresent)
        ));
        match &events[3] {
            Event::TagDetected(uid) => assert_eq!(uid.to_hex(), "AABBCCDD"),
            other => panic!("expected TagDetected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_diagnostics_repeat_every_poll() {
        let transport = Arc::new(MockTransport::new());
        let session = session(&transport);
        let mut sub = session.dispatcher().subscribe();

        session.poll().await;
        session.poll().await;

        let diagnostics: Vec<_> = std::iter::from_fn(|| sub.try_recv())
            .filter_map(|e| match e {
                Event::Diagnostic(message) => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(diagnostics, vec!["NO NFC READER DETECTED"; 2]);
    }

    #[tokio::test]
    async fn test_uid_status_failure_is_reader_idle() {
        let transport = tag_with(&UID).await;
        transport.fail_uid(Some(StatusWord::FAILURE)).await;
        let session = session(&transport);

        let notes = session.poll().await;
        assert_eq!(
            notes,
            vec![Notification::StateChanged(TagSessionState::ReaderIdle)]
        );
    }

    #[tokio::test]
    async fn test_empty_uid_is_reader_idle() {
        let transport = tag_with(&[]).await;
        let session = session(&transport);

        session.poll().await;
        assert_eq!(
            session.snapshot().state,
            Some(TagSessionState::ReaderIdle)
        );
    }

    #[tokio::test]
    async fn test_enumeration_error_is_no_reader() {
        let transport = tag_with(&UID).await;
        transport.fail_enumeration(Some("service stopped")).await;
        let session = session(&transport);

        session.poll().await;
        assert_eq!(session.snapshot().state, Some(TagSessionState::NoReader));
    }

    #[tokio::test]
    async fn test_snapshot_tracks_uid() {
        let transport = tag_with(&UID).await;
        let session = session(&transport);
        let mut watch = session.watch();

        assert_eq!(session.snapshot(), SessionSnapshot::initial());
        session.poll().await;
        assert!(watch.has_changed().unwrap());
        let snapshot = watch.borrow_and_update().clone();
        assert!(snapshot.tag_present());
        assert_eq!(snapshot.uid.map(|u| u.to_hex()).as_deref(), Some("AABBCCDD"));

        transport.remove_tag().await;
        session.poll().await;
        assert_eq!(session.snapshot().uid, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_then_read_round_trip() {
        let transport = tag_with(&UID).await;
        let session = session(&transport);

        let report = session.write(RECORD).await.unwrap();
        assert!(report.is_success());
        assert_eq!(report.pages_total, 11);
        assert_eq!(report.pages_written, (4..15).collect::<Vec<u8>>());

        let stored = transport.memory(4, 11).await;
        assert_eq!(&stored[..44], format!("{RECORD}XX").as_bytes());

        let read = session.read().await.unwrap();
        assert!(read.is_complete());
        assert_eq!(read.pages_read.len(), 12);
        assert_eq!(read.text, format!("{RECORD}XX"));
        assert_eq!(read.record().unwrap(), CardRecord::from_tag_text(RECORD).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_is_fail_fast() {
        let transport = tag_with(&UID).await;
        transport.fail_write(6, StatusWord::FAILURE).await;
        let session = session(&transport);

        // 46 characters plus the suffix fill exactly twelve pages (4..=15).
        let payload = format!("{}ABCDEF", "0123456789".repeat(4));
        let report = session.write(&payload).await.unwrap();

        assert_eq!(report.pages_total, 12);
        assert_eq!(report.pages_written, vec![4, 5]);
        assert_eq!(
            report.failure,
            Some(PageFailure {
                page: 6,
                fault: PageFault::Status(StatusWord::FAILURE),
            })
        );
        assert_eq!(written_pages(&transport.transmitted().await), vec![4, 5, 6]);
        assert_eq!(
            report.message(),
            "Write failed: Error writing to tag at page 6, response: 63 00"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_waits_between_pages() {
        let transport = tag_with(&UID).await;
        let session = session(&transport);

        let started = tokio::time::Instant::now();
        session.write(RECORD).await.unwrap();
        assert_eq!(started.elapsed(), DEFAULT_WRITE_DELAY * 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tag_removed_mid_write() {
        let transport = tag_with(&UID).await;
        transport.remove_tag_after(3).await;
        let session = session(&transport);

        let report = session.write(RECORD).await.unwrap();
        assert_eq!(report.pages_written, vec![4, 5, 6]);
        let failure = report.failure.unwrap();
        assert_eq!(failure.page, 7);
        assert!(matches!(failure.fault, PageFault::Transport(_)));
        // Partial write stays on the tag.
        assert_eq!(&transport.memory(4, 3).await[..], &RECORD.as_bytes()[..12]);
    }

    #[tokio::test]
    async fn test_read_skips_failed_page() {
        let transport = tag_with(&UID).await;
        let payload = format!("{RECORD}XX");
        transport.load(4, payload.as_bytes()).await;
        transport.fail_read(9, StatusWord::FAILURE).await;
        let session = session(&transport);

        let report = session.read().await.unwrap();
        assert_eq!(
            report.failures,
            vec![PageFailure {
                page: 9,
                fault: PageFault::Status(StatusWord::FAILURE),
            }]
        );
        assert_eq!(report.pages_read.len(), 11);
        assert!(!report.pages_read.contains(&9));
        assert_eq!(report.data.len(), 44);

        // Page 9 held bytes 20..24 of the payload; they are omitted.
        let expected = format!("{}{}", &payload[..20], &payload[24..]);
        assert_eq!(report.text, expected);
        assert!(report.record().is_err());
    }

    #[tokio::test]
    async fn test_read_transport_error_is_skipped() {
        let transport = tag_with(&UID).await;
        transport.load(4, b"YG01").await;
        transport.drop_page(5).await;
        let session = session(&transport);

        let report = session.read().await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].page, 5);
        assert_eq!(report.text, "YG01");
    }

    #[tokio::test]
    async fn test_read_hex_fallback() {
        let transport = tag_with(&UID).await;
        transport.load(4, &[0xFF, 0xFE, 0x41, 0x42]).await;
        let session = session(&transport);

        let report = session.read_pages(4, 1).await.unwrap();
        assert_eq!(report.text, "fffe4142");
    }

    #[tokio::test]
    async fn test_tag_removed_mid_read() {
        let transport = tag_with(&UID).await;
        transport.load(4, RECORD.as_bytes()).await;
        transport.remove_tag_after(5).await;
        let session = session(&transport);

        let report = session.read().await.unwrap();
        assert_eq!(report.pages_read, vec![4, 5, 6, 7, 8]);
        assert_eq!(report.failures.len(), 7);
        assert_eq!(report.text, &RECORD[..20]);
    }

    #[tokio::test]
    async fn test_read_all_pages_rejected_is_empty_report() {
        let transport = tag_with(&UID).await;
        for page in 4..16 {
            transport.fail_read(page, StatusWord::FAILURE).await;
        }
        let session = session(&transport);
        session.poll().await;
        assert!(session.snapshot().tag_present());

        let report = session.read().await.unwrap();
        assert!(report.pages_read.is_empty());
        assert_eq!(report.failures.len(), 12);
        assert!(
            report
                .failures
                .iter()
                .all(|f| f.fault == PageFault::Status(StatusWord::FAILURE))
        );
        assert!(report.data.is_empty());
        assert_eq!(report.text, "");
    }

    #[tokio::test]
    async fn test_read_without_reader_or_tag() {
        let transport = Arc::new(MockTransport::new());
        let session = session(&transport);
        assert!(matches!(session.read().await, Err(Error::NoReader)));

        transport.set_readers(&[MOCK_READER]).await;
        assert!(matches!(session.read().await, Err(Error::NoTag)));
    }

    #[tokio::test]
    async fn test_write_rejects_bad_requests() {
        let transport = tag_with(&UID).await;
        let session = session(&transport);

        assert!(matches!(session.write("").await, Err(Error::EmptyPayload)));
        assert!(matches!(
            session.write_at(RECORD, 250).await,
            Err(Error::PageOutOfRange { start: 250, .. })
        ));
        assert!(transport.transmitted().await.is_empty());
    }

    #[test]
    fn test_session_config_builder() {
        let config = SessionConfig::new()
            .page_start(8)
            .read_pages(4)
            .page_size(4)
            .write_delay(Duration::from_millis(50));
        assert_eq!(config.page_start, 8);
        assert_eq!(config.read_pages, 4);
        assert_eq!(config.write_delay, Duration::from_millis(50));

        let defaults = SessionConfig::default();
        assert_eq!(defaults.page_start, 4);
        assert_eq!(defaults.read_pages, 12);
        assert_eq!(defaults.page_size, 4);
    }
}
