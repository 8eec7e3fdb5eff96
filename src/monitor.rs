//! Background tag monitor.
//!
//! [`TagMonitor`] owns a [`TagSession`] and polls it on a fixed interval from a spawned task, so
//! observers only ever deal with events. On-demand reads and writes run on their own tasks and
//! report back through the same dispatcher.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::event::{Event, EventDispatcher, Subscription};
use crate::record::CardRecord;
use crate::session::{
    Notification, ReadReport, SessionConfig, SessionSnapshot, TagSession, WriteReport,
};
use crate::transport::ReaderTransport;

/// Default interval between presence polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between the end of one poll and the start of the next.
    pub poll_interval: Duration,
    /// Events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
    /// Start a read whenever a tag comes into range.
    pub auto_read: bool,
    /// Tag operation settings.
    pub session: SessionConfig,
}

impl MonitorConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            auto_read: false,
            session: SessionConfig::new(),
        }
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub const fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Enables or disables reading on tag detection.
    #[must_use]
    pub const fn auto_read(mut self, enabled: bool) -> Self {
        self.auto_read = enabled;
        self
    }

    /// Sets the tag operation settings.
    #[must_use]
    pub const fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls a reader in the background and runs tag operations off the caller's task.
pub struct TagMonitor<T> {
    session: Arc<TagSession<T>>,
    poll_interval: Duration,
    auto_read: bool,

    // At most one on-demand read at a time
    read_lock: Arc<Mutex<()>>,

    // Background task
    stop: watch::Sender<bool>,
    poll_task: Option<JoinHandle<()>>,
}

impl<T: ReaderTransport + 'static> TagMonitor<T> {
    /// Creates a monitor over `transport`. Polling does not begin until [`start`](Self::start).
    #[must_use]
    pub fn new(transport: Arc<T>, config: MonitorConfig) -> Self {
        let dispatcher = EventDispatcher::new(config.event_capacity);
        let session = Arc::new(TagSession::new(transport, dispatcher, config.session));
        let (stop, _) = watch::channel(false);

        Self {
            session,
            poll_interval: config.poll_interval,
            auto_read: config.auto_read,
            read_lock: Arc::new(Mutex::new(())),
            stop,
            poll_task: None,
        }
    }

    /// Starts the poll loop. Does nothing if it is already running.
    ///
    /// A loop that was asked to stop but has not exited yet is left to finish on its own, and a
    /// fresh loop takes its place.
    pub fn start(&mut self) {
        if self.is_running() && !*self.stop.borrow() {
            return;
        }
        if let Some(task) = self.poll_task.take() {
            if !task.is_finished() {
                tracing::debug!("previous poll loop still stopping, starting a new one");
            }
        }

        // The old loop holds its own receiver; a fresh channel keeps it stopped.
        let (stop, _) = watch::channel(false);
        let previous = std::mem::replace(&mut self.stop, stop);
        previous.send_replace(true);

        let session = Arc::clone(&self.session);
        let read_lock = self.auto_read.then(|| Arc::clone(&self.read_lock));
        let stop = self.stop.subscribe();
        let interval = self.poll_interval;

        tracing::info!("starting tag monitor, polling every {:?}", interval);
        self.poll_task = Some(tokio::spawn(run_poll_loop(
            session, interval, read_lock, stop,
        )));
    }

    /// Returns true while the poll loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.poll_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Asks the poll loop to stop. A poll already under way completes; no new one starts.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Stops the poll loop and waits for it to exit.
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(task) = self.poll_task.take() {
            if let Err(e) = task.await {
                tracing::error!("poll loop ended abnormally: {}", e);
            }
        }
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.session.dispatcher().subscribe()
    }

    /// Returns the event dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher {
        self.session.dispatcher()
    }

    /// Returns the underlying session.
    #[must_use]
    pub const fn session(&self) -> &Arc<TagSession<T>> {
        &self.session
    }

    /// Returns the state as of the last poll.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Starts reading the tag in the background.
    ///
    /// The outcome is dispatched as [`Event::ReadCompleted`] or [`Event::ReadFailed`] and is
    /// also available from the returned handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoTag`] unless the last poll found a tag, and [`Error::ReadInProgress`]
    /// if another read has not finished yet.
    pub fn read_tag(&self) -> Result<JoinHandle<Result<ReadReport>>> {
        if !self.snapshot().tag_present() {
            return Err(Error::NoTag);
        }
        let guard = Arc::clone(&self.read_lock)
            .try_lock_owned()
            .map_err(|_| Error::ReadInProgress)?;

        Ok(spawn_read(Arc::clone(&self.session), guard))
    }

    /// Encodes `record` and starts writing it to the tag in the background.
    ///
    /// The outcome is dispatched as [`Event::WriteCompleted`] or [`Event::WriteFailed`] and is
    /// also available from the returned handle.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the record cannot be encoded, and [`Error::NoTag`] unless
    /// the last poll found a tag.
    pub fn write_tag(&self, record: &CardRecord) -> Result<JoinHandle<Result<WriteReport>>> {
        let encoded = record.encode()?;
        if !self.snapshot().tag_present() {
            return Err(Error::NoTag);
        }

        let session = Arc::clone(&self.session);
        Ok(tokio::spawn(async move {
            match session.write(&encoded).await {
                Ok(report) => {
                    session
                        .dispatcher()
                        .dispatch(Event::WriteCompleted(Box::new(report.clone())));
                    Ok(report)
                }
                Err(e) => {
                    tracing::warn!("write failed: {}", e);
                    session.dispatcher().dispatch(Event::WriteFailed {
                        message: e.to_string(),
                    });
                    Err(e)
                }
            }
        }))
    }
}

fn spawn_read<T: ReaderTransport + 'static>(
    session: Arc<TagSession<T>>,
    guard: OwnedMutexGuard<()>,
) -> JoinHandle<Result<ReadReport>> {
    tokio::spawn(async move {
        let _guard = guard;
        match session.read().await {
            Ok(report) => {
                tracing::info!("{}", report.message());
                session
                    .dispatcher()
                    .dispatch(Event::ReadCompleted(Box::new(report.clone())));
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("read failed: {}", e);
                session.dispatcher().dispatch(Event::ReadFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    })
}

async fn run_poll_loop<T: ReaderTransport + 'static>(
    session: Arc<TagSession<T>>,
    interval: Duration,
    read_lock: Option<Arc<Mutex<()>>>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow_and_update() {
            break;
        }

        let notifications = session.poll().await;

        if let Some(lock) = &read_lock {
            let detected = notifications
                .iter()
                .any(|n| matches!(n, Notification::TagDetected(_)));
            if detected {
                match Arc::clone(lock).try_lock_owned() {
                    Ok(guard) => drop(spawn_read(Arc::clone(&session), guard)),
                    Err(_) => tracing::debug!("read already running, skipping auto read"),
                }
            }
        }

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!("tag monitor stopped");
}

impl<T> Drop for TagMonitor<T> {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}
