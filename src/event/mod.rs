//! Event system for session notifications.
//!
//! The event system delivers state changes, tag detections, diagnostics and operation results to
//! any number of observers (typically a UI) without blocking the polling loop.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::session::{ReadReport, TagSessionState, WriteReport};
use crate::types::TagUid;

/// Event types that can be dispatched.
#[derive(Debug, Clone)]
pub enum Event {
    /// Session state changed. Only sent on transitions.
    StateChanged(TagSessionState),
    /// A tag came into range. Always follows the matching `StateChanged`.
    TagDetected(TagUid),
    /// Low-level status line; may repeat every poll.
    Diagnostic(String),
    /// A tag read finished.
    ReadCompleted(Box<ReadReport>),
    /// A tag read could not start or produced no data.
    ReadFailed { message: String },
    /// A tag write ran (possibly only partially, see the report).
    WriteCompleted(Box<WriteReport>),
    /// A tag write could not start.
    WriteFailed { message: String },
}

/// Event discriminant used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StateChanged,
    TagDetected,
    Diagnostic,
    ReadCompleted,
    ReadFailed,
    WriteCompleted,
    WriteFailed,
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StateChanged(_) => EventKind::StateChanged,
            Self::TagDetected(_) => EventKind::TagDetected,
            Self::Diagnostic(_) => EventKind::Diagnostic,
            Self::ReadCompleted(_) => EventKind::ReadCompleted,
            Self::ReadFailed { .. } => EventKind::ReadFailed,
            Self::WriteCompleted(_) => EventKind::WriteCompleted,
            Self::WriteFailed { .. } => EventKind::WriteFailed,
        }
    }

    /// Returns the short status line a UI would show for this event.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::StateChanged(state) => state.to_string(),
            Self::TagDetected(uid) => format!("Tag UID: {}", uid.spaced()),
            Self::Diagnostic(message) => message.clone(),
            Self::ReadCompleted(report) => report.message(),
            Self::WriteCompleted(report) => report.message(),
            Self::ReadFailed { message } => format!("Error during tag read: {message}"),
            Self::WriteFailed { message } => format!("Write failed: {message}"),
        }
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event, skipping over any the subscriber lagged behind on.
    ///
    /// Returns `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }

    /// Waits for the next event matching `filter`.
    pub async fn next_matching(&mut self, filter: &EventFilter) -> Option<Event> {
        loop {
            let event = self.recv().await?;
            if filter.matches(&event) {
                return Some(event);
            }
        }
    }
}

/// Subscription filter for specific event kinds.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Accepted kinds; `None` accepts everything.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Creates a filter for specific event kinds.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self { kinds: Some(kinds) }
    }

    /// Filter for the notifications the state machine emits.
    #[must_use]
    pub fn transitions() -> Self {
        Self::kinds(vec![EventKind::StateChanged, EventKind::TagDetected])
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.kinds
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&event.kind()))
    }
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: broadcast::Sender<Event>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Dispatches a diagnostic line.
    pub fn diagnostic(&self, message: impl Into<String>) {
        self.dispatch(Event::Diagnostic(message.into()));
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Waits for an event matching the filter with timeout.
    ///
    /// Only events dispatched after this call are seen. Returns `None` if the timeout expires or
    /// the channel is closed.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Option<Event> {
        let mut subscription = self.subscribe();
        tokio::time::timeout(timeout, subscription.next_matching(&filter))
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_dispatch() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe();

        dispatcher.dispatch(Event::StateChanged(TagSessionState::ReaderIdle));

        let event = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap();

        assert!(matches!(
            event,
            Some(Event::StateChanged(TagSessionState::ReaderIdle))
        ));
    }

    #[test]
    fn test_dispatch_without_subscribers() {
        let dispatcher = EventDispatcher::new(4);
        dispatcher.diagnostic("nobody listening");
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::transitions();

        assert!(filter.matches(&Event::StateChanged(TagSessionState::NoReader)));
        assert!(filter.matches(&Event::TagDetected(TagUid::from_bytes(&[1, 2, 3, 4]))));
        assert!(!filter.matches(&Event::Diagnostic("Using reader".into())));
        assert!(EventFilter::default().matches(&Event::Diagnostic(String::new())));
    }

    #[tokio::test]
    async fn test_next_matching_skips_diagnostics() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe();

        dispatcher.diagnostic("Using reader: Mock");
        dispatcher.dispatch(Event::StateChanged(TagSessionState::TagPresent));

        let event = sub.next_matching(&EventFilter::transitions()).await;
        assert!(matches!(
            event,
            Some(Event::StateChanged(TagSessionState::TagPresent))
        ));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_event_messages() {
        let uid = TagUid::from_bytes(&[0xAA, 0xBB]);
        assert_eq!(Event::TagDetected(uid).message(), "Tag UID: AA BB");
        assert_eq!(
            Event::StateChanged(TagSessionState::NoReader).message(),
            "NO NFC READER DETECTED"
        );
        assert_eq!(
            Event::WriteFailed {
                message: "no NFC reader found".into()
            }
            .message(),
            "Write failed: no NFC reader found"
        );
    }
}
