//! Reader/tag presence state machine.
//!
//! The transition logic is a pure function of the previous state and one poll's observation, so
//! it can be exercised without hardware. [`TagSession`](super::TagSession) feeds it observations
//! and publishes what comes out.

use std::fmt;

use crate::types::TagUid;

/// Observed presence of reader and tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagSessionState {
    /// No reader is attached.
    NoReader,
    /// A reader is attached but no readable tag is in range.
    ReaderIdle,
    /// A tag answered the UID request.
    TagPresent,
}

impl TagSessionState {
    /// Returns the numeric state code used by status displays (0, 1, 2).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::NoReader => 0,
            Self::ReaderIdle => 1,
            Self::TagPresent => 2,
        }
    }
}

impl fmt::Display for TagSessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NoReader => "NO NFC READER DETECTED",
            Self::ReaderIdle => "NFC READER ONLINE",
            Self::TagPresent => "NFC TAG DETECTED",
        })
    }
}

/// What one poll saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    NoReader,
    ReaderIdle,
    TagPresent(TagUid),
}

impl Observation {
    /// Returns the state this observation maps to.
    #[must_use]
    pub const fn state(&self) -> TagSessionState {
        match self {
            Self::NoReader => TagSessionState::NoReader,
            Self::ReaderIdle => TagSessionState::ReaderIdle,
            Self::TagPresent(_) => TagSessionState::TagPresent,
        }
    }

    /// Returns the UID if a tag was seen.
    #[must_use]
    pub const fn uid(&self) -> Option<&TagUid> {
        match self {
            Self::TagPresent(uid) => Some(uid),
            _ => None,
        }
    }
}

/// Edge-triggered notification produced by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    StateChanged(TagSessionState),
    TagDetected(TagUid),
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Last observed state; `None` before the first poll.
    pub state: Option<TagSessionState>,
    /// UID from the latest poll, while a tag is present.
    pub uid: Option<TagUid>,
}

impl SessionSnapshot {
    /// Snapshot before the first poll.
    #[must_use]
    pub const fn initial() -> Self {
        Self {
            state: None,
            uid: None,
        }
    }

    /// Returns true if the last poll found a tag.
    #[must_use]
    pub fn tag_present(&self) -> bool {
        self.state == Some(TagSessionState::TagPresent)
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

/// Computes the next state and the notifications to emit.
///
/// A `StateChanged` is produced only when the state differs from `previous`. A `TagDetected`
/// is produced only on the transition into `TagPresent`, and always after the `StateChanged`
/// for that transition.
#[must_use]
pub fn transition(
    previous: Option<TagSessionState>,
    observation: &Observation,
) -> (TagSessionState, Vec<Notification>) {
    let next = observation.state();
    if previous == Some(next) {
        return (next, Vec::new());
    }

    let mut notifications = vec![Notification::StateChanged(next)];
    if let Some(uid) = observation.uid() {
        notifications.push(Notification::TagDetected(uid.clone()));
    }
    (next, notifications)
}

/// Holds the last observed state between polls.
#[derive(Debug, Default)]
pub struct StateMachine {
    snapshot: SessionSnapshot,
}

impl StateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one observation.
    pub fn apply(&mut self, observation: Observation) -> Vec<Notification> {
        let (next, notifications) = transition(self.snapshot.state, &observation);
        self.snapshot.state = Some(next);
        self.snapshot.uid = match observation {
            Observation::TagPresent(uid) => Some(uid),
            _ => None,
        };
        notifications
    }

    #[must_use]
    pub const fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }
}
