use std::fmt;

use crate::process::ProcessId;
use crate::resource::ResourceId;
use crate::Time;

/// Handle to an event owned by an `Environment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub(crate) usize);

impl EventId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event #{}", self.0)
    }
}

/// How a fired event resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

/// Observable lifecycle of an event. Fired states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Pending,
    Fired(Outcome),
}

impl EventState {
    pub fn is_pending(&self) -> bool {
        matches!(self, EventState::Pending)
    }

    pub fn is_fired(&self) -> bool {
        !self.is_pending()
    }
}

/// Constituents of an any-of composite that had fired when it resolved.
///
/// Entries keep the order the constituents were given in, so a caller
/// branching on membership sees a stable answer when several resolved in
/// the same instant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnyOfResult {
    fired: Vec<(EventId, Outcome)>,
}

impl AnyOfResult {
    pub(crate) fn new(fired: Vec<(EventId, Outcome)>) -> Self {
        AnyOfResult { fired }
    }

    pub fn contains(&self, event: EventId) -> bool {
        self.fired.iter().any(|(id, _)| *id == event)
    }

    pub fn outcome(&self, event: EventId) -> Option<Outcome> {
        self.fired
            .iter()
            .find(|(id, _)| *id == event)
            .map(|(_, outcome)| *outcome)
    }

    pub fn len(&self) -> usize {
        self.fired.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(EventId, Outcome)> {
        self.fired.iter()
    }
}

/// What an event represents
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EventKind {
    /// Fired explicitly or by `schedule`
    Plain,
    Timeout { due: Time },
    Request { resource: ResourceId },
    AnyOf {
        constituents: Vec<EventId>,
        result: Option<AnyOfResult>,
    },
}

/// Someone to notify once an event fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Waiter {
    Process(ProcessId),
    AnyOf(EventId),
}

#[derive(Debug)]
pub(crate) struct EventSlot {
    pub(crate) kind: EventKind,
    pub(crate) state: EventState,
    pub(crate) waiters: Vec<Waiter>,
    // Set once the waiters registered so far have been notified.
    pub(crate) notified: bool,
}

impl EventSlot {
    pub(crate) fn new(kind: EventKind) -> Self {
        EventSlot {
            kind,
            state: EventState::Pending,
            waiters: Vec::new(),
            notified: false,
        }
    }
}
