use std::fmt;

use crate::error::Result;
use crate::event::EventId;
use crate::scheduler::Environment;

/// Handle to a process spawned into an `Environment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub(crate) usize);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "process #{}", self.0)
    }
}

/// Why a process is being resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// First resumption after `spawn`
    Start,
    /// The event the process was waiting on has fired
    Fired(EventId),
}

/// What a process does after a resumption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend until the event fires
    Wait(EventId),
    /// Nothing left to do
    Done,
}

/// A cooperative unit of control driven by the environment.
///
/// Implementors are explicit state machines: `resume` runs the logic up to the
/// next suspension point and returns it. The environment never resumes a
/// process except through `resume`, and only one process runs at a time, so a
/// process may freely schedule events, fire them, and request or release
/// resources while it holds control.
///
/// `S` is the state shared by every process in the environment.
pub trait Process<S> {
    fn name(&self) -> &str;

    fn resume(&mut self, env: &mut Environment<S>, wake: Wake) -> Result<Step>;
}
