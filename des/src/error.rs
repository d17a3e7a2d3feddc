use thiserror::Error;

use crate::event::EventId;
use crate::resource::ResourceId;
use crate::Time;

/// Failures raised by the simulation engine.
///
/// All of these indicate a logic error in the engine or in a process built on
/// top of it. None of them are recoverable: `Environment::run` stops at the
/// first one and hands it back to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("cannot schedule at t={at}, before now (t={now})")]
    InvalidTime { at: Time, now: Time },

    #[error("{0} has already fired")]
    DoubleFire(EventId),

    #[error("{0} does not hold its resource")]
    NotHeld(EventId),

    #[error("{0} is not an event of this environment")]
    UnknownEvent(EventId),

    #[error("{0} is not a resource of this environment")]
    UnknownResource(ResourceId),

    #[error("{0} is not a resource request")]
    NotARequest(EventId),

    #[error("resource capacity must be positive, got {0}")]
    InvalidCapacity(usize),

    #[error("any-of needs at least two events, got {0}")]
    InvalidCondition(usize),

    #[error("process {name} failed: {message}")]
    Process { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, SimError>;
