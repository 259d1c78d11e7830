//! Error taxonomy for the simulation runtime (spec.md §7).

use thiserror::Error;

use crate::name::ActorName;

/// Errors raised by the clock, the time backend, and the simulation engine.
///
/// `cancel` of an unknown or already-fired handle is deliberately *not*
/// represented here — spec.md §7 classifies it as a returned value
/// (`CancelOutcome::NotFound`), not a raised error.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("negative delay passed to schedule_after: {delay_ms}ms")]
    BadDelay { delay_ms: i64 },

    #[error("actor {name} handler failed: {message}")]
    HandlerFailure { name: ActorName, message: String },

    #[error("call to {target} timed out after {timeout_ms}ms")]
    CallTimeout { target: ActorName, timeout_ms: u64 },

    #[error("advance() called while another advance is already in flight")]
    AdvanceWhileAdvancing,

    #[error("no actor registered under the name {0}")]
    UnknownActor(ActorName),

    #[error("an actor named {0} is already registered")]
    DuplicateActor(ActorName),
}
