//! Heterogeneous message payloads (spec.md §9: "a single sum type covering
//! control + user variants").
//!
//! The clock and event queue are generic over whatever payload type is
//! scheduled; actors layer a small internal control vocabulary (ticks,
//! wake-ups) on top of the user's own message type `M` via [`Envelope`].

use std::fmt;

/// What kind of logical hop a message represents, for trace/stats purposes
/// (spec.md §4.3, §6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Fire-and-forget.
    Send,
    /// Fire-and-forget, semantically asynchronous.
    Cast,
    /// Request/response; the caller suspends until reply or timeout.
    Call,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Send => write!(f, "send"),
            MessageKind::Cast => write!(f, "cast"),
            MessageKind::Call => write!(f, "call"),
        }
    }
}

/// Internal control-plus-user envelope scheduled on the clock.
///
/// - `Tick` drives an actor's own send-pattern cadence
///   (`periodic`/`rate`/`burst`; spec.md §4.4).
/// - `Wake` is the `sleep(delay)` desugaring: "model as
///   `send_after(self, :wake, d)` + state-machine step" (spec.md §9).
/// - `CallTimeout` fires a pending `call`'s virtual-time timeout unless the
///   reply arrives first and cancels it (spec.md §5).
/// - `User` carries an application message, tagged with the kind under
///   which it was sent so stats/trace can record `send`/`cast`/`call`.
///   `call_id` correlates a `Call`-kind envelope with the
///   [`crate::engine::SimulationEngine`]'s pending-call table so a later
///   `Reply` can be routed back to the right waiter; `Send`/`Cast` leave it
///   `None`.
#[derive(Debug, Clone)]
pub enum Envelope<M> {
    Tick,
    Wake,
    CallTimeout { call_id: u64 },
    User {
        kind: MessageKind,
        payload: M,
        call_id: Option<u64>,
    },
}

impl<M> Envelope<M> {
    pub fn user(kind: MessageKind, payload: M) -> Self {
        Envelope::User {
            kind,
            payload,
            call_id: None,
        }
    }

    /// Builds a `call`-kind envelope correlated to `call_id` (spec.md §4.3,
    /// "a `send` plus a one-shot reply-expected timer").
    pub fn call(payload: M, call_id: u64) -> Self {
        Envelope::User {
            kind: MessageKind::Call,
            payload,
            call_id: Some(call_id),
        }
    }
}
