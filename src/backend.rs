//! Polymorphic time source (spec.md §4.1).
//!
//! Grounded in `kimberlite-sim`'s `adapters::clock::Clock` trait: generic
//! parameters on the hot path, not `&dyn TimeBackend` — monomorphization
//! means user code written against `TimeBackend` runs unchanged whether the
//! concrete backend is a [`VirtualClockBackend`] under simulation or a
//! [`RealTimeBackend`] in production.

use std::time::Instant;

use crate::clock::{Dispatch, DispatchOutcome, EventId, VirtualClock};
use crate::error::SimError;
use crate::name::ActorName;

/// Cancellation outcome, named rather than a bare `bool` (spec.md §4.2:
/// `cancel` returns `ok` or `not_found`, never raises).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotFound,
}

/// Time source abstraction consumed by [`crate::server::VirtualTimeServer`].
///
/// Selection of which backend to use is a construction-time choice; this
/// crate does not support swapping backends on a live instance (spec.md
/// §4.1: "changing backends at runtime is not supported within an active
/// simulation").
pub trait TimeBackend<M> {
    fn now(&self) -> u64;

    /// Schedules `message` for `target` after `delay_ms`. A negative delay
    /// is a caller bug, not a backend condition — reject it with
    /// [`SimError::BadDelay`] rather than silently clamping to zero.
    fn schedule_after(
        &mut self,
        delay_ms: u64,
        target: ActorName,
        message: M,
    ) -> Result<EventId, SimError>;

    fn cancel(&mut self, handle: EventId) -> CancelOutcome;
}

/// Backend that routes through a [`VirtualClock`] — the simulation path.
pub struct VirtualClockBackend<'a, M> {
    clock: &'a mut VirtualClock<M>,
}

impl<'a, M> VirtualClockBackend<'a, M> {
    pub fn new(clock: &'a mut VirtualClock<M>) -> Self {
        Self { clock }
    }

    /// Advances the underlying clock, delegating dispatch to `dispatcher`.
    /// Exposed here (rather than only via `VirtualClock` directly) so code
    /// written purely against the backend can still drive a simulation.
    pub fn advance(&mut self, duration_ms: u64, dispatcher: &mut impl Dispatch<M>) -> u64 {
        self.clock.advance(duration_ms, dispatcher)
    }
}

impl<M> TimeBackend<M> for VirtualClockBackend<'_, M> {
    fn now(&self) -> u64 {
        self.clock.now()
    }

    fn schedule_after(
        &mut self,
        delay_ms: u64,
        target: ActorName,
        message: M,
    ) -> Result<EventId, SimError> {
        Ok(self.clock.schedule_after(delay_ms, target, message))
    }

    fn cancel(&mut self, handle: EventId) -> CancelOutcome {
        if self.clock.cancel(handle) {
            CancelOutcome::Cancelled
        } else {
            CancelOutcome::NotFound
        }
    }
}

/// Backend that uses the host wall clock. Outside the simulation's scope
/// of responsibility (spec.md §1, "Non-goals: no real-time wall-clock
/// scheduling is provided by the core"); kept as a thin sketch so code
/// written against [`TimeBackend`] can run unmodified outside a simulation,
/// the same way `kimberlite-sim`'s `adapters::clock::SystemClock` is kept
/// as an architectural sketch alongside `SimClock`.
///
/// `schedule_after`/`cancel` are unimplemented here: wiring real delayed
/// delivery requires an executor (a thread, `tokio`, etc.) that this crate
/// deliberately does not provide.
pub struct RealTimeBackend {
    start: Instant,
}

impl RealTimeBackend {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for RealTimeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> TimeBackend<M> for RealTimeBackend {
    fn now(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn schedule_after(
        &mut self,
        _delay_ms: u64,
        _target: ActorName,
        _message: M,
    ) -> Result<EventId, SimError> {
        unimplemented!(
            "RealTimeBackend has no executor; plug in a real scheduler outside this crate"
        )
    }

    fn cancel(&mut self, _handle: EventId) -> CancelOutcome {
        CancelOutcome::NotFound
    }
}
