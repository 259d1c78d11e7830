//! The virtual clock: a centralized scheduler advancing virtual time under
//! a strict quiescence protocol (spec.md §3, §4.2).
//!
//! Grounded in `kimberlite-sim`'s `Simulation`/`EventQueue` pair, but split
//! so the clock itself never touches actor/registry concerns — dispatch is
//! handed to a caller-supplied [`Dispatch`] sink, the same separation
//! `kimberlite-sim`'s `Scheduler`/`Clock` adapter traits draw between "owns
//! the queue" and "decides what a popped event means".

mod event;

pub use event::{Event, EventId, EventQueue};

use crate::name::ActorName;

/// What a [`Dispatch::dispatch`] call asks the clock to do in response to
/// one delivered message: enqueue more events, cancel others, or both.
///
/// `dispatch` returns this instead of calling back into the clock directly
/// — the clock is exclusively borrowed for the duration of `advance`, so a
/// dispatcher (which is typically the same object that *owns* the clock,
/// e.g. `SimulationEngine`) has no `&mut VirtualClock` of its own to call
/// `schedule_after`/`cancel` on mid-tick. Returning the desired effects lets
/// `advance`'s loop apply them to the queue it already holds, which is what
/// makes "a handler reschedules itself" (spec.md §4.2, tie-breaks) and "a
/// reply cancels its call's timeout" (spec.md §5) both expressible without
/// interior mutability.
#[derive(Debug)]
pub struct DispatchOutcome<M> {
    pub schedule: Vec<(u64, ActorName, M)>,
    pub cancel: Vec<EventId>,
}

impl<M> DispatchOutcome<M> {
    pub fn none() -> Self {
        Self {
            schedule: Vec::new(),
            cancel: Vec::new(),
        }
    }

    pub fn schedule(delay_ms: u64, target: ActorName, message: M) -> Self {
        Self {
            schedule: vec![(delay_ms, target, message)],
            cancel: Vec::new(),
        }
    }
}

impl<M> Default for DispatchOutcome<M> {
    fn default() -> Self {
        Self::none()
    }
}

/// Receives events popped by [`VirtualClock::advance`], and returns whatever
/// new scheduling/cancellation that delivery provokes.
///
/// `delay_ms` in a returned schedule entry is relative to the `now_ms` the
/// dispatch call was made at, exactly like [`VirtualClock::schedule_after`].
/// A dispatcher whose own effect is "nothing" returns
/// [`DispatchOutcome::none`]; the clock's `advance` loop re-polls the queue
/// after applying a dispatch's effects, so a dispatcher that schedules a
/// follow-up at `now + 0` is visited again before `advance` returns, as long
/// as that event's timestamp is still within the requested window (spec.md
/// §4.2, "Tie-breaks").
pub trait Dispatch<M> {
    fn dispatch(&mut self, now_ms: u64, target: &ActorName, message: M) -> DispatchOutcome<M>;
}

/// One of `{idle, advancing}` (spec.md §3). Only one `advance` may be in
/// flight; nested or concurrent calls are rejected rather than silently
/// serialized, matching spec.md §7's `advance_while_advancing` taxonomy
/// entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdvanceState {
    Idle,
    Advancing,
}

/// Discrete-event virtual clock. `now` only moves forward, and only in
/// response to `advance`/`advance_until` — never on its own.
pub struct VirtualClock<M> {
    now_ms: u64,
    events: EventQueue<M>,
    state: AdvanceState,
}

impl<M> VirtualClock<M> {
    /// A new clock at `now = 0` with an empty queue.
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            events: EventQueue::new(),
            state: AdvanceState::Idle,
        }
    }

    pub fn now(&self) -> u64 {
        self.now_ms
    }

    /// Schedules `message` for `target` at `now + delay_ms`.
    ///
    /// `delay_ms == 0` is permitted and means "deliver at the current
    /// `now`" (spec.md §4.2).
    pub fn schedule_after(&mut self, delay_ms: u64, target: ActorName, message: M) -> EventId {
        let time_ms = self.now_ms + delay_ms;
        tracing::trace!(now = self.now_ms, time_ms, target = %target, "schedule_after");
        self.events.schedule(time_ms, target, message)
    }

    /// Schedules `message` for `target` at the absolute time `time_ms`.
    ///
    /// `time_ms` must be `>= now()`; callers that only know a delay should
    /// use [`Self::schedule_after`] instead.
    pub fn schedule_at(&mut self, time_ms: u64, target: ActorName, message: M) -> EventId {
        debug_assert!(time_ms >= self.now_ms, "cannot schedule into the past");
        self.events.schedule(time_ms, target, message)
    }

    /// Cancels a previously scheduled event. Idempotent; cancelling an
    /// unknown or already-fired handle returns `false` rather than erroring
    /// (spec.md §7: `not_found` is a returned value, not a raised error).
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.events.cancel(id)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, AdvanceState::Idle)
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// The timestamp of the earliest non-cancelled pending event, if any,
    /// without dispatching it. Lets a caller that drives `advance_until`
    /// itself (e.g. [`crate::engine::SimulationEngine::call`]) step exactly
    /// to the next point where anything could change, rather than jumping
    /// straight to a fixed target and potentially overshooting it.
    pub fn next_event_time(&self) -> Option<u64> {
        self.events.next_time()
    }

    /// Drops every pending event without moving `now`. Used by
    /// [`crate::engine::SimulationEngine::stop`] to cancel all outstanding
    /// timers and pending messages in one idempotent step (spec.md §5)
    /// rather than cancelling handles one at a time.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Advances virtual time by `duration_ms`, dispatching every event with
    /// `timestamp <= now + duration_ms` to `dispatcher`, in
    /// `(timestamp, seq)` order. Returns the new `now`.
    ///
    /// Dispatch is synchronous: a handler that asks for further scheduling
    /// via its returned [`DispatchOutcome`] is visited again in the same
    /// `advance` call if the new event still falls within the window.
    /// Because dispatch never returns control to an external scheduler
    /// mid-tick, there is no patience window here — quiescence is detected
    /// the instant the queue has nothing left at or before the target time
    /// (spec.md §9: "where dispatch is synchronous, quiescence should
    /// collapse to zero extra waiting").
    ///
    /// # Panics
    /// Panics if called while another `advance` on this clock is already in
    /// flight (re-entrant `advance`, e.g. from inside a `dispatch` call).
    /// Callers that might legitimately attempt this should check
    /// [`Self::is_idle`] first and surface
    /// [`SimError::AdvanceWhileAdvancing`](crate::error::SimError::AdvanceWhileAdvancing)
    /// instead of panicking.
    pub fn advance(&mut self, duration_ms: u64, dispatcher: &mut impl Dispatch<M>) -> u64 {
        self.advance_until(self.now_ms + duration_ms, dispatcher)
    }

    /// Advances virtual time to the absolute target `target_ms`, which must
    /// be `>= now()`. See [`Self::advance`] for the dispatch contract.
    pub fn advance_until(&mut self, target_ms: u64, dispatcher: &mut impl Dispatch<M>) -> u64 {
        assert!(
            self.state == AdvanceState::Idle,
            "advance() called while another advance is already in flight"
        );
        debug_assert!(target_ms >= self.now_ms, "cannot advance into the past");
        self.state = AdvanceState::Advancing;

        let span = tracing::debug_span!("advance", from = self.now_ms, target_ms);
        let _enter = span.enter();

        while let Some(next_ms) = self.events.next_time() {
            if next_ms > target_ms {
                break;
            }
            let event = self
                .events
                .pop()
                .expect("next_time() returned Some but pop() found nothing");
            self.now_ms = self.now_ms.max(event.time_ms);
            tracing::trace!(now = self.now_ms, target = %event.target, "dispatch");
            let effects = dispatcher.dispatch(self.now_ms, &event.target, event.message);
            for id in effects.cancel {
                self.events.cancel(id);
            }
            for (delay_ms, target, message) in effects.schedule {
                let time_ms = self.now_ms + delay_ms;
                self.events.schedule(time_ms, target, message);
            }
        }

        self.now_ms = target_ms;
        self.state = AdvanceState::Idle;
        tracing::debug!(now = self.now_ms, "advance complete");
        self.now_ms
    }
}

impl<M> Default for VirtualClock<M> {
    fn default() -> Self {
        Self::new()
    }
}
