//! The stateful callback-driven process (spec.md §4.3).
//!
//! `init → (handle_call | handle_cast | handle_info)* → terminate`, the
//! same request-handling lifecycle `kimberlite-vsr`'s replica state machine
//! follows, except time-affecting primitives (`now`, `send_after`, `sleep`)
//! are rerouted through a [`TimeBackend`] instead of the host OS clock.

use crate::backend::{CancelOutcome, TimeBackend};
use crate::clock::EventId;
use crate::error::SimError;
use crate::message::{Envelope, MessageKind};
use crate::name::ActorName;

/// The sum type every callback returns (spec.md §4.3).
///
/// Dynamic dispatch is deliberate here, unlike [`crate::clock::VirtualClock`]:
/// spec.md §9's first Design Notes row calls out per-actor behavior as
/// needing a trait/interface reference, not a hot-path generic, since each
/// actor's callback closures differ in captured state and there is no
/// shared concrete type to monomorphize over.
pub enum StepOutcome<S, M> {
    /// No outgoing effects.
    Ok(S),
    /// Enqueue messages for immediate delivery (scheduled at current `now`).
    Send(S, Vec<(ActorName, M)>),
    /// Enqueue messages for delivery at `now + delay_ms`.
    SendAfter(S, u64, Vec<(ActorName, M)>),
    /// Reply to a pending `call`.
    Reply(S, M),
    /// The callback rejected the message; recorded as `handler_failure`
    /// against the actor. `advance` continues — one actor's failure must
    /// never corrupt the clock or other actors (spec.md §7).
    Error(S, String),
}

/// Polymorphic per-actor behavior (spec.md §9, row 1).
///
/// All four hooks take `state` by value and return it (wrapped in a
/// [`StepOutcome`] for the message hooks) rather than `&mut self`, mirroring
/// the functional, no-hidden-mutation style of the callback contract in
/// spec.md §6.2.
pub trait ActorBehavior<S, M> {
    fn init(&mut self) -> Result<S, SimError>;
    fn handle_cast(&mut self, message: M, state: S) -> StepOutcome<S, M>;
    fn handle_call(&mut self, message: M, state: S) -> StepOutcome<S, M>;
    fn handle_info(&mut self, message: M, state: S) -> StepOutcome<S, M>;
    fn terminate(&mut self, _state: &S) {}
}

/// A stateful process whose timer primitives are bound to one
/// [`TimeBackend`] for its whole lifetime (spec.md §4.3: "A server is
/// associated with one clock reference at construction").
pub struct VirtualTimeServer<S> {
    pub(crate) name: ActorName,
    pub(crate) state: Option<S>,
    pending_timers: Vec<EventId>,
}

impl<S> VirtualTimeServer<S> {
    pub fn new(name: ActorName, state: S) -> Self {
        Self {
            name,
            state: Some(state),
            pending_timers: Vec::new(),
        }
    }

    pub fn name(&self) -> &ActorName {
        &self.name
    }

    pub fn now<M>(&self, backend: &impl TimeBackend<M>) -> u64 {
        backend.now()
    }

    /// `send_after(target, message, delay)` per spec.md §4.3: delegates to
    /// the bound backend's `schedule_after`, and remembers the resulting
    /// handle so a later `cancel_timer` can find it.
    pub fn send_after<M>(
        &mut self,
        backend: &mut impl TimeBackend<M>,
        target: ActorName,
        message: M,
        delay_ms: u64,
    ) -> Result<EventId, SimError> {
        let handle = backend.schedule_after(delay_ms, target, message)?;
        self.pending_timers.push(handle);
        Ok(handle)
    }

    /// Cancels a previously scheduled timer obtained from `send_after`.
    pub fn cancel_timer<M>(&mut self, backend: &mut impl TimeBackend<M>, handle: EventId) -> CancelOutcome {
        self.pending_timers.retain(|h| *h != handle);
        backend.cancel(handle)
    }

    /// `sleep(delay)` desugars to scheduling a wake-up to self, per spec.md
    /// §9: "Model as `send_after(self, :wake, d)` + state-machine step" —
    /// there is no coroutine to truly suspend in a synchronous dispatch
    /// loop, so the caller's next `handle_info(Envelope::Wake, ..)` is the
    /// resumption point.
    pub fn sleep<M>(
        &mut self,
        backend: &mut impl TimeBackend<Envelope<M>>,
        delay_ms: u64,
    ) -> Result<EventId, SimError> {
        self.send_after(backend, self.name.clone(), Envelope::Wake, delay_ms)
    }
}

/// Stats counters private to one server until the engine collects them
/// (spec.md §5, "Shared-resource policy"). Kept separate from
/// [`crate::stats::Collector`], which is the engine-level aggregate across
/// all actors — this is the per-instance bookkeeping an actor could, in
/// principle, consult about itself mid-run.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub sent_count: u64,
    pub received_count: u64,
    pub first_send_time: Option<u64>,
    pub last_send_time: Option<u64>,
}

impl ServerStats {
    pub fn record_sent(&mut self, at_ms: u64) {
        self.sent_count += 1;
        self.first_send_time.get_or_insert(at_ms);
        self.last_send_time = Some(at_ms);
    }

    pub fn record_received(&mut self) {
        self.received_count += 1;
    }
}

/// Classifies how a message was sent, for the benefit of callers building
/// their own stats independent of the engine's `Collector`.
pub fn kind_of<M>(envelope: &Envelope<M>) -> Option<MessageKind> {
    match envelope {
        Envelope::User { kind, .. } => Some(*kind),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VirtualClockBackend;
    use crate::clock::VirtualClock;

    #[test]
    fn send_after_tracks_handle_for_cancellation() {
        let mut clock: VirtualClock<&str> = VirtualClock::new();
        let mut backend = VirtualClockBackend::new(&mut clock);
        let mut server = VirtualTimeServer::new(ActorName::from("srv"), ());

        let handle = server
            .send_after(&mut backend, ActorName::from("srv"), "wake", 100)
            .unwrap();
        assert_eq!(server.cancel_timer(&mut backend, handle), CancelOutcome::Cancelled);
        assert_eq!(server.cancel_timer(&mut backend, handle), CancelOutcome::NotFound);
    }

    #[test]
    fn server_stats_track_bounds() {
        let mut stats = ServerStats::default();
        stats.record_sent(100);
        stats.record_sent(300);
        assert_eq!(stats.sent_count, 2);
        assert_eq!(stats.first_send_time, Some(100));
        assert_eq!(stats.last_send_time, Some(300));
    }
}
