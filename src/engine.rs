//! The declarative simulation layer (spec.md §4.5): builds an actor graph,
//! drives the clock with duration- or predicate-based advancement, and
//! aggregates stats and trace.
//!
//! Grounded in `kimberlite-sim`'s split between the clock adapter (owns
//! time) and the harness that owns the registry of simulated components
//! (`adapters::scheduler` vs. the `Simulation` struct that drives it); here
//! that split is `VirtualClock` (clock/mod.rs, a standalone leaf) plus
//! `SimulationEngine` (this module, the only thing that implements
//! [`Dispatch`] and therefore the only thing that understands what an
//! [`ActorName`] target resolves to).

use std::collections::HashMap;

use crate::actor::{ActorDefinition, ReceiveBehaviorAdapter, SendPattern};
use crate::clock::{Dispatch, DispatchOutcome, EventId, VirtualClock};
use crate::error::SimError;
use crate::message::{Envelope, MessageKind};
use crate::name::ActorName;
use crate::server::{ActorBehavior, StepOutcome};
use crate::stats::{Collector, StatsSnapshot, TraceEvent};

/// Reserved target name for the engine's own bookkeeping messages
/// (`call` timeouts). Spec.md §9's Design Notes model these as a thin
/// control vocabulary layered over user messages; this is the one piece of
/// that vocabulary that needs a delivery *target* rather than routing
/// through an actor, since nothing else owns the pending-call table.
const ENGINE_SENTINEL: &str = "\u{0}__sim_engine__";

/// Erased per-actor outcome, with `state` (`S`) already folded back into
/// the handle — mirrors [`StepOutcome`] one level up, after the
/// [`ActorHandle`] trait object has hidden `S` from the engine.
enum HandleOutcome<M> {
    Ok,
    Send(Vec<(ActorName, Envelope<M>)>),
    SendAfter(u64, Vec<(ActorName, Envelope<M>)>),
    Reply(Envelope<M>),
    Error(String),
}

/// Object-safe wrapper around one actor's `(state, behavior)` pair, so the
/// engine's registry can hold actors of heterogeneous state types `S`
/// behind a single `HashMap<ActorName, Entry<M>>` keyed only on the wire
/// message type `M` (spec.md §9, "polymorphic behavior per actor ...
/// trait/interface reference").
trait ActorHandle<M> {
    fn init(&mut self) -> Result<(), SimError>;
    fn handle_cast(&mut self, message: Envelope<M>) -> HandleOutcome<M>;
    fn handle_call(&mut self, message: Envelope<M>) -> HandleOutcome<M>;
    fn handle_info(&mut self, message: Envelope<M>) -> HandleOutcome<M>;
    fn terminate(&mut self);
}

struct LiveActor<S, M, B> {
    state: Option<S>,
    behavior: B,
    _marker: std::marker::PhantomData<M>,
}

impl<S, M, B> LiveActor<S, M, B> {
    fn new(behavior: B) -> Self {
        Self {
            state: None,
            behavior,
            _marker: std::marker::PhantomData,
        }
    }

    fn apply(&mut self, outcome: StepOutcome<S, Envelope<M>>) -> HandleOutcome<M> {
        match outcome {
            StepOutcome::Ok(state) => {
                self.state = Some(state);
                HandleOutcome::Ok
            }
            StepOutcome::Send(state, msgs) => {
                self.state = Some(state);
                HandleOutcome::Send(msgs)
            }
            StepOutcome::SendAfter(state, delay_ms, msgs) => {
                self.state = Some(state);
                HandleOutcome::SendAfter(delay_ms, msgs)
            }
            StepOutcome::Reply(state, msg) => {
                self.state = Some(state);
                HandleOutcome::Reply(msg)
            }
            StepOutcome::Error(state, reason) => {
                self.state = Some(state);
                HandleOutcome::Error(reason)
            }
        }
    }
}

impl<S, M, B> ActorHandle<M> for LiveActor<S, M, B>
where
    B: ActorBehavior<S, Envelope<M>>,
{
    fn init(&mut self) -> Result<(), SimError> {
        self.state = Some(self.behavior.init()?);
        Ok(())
    }

    fn handle_cast(&mut self, message: Envelope<M>) -> HandleOutcome<M> {
        let state = self.state.take().expect("actor state missing between steps");
        let outcome = self.behavior.handle_cast(message, state);
        self.apply(outcome)
    }

    fn handle_call(&mut self, message: Envelope<M>) -> HandleOutcome<M> {
        let state = self.state.take().expect("actor state missing between steps");
        let outcome = self.behavior.handle_call(message, state);
        self.apply(outcome)
    }

    fn handle_info(&mut self, message: Envelope<M>) -> HandleOutcome<M> {
        let state = self.state.take().expect("actor state missing between steps");
        let outcome = self.behavior.handle_info(message, state);
        self.apply(outcome)
    }

    fn terminate(&mut self) {
        if let Some(state) = &self.state {
            self.behavior.terminate(state);
        }
    }
}

/// One registered actor: its dispatchable behavior, plus the declarative
/// fan-out data only the engine (not the behavior) needs to know about.
/// Foreign actors (`add_foreign`) carry `SendPattern::None` and no targets
/// — they are driven purely by the messages their behavior sends back,
/// never by a self-tick.
struct Entry<M> {
    handle: Box<dyn ActorHandle<M>>,
    targets: Vec<ActorName>,
    send_pattern: SendPattern<M>,
}

/// A call awaiting its reply (spec.md §4.3, §5).
struct PendingCall<M> {
    result: Option<M>,
    timeout_event: Option<EventId>,
}

/// Builds a population of actors, drives the clock, and collects stats and
/// trace (spec.md §4.5).
///
/// Exclusively owns its clock and actor registry (spec.md §3,
/// "Ownership"). Actors resolve each other only by [`ActorName`] through
/// this registry, never by a direct reference — the same non-tree-reference
/// strategy spec.md §9 prescribes for cyclic actor graphs.
pub struct SimulationEngine<M> {
    clock: VirtualClock<Envelope<M>>,
    core: EngineCore<M>,
}

/// Everything [`SimulationEngine`] owns *except* the clock, split out so
/// `clock.advance(duration, &mut core)` can borrow the two fields
/// independently — [`VirtualClock::advance`] needs `&mut self.clock` and
/// `&mut impl Dispatch<_>` simultaneously, which a single `&mut self` on
/// one struct could not provide.
struct EngineCore<M> {
    actors: HashMap<ActorName, Entry<M>>,
    collector: Collector<M>,
    next_call_id: u64,
    pending_calls: HashMap<u64, PendingCall<M>>,
}

impl<M> EngineCore<M>
where
    M: Clone,
{
    fn enqueue_sends(
        &mut self,
        now_ms: u64,
        from: &ActorName,
        delay_ms: u64,
        msgs: Vec<(ActorName, Envelope<M>)>,
    ) -> DispatchOutcome<Envelope<M>> {
        let mut schedule = Vec::with_capacity(msgs.len());
        for (to, envelope) in msgs {
            if let Envelope::User { kind, ref payload, .. } = envelope {
                self.collector
                    .record_send(now_ms, from, &to, kind, payload.clone());
            }
            schedule.push((delay_ms, to, envelope));
        }
        DispatchOutcome {
            schedule,
            cancel: Vec::new(),
        }
    }

    /// Folds a [`HandleOutcome`] into the clock-level effects `advance`
    /// applies, completing a pending call when the outcome is a `Reply`
    /// correlated to one (spec.md §5: "if the reply arrives first, the
    /// timeout is cancelled").
    fn apply_handle_outcome(
        &mut self,
        now_ms: u64,
        from: &ActorName,
        outcome: HandleOutcome<M>,
        reply_call_id: Option<u64>,
    ) -> DispatchOutcome<Envelope<M>> {
        match outcome {
            HandleOutcome::Ok => DispatchOutcome::none(),
            HandleOutcome::Error(reason) => {
                tracing::warn!(actor = %from, reason, "handler_failure");
                DispatchOutcome::none()
            }
            HandleOutcome::Send(msgs) => self.enqueue_sends(now_ms, from, 0, msgs),
            HandleOutcome::SendAfter(delay_ms, msgs) => {
                self.enqueue_sends(now_ms, from, delay_ms, msgs)
            }
            HandleOutcome::Reply(envelope) => {
                let Some(call_id) = reply_call_id else {
                    return DispatchOutcome::none();
                };
                let Envelope::User { payload, .. } = envelope else {
                    return DispatchOutcome::none();
                };
                let cancel = self
                    .pending_calls
                    .get_mut(&call_id)
                    .and_then(|pending| {
                        pending.result = Some(payload);
                        pending.timeout_event.take()
                    })
                    .into_iter()
                    .collect();
                DispatchOutcome {
                    schedule: Vec::new(),
                    cancel,
                }
            }
        }
    }
}

impl<M> Dispatch<Envelope<M>> for EngineCore<M>
where
    M: Clone,
{
    fn dispatch(
        &mut self,
        now_ms: u64,
        target: &ActorName,
        message: Envelope<M>,
    ) -> DispatchOutcome<Envelope<M>> {
        if target.as_str() == ENGINE_SENTINEL {
            if let Envelope::CallTimeout { call_id } = message {
                if let Some(pending) = self.pending_calls.get_mut(&call_id) {
                    pending.timeout_event = None;
                }
            }
            return DispatchOutcome::none();
        }

        let Some(entry) = self.actors.get_mut(target) else {
            tracing::warn!(%target, "dispatch to unregistered actor, dropping");
            return DispatchOutcome::none();
        };

        match message {
            Envelope::Tick => {
                let targets = entry.targets.clone();
                let fanout = entry.send_pattern.fanout();
                let mut schedule = Vec::new();
                for to in &targets {
                    for payload in &fanout {
                        self.collector
                            .record_send(now_ms, target, to, MessageKind::Send, payload.clone());
                        schedule.push((0, to.clone(), Envelope::user(MessageKind::Send, payload.clone())));
                    }
                }
                if let Some(interval_ms) = entry.send_pattern.interval_ms() {
                    schedule.push((interval_ms, target.clone(), Envelope::Tick));
                }
                DispatchOutcome {
                    schedule,
                    cancel: Vec::new(),
                }
            }
            Envelope::User { kind, payload, call_id } => {
                self.collector.record_received(target);
                let envelope = Envelope::User { kind, payload, call_id };
                let outcome = match kind {
                    MessageKind::Cast => entry.handle.handle_cast(envelope),
                    MessageKind::Call => entry.handle.handle_call(envelope),
                    MessageKind::Send => entry.handle.handle_info(envelope),
                };
                self.apply_handle_outcome(now_ms, target, outcome, call_id)
            }
            Envelope::Wake => {
                let outcome = entry.handle.handle_info(Envelope::Wake);
                self.apply_handle_outcome(now_ms, target, outcome, None)
            }
            Envelope::CallTimeout { call_id } => {
                let outcome = entry.handle.handle_info(Envelope::CallTimeout { call_id });
                self.apply_handle_outcome(now_ms, target, outcome, None)
            }
        }
    }
}

/// Outcome of one `run_for`/`run_until` call (spec.md §4.5, §4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub actual_duration_ms: u64,
    pub terminated_early: bool,
}

impl<M> SimulationEngine<M>
where
    M: Clone + 'static,
{
    /// `new({trace: bool}) -> sim` (spec.md §4.5).
    pub fn new(trace_enabled: bool) -> Self {
        Self {
            clock: VirtualClock::new(),
            core: EngineCore {
                actors: HashMap::new(),
                collector: Collector::new(trace_enabled),
                next_call_id: 0,
                pending_calls: HashMap::new(),
            },
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Registers a declarative actor (spec.md §4.5, `add_actor`). The first
    /// tick (if the pattern self-schedules one) fires at `now + interval`,
    /// per the delayed-first-fire choice documented on
    /// [`crate::actor::SendPattern::Periodic`].
    pub fn add_actor<S>(
        &mut self,
        name: impl Into<ActorName>,
        definition: ActorDefinition<S, M>,
    ) -> Result<(), SimError>
    where
        S: 'static,
    {
        let name = name.into();
        if self.core.actors.contains_key(&name) {
            return Err(SimError::DuplicateActor(name));
        }

        let targets = definition.targets.clone();
        let send_pattern = definition.send_pattern.clone();
        let mut live = LiveActor::new(ReceiveBehaviorAdapter::new(definition));
        live.init()?;

        self.core.actors.insert(
            name.clone(),
            Entry {
                handle: Box::new(live),
                targets,
                send_pattern: send_pattern.clone(),
            },
        );

        if let Some(interval_ms) = send_pattern.interval_ms() {
            self.clock.schedule_after(interval_ms, name, Envelope::Tick);
        }
        Ok(())
    }

    /// Registers a caller-supplied [`ActorBehavior`] that shares this
    /// simulation's clock without going through the declarative send-pattern
    /// DSL (spec.md §4.5, `add_foreign` — "testing real server code
    /// side-by-side with simulated actors").
    pub fn add_foreign<S>(
        &mut self,
        name: impl Into<ActorName>,
        behavior: impl ActorBehavior<S, Envelope<M>> + 'static,
    ) -> Result<(), SimError>
    where
        S: 'static,
    {
        let name = name.into();
        if self.core.actors.contains_key(&name) {
            return Err(SimError::DuplicateActor(name));
        }

        let mut live = LiveActor::new(behavior);
        live.init()?;
        self.core.actors.insert(
            name,
            Entry {
                handle: Box::new(live),
                targets: Vec::new(),
                send_pattern: SendPattern::None,
            },
        );
        Ok(())
    }

    /// Seeds an external stimulus: schedules `message` for delivery to
    /// `target` at `now + delay_ms`, as a `send`, without going through
    /// another actor's outbound effects. Used to kick off an actor graph
    /// whose members only react to messages (spec.md §6.1: the
    /// programmatic API accepts "plain data records" as inputs; this is
    /// how a test driver supplies the first one).
    pub fn send_after(
        &mut self,
        target: impl Into<ActorName>,
        message: M,
        delay_ms: u64,
    ) -> Result<(), SimError> {
        let target = target.into();
        if !self.core.actors.contains_key(&target) {
            return Err(SimError::UnknownActor(target));
        }
        self.clock
            .schedule_after(delay_ms, target, Envelope::user(MessageKind::Send, message));
        Ok(())
    }

    /// Request/response against a registered actor (spec.md §4.3: "a `send`
    /// plus a one-shot reply-expected timer whose expiry signals timeout").
    /// Drives the clock itself, so it may be called between (or instead of)
    /// `run_for`/`run_until`.
    pub fn call(
        &mut self,
        target: impl Into<ActorName>,
        message: M,
        timeout_ms: u64,
    ) -> Result<M, SimError> {
        let target = target.into();
        if !self.core.actors.contains_key(&target) {
            return Err(SimError::UnknownActor(target));
        }

        let call_id = self.core.next_call_id;
        self.core.next_call_id += 1;

        let deadline_ms = self.clock.now() + timeout_ms;
        let timeout_event = self.clock.schedule_after(
            timeout_ms,
            ActorName::from(ENGINE_SENTINEL),
            Envelope::CallTimeout { call_id },
        );
        self.core.pending_calls.insert(
            call_id,
            PendingCall {
                result: None,
                timeout_event: Some(timeout_event),
            },
        );
        self.clock
            .schedule_after(0, target.clone(), Envelope::call(message, call_id));

        // Drive the clock event-by-event up to `deadline_ms` instead of
        // jumping straight there in one `advance`, so a call whose reply
        // (and timeout cancellation) arrives before the deadline doesn't
        // burn the rest of `timeout_ms` of virtual time (spec.md §5: "if
        // the reply arrives first, the timeout is cancelled"). Stepping to
        // the next actually-pending event, rather than polling on a fixed
        // interval, means we never overshoot the moment the call resolves.
        loop {
            let resolved = self
                .core
                .pending_calls
                .get(&call_id)
                .is_some_and(|pending| pending.result.is_some());
            if resolved {
                break;
            }
            let next_ms = self
                .clock
                .next_event_time()
                .map_or(deadline_ms, |t| t.min(deadline_ms));
            self.clock.advance_until(next_ms, &mut self.core);
            if self.clock.now() >= deadline_ms {
                break;
            }
        }

        let pending = self
            .core
            .pending_calls
            .remove(&call_id)
            .expect("pending call removed by someone other than the caller");
        match pending.result {
            Some(reply) => Ok(reply),
            None => Err(SimError::CallTimeout { target, timeout_ms }),
        }
    }

    /// Fixed-duration mode (spec.md §4.5.1): advances once and reports
    /// exactly `duration_ms` as `actual_duration_ms`.
    pub fn run_for(&mut self, duration_ms: u64) -> RunReport {
        self.core.collector.set_start_time(self.clock.now());
        self.clock.advance(duration_ms, &mut self.core);
        self.core.collector.set_end_time(self.clock.now());
        RunReport {
            actual_duration_ms: duration_ms,
            terminated_early: false,
        }
    }

    /// Condition-checked mode (spec.md §4.5.1): advances in
    /// `check_interval_ms` steps, evaluating `terminate_when` against a
    /// *live* stats snapshot after each step so the predicate observes
    /// effects that have already occurred.
    pub fn run_until(
        &mut self,
        max_duration_ms: u64,
        check_interval_ms: u64,
        terminate_when: impl Fn(&StatsSnapshot) -> bool,
    ) -> RunReport {
        assert!(check_interval_ms > 0, "check_interval_ms must be positive");

        let start = self.clock.now();
        self.core.collector.set_start_time(start);
        let target = start + max_duration_ms;

        loop {
            let remaining = target.saturating_sub(self.clock.now());
            let step = remaining.min(check_interval_ms);
            self.clock.advance(step, &mut self.core);
            self.core.collector.set_end_time(self.clock.now());

            let snapshot = self.core.collector.snapshot();
            if terminate_when(&snapshot) {
                return RunReport {
                    actual_duration_ms: self.clock.now() - start,
                    terminated_early: true,
                };
            }
            if self.clock.now() >= target {
                return RunReport {
                    actual_duration_ms: self.clock.now() - start,
                    terminated_early: false,
                };
            }
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.core.collector.snapshot()
    }

    pub fn trace(&self) -> &[TraceEvent<M>] {
        self.core.collector.trace()
    }

    /// Cancels all outstanding timers and drops pending messages, then
    /// terminates every registered actor (spec.md §5, §4.5). Simplified
    /// relative to a multi-threaded actor runtime's "join actor workers"
    /// step: this crate's actors are plain Rust values dispatched
    /// synchronously on the caller's stack, so there are no worker threads
    /// to join (spec.md §1, "not a general-purpose multi-threaded
    /// work-stealing runtime").
    pub fn stop(&mut self) {
        self.clock.clear();
        for (_, mut entry) in self.core.actors.drain() {
            entry.handle.terminate();
        }
        self.core.pending_calls.clear();
    }
}
