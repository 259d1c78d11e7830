//! Declarative send patterns and receive behaviors (spec.md §4.4).
//!
//! An `Actor` in spec.md's data model is a [`crate::server::VirtualTimeServer`]
//! plus a `name`, an immutable `definition`, and an optional self-timer
//! handle; the engine (`engine.rs`) owns the live combination of those
//! three. This module only defines the declarative pieces: what cadence an
//! actor sends on, and how it reacts to what it receives.

use crate::error::SimError;
use crate::message::{Envelope, MessageKind};
use crate::name::ActorName;
use crate::server::{ActorBehavior, StepOutcome};

/// A declarative cadence for an actor's outbound traffic (spec.md §4.4).
///
/// The first tick for `Periodic`/`Rate`/`Burst` fires at `now + interval`,
/// not at `now` — spec.md §9 flags this as ambiguous across the source
/// fixtures it was distilled from and asks implementers to pick one
/// explicitly. Delayed-first-fire is chosen here because it is what makes
/// the literal scenario in spec.md §8 ("interval 100 ms ... after
/// advance(1000): sent_count = 10") come out to exactly 10, not 11.
#[derive(Clone)]
pub enum SendPattern<M> {
    /// Receive-only; never self-schedules a tick.
    None,
    /// Emit `message` to every target every `interval_ms`.
    Periodic { interval_ms: u64, message: M },
    /// Equivalent to `Periodic { interval_ms: 1000 / per_second, message }`.
    Rate { per_second: u32, message: M },
    /// Every `interval_ms`, emit `count` copies of `message` to each target
    /// in one batch.
    Burst {
        count: u32,
        interval_ms: u64,
        message: M,
    },
}

impl<M: Clone> SendPattern<M> {
    /// Normalizes `Rate` into the equivalent `Periodic` interval; `None` and
    /// `Burst` pass through unchanged, `Periodic` passes through unchanged.
    pub fn interval_ms(&self) -> Option<u64> {
        match self {
            SendPattern::None => None,
            SendPattern::Periodic { interval_ms, .. } => Some(*interval_ms),
            SendPattern::Rate { per_second, .. } => {
                assert!(*per_second > 0, "rate must be > 0");
                Some(1000 / u64::from(*per_second))
            }
            SendPattern::Burst { interval_ms, .. } => Some(*interval_ms),
        }
    }

    /// The copies of `message` to emit to one target on a single tick:
    /// one for `Periodic`/`Rate`, `count` for `Burst` — so
    /// `burst(1, I, m)` is observably identical to `periodic(I, m)`
    /// (spec.md §8, "Boundary behaviors").
    pub fn fanout(&self) -> Vec<M> {
        match self {
            SendPattern::None => Vec::new(),
            SendPattern::Periodic { message, .. } | SendPattern::Rate { message, .. } => {
                vec![message.clone()]
            }
            SendPattern::Burst { count, message, .. } => {
                std::iter::repeat(message.clone()).take(*count as usize).collect()
            }
        }
    }
}

/// How an actor reacts to an inbound user message (spec.md §4.4).
pub enum ReceiveBehavior<S, M> {
    /// General function: `(message, state) -> callback-result`.
    OnReceive(Box<dyn FnMut(M, S) -> StepOutcome<S, M> + Send>),
    /// Pattern-match dispatch: first matching predicate wins; no match is
    /// silently dropped (state passes through unchanged).
    OnMatch(Vec<(Box<dyn Fn(&M) -> bool + Send>, Box<dyn FnMut(M, S) -> StepOutcome<S, M> + Send>)>),
    /// Count the message and drop it.
    Default,
}

/// Immutable per-actor configuration (spec.md §3, "Actor ... `definition`").
pub struct ActorDefinition<S, M> {
    pub send_pattern: SendPattern<M>,
    pub targets: Vec<ActorName>,
    pub receive: ReceiveBehavior<S, M>,
    pub initial_state: Box<dyn Fn() -> S + Send>,
}

impl<S, M> ActorDefinition<S, M> {
    pub fn builder(initial_state: impl Fn() -> S + Send + 'static) -> ActorDefinitionBuilder<S, M> {
        ActorDefinitionBuilder {
            send_pattern: SendPattern::None,
            targets: Vec::new(),
            receive: ReceiveBehavior::Default,
            initial_state: Box::new(initial_state),
        }
    }
}

/// Fluent builder for [`ActorDefinition`], mirroring the declarative
/// send-pattern DSL spec.md §4.5 describes (`add_actor(sim, name, opts)`).
pub struct ActorDefinitionBuilder<S, M> {
    send_pattern: SendPattern<M>,
    targets: Vec<ActorName>,
    receive: ReceiveBehavior<S, M>,
    initial_state: Box<dyn Fn() -> S + Send>,
}

impl<S, M> ActorDefinitionBuilder<S, M> {
    pub fn send_pattern(mut self, pattern: SendPattern<M>) -> Self {
        self.send_pattern = pattern;
        self
    }

    pub fn targets(mut self, targets: impl IntoIterator<Item = ActorName>) -> Self {
        self.targets = targets.into_iter().collect();
        self
    }

    pub fn on_receive(
        mut self,
        handler: impl FnMut(M, S) -> StepOutcome<S, M> + Send + 'static,
    ) -> Self {
        self.receive = ReceiveBehavior::OnReceive(Box::new(handler));
        self
    }

    pub fn on_match(
        mut self,
        arms: Vec<(
            Box<dyn Fn(&M) -> bool + Send>,
            Box<dyn FnMut(M, S) -> StepOutcome<S, M> + Send>,
        )>,
    ) -> Self {
        self.receive = ReceiveBehavior::OnMatch(arms);
        self
    }

    pub fn build(self) -> ActorDefinition<S, M> {
        ActorDefinition {
            send_pattern: self.send_pattern,
            targets: self.targets,
            receive: self.receive,
            initial_state: self.initial_state,
        }
    }
}

/// Adapts a [`ReceiveBehavior`] (written against the user's own message
/// type `M`) into the full [`ActorBehavior`] lifecycle the engine
/// dispatches through on the wire type `Envelope<M>` — so simulated actors
/// (declarative send-pattern DSL) and foreign actors (hand-written
/// `init`/`handle_*`) share one dispatch path inside
/// [`crate::engine::SimulationEngine`], and a user's `on_receive`/`on_match`
/// closure never has to match on the engine's internal `Tick`/`Wake`
/// control vocabulary.
///
/// Owns its `ActorDefinition` outright — each definition backs exactly one
/// live actor entry in the engine's registry, so there is no sharing to
/// reconcile here, unlike `targets`, which reference other actors only by
/// [`ActorName`] and never by definition.
pub struct ReceiveBehaviorAdapter<S, M> {
    definition: ActorDefinition<S, M>,
}

impl<S, M> ReceiveBehaviorAdapter<S, M> {
    pub fn new(definition: ActorDefinition<S, M>) -> Self {
        Self { definition }
    }
}

/// Wraps the plain-`M` outcome a DSL handler returns into the
/// `Envelope<M>`-carrying outcome the engine expects, tagging every
/// outgoing message `send` — the DSL's `on_receive`/`on_match` never
/// distinguish `cast`/`call` (spec.md §4.4 describes only a bare
/// callback-result for these hooks).
fn wrap_outcome<S, M>(outcome: StepOutcome<S, M>) -> StepOutcome<S, Envelope<M>> {
    let wrap_many = |msgs: Vec<(ActorName, M)>| {
        msgs.into_iter()
            .map(|(to, m)| (to, Envelope::user(MessageKind::Send, m)))
            .collect()
    };
    match outcome {
        StepOutcome::Ok(state) => StepOutcome::Ok(state),
        StepOutcome::Send(state, msgs) => StepOutcome::Send(state, wrap_many(msgs)),
        StepOutcome::SendAfter(state, delay, msgs) => {
            StepOutcome::SendAfter(state, delay, wrap_many(msgs))
        }
        StepOutcome::Reply(state, msg) => {
            StepOutcome::Reply(state, Envelope::user(MessageKind::Call, msg))
        }
        StepOutcome::Error(state, reason) => StepOutcome::Error(state, reason),
    }
}

impl<S, M> ActorBehavior<S, Envelope<M>> for ReceiveBehaviorAdapter<S, M> {
    fn init(&mut self) -> Result<S, SimError> {
        Ok((self.definition.initial_state)())
    }

    fn handle_cast(&mut self, message: Envelope<M>, state: S) -> StepOutcome<S, Envelope<M>> {
        self.handle_info(message, state)
    }

    fn handle_call(&mut self, message: Envelope<M>, state: S) -> StepOutcome<S, Envelope<M>> {
        self.handle_info(message, state)
    }

    /// `Tick` is intercepted by the engine before a dispatch ever reaches
    /// here (it drives send-pattern fanout directly); `Wake`/`CallTimeout`
    /// have no meaning for a declarative DSL actor that never called
    /// `sleep`/`call` itself, so both are treated as a no-op receipt.
    fn handle_info(&mut self, message: Envelope<M>, state: S) -> StepOutcome<S, Envelope<M>> {
        match message {
            Envelope::User { payload, .. } => {
                let outcome = match &mut self.definition.receive {
                    ReceiveBehavior::Default => StepOutcome::Ok(state),
                    ReceiveBehavior::OnReceive(handler) => handler(payload, state),
                    ReceiveBehavior::OnMatch(arms) => {
                        let mut arms = arms.iter_mut();
                        loop {
                            match arms.next() {
                                Some((predicate, handler)) if predicate(&payload) => {
                                    break handler(payload, state);
                                }
                                Some(_) => continue,
                                None => break StepOutcome::Ok(state),
                            }
                        }
                    }
                };
                wrap_outcome(outcome)
            }
            Envelope::Tick | Envelope::Wake | Envelope::CallTimeout { .. } => StepOutcome::Ok(state),
        }
    }
}
