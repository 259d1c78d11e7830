//! Statistics and trace collection (spec.md §4.3, §4.5.2, §6.3, §6.4).
//!
//! The trace collector bounds its own growth the way `kimberlite-sim`'s
//! `EventLog` does (evict-oldest once a cap is hit) rather than growing an
//! unbounded `Vec` for the lifetime of a long-running simulation.

use std::collections::HashMap;

use serde::Serialize;

use crate::message::MessageKind;
use crate::name::ActorName;

/// Per-actor counters (spec.md §6.3).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActorStats {
    pub sent_count: u64,
    pub received_count: u64,
    pub first_send_time: Option<u64>,
    pub last_send_time: Option<u64>,
}

impl ActorStats {
    fn record_sent(&mut self, at_ms: u64) {
        self.sent_count += 1;
        self.first_send_time.get_or_insert(at_ms);
        self.last_send_time = Some(at_ms);
    }

    fn record_received(&mut self) {
        self.received_count += 1;
    }

    /// `sent_count * 1000 / (end_time - start_time)`, or `None` when the
    /// denominator isn't positive (spec.md §6.3).
    pub fn rate_per_second(&self, start_time: u64, end_time: u64) -> Option<f64> {
        let span_ms = end_time.checked_sub(start_time)?;
        if span_ms == 0 {
            return None;
        }
        Some(self.sent_count as f64 * 1000.0 / span_ms as f64)
    }
}

/// Aggregate view over every actor's counters plus the run's time bounds
/// (spec.md §6.3).
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    pub actors: HashMap<ActorName, ActorStats>,
    pub total_messages: u64,
    pub start_time: u64,
    pub end_time: u64,
}

impl StatsSnapshot {
    pub fn sent_count(&self, name: &ActorName) -> u64 {
        self.actors.get(name).map_or(0, |s| s.sent_count)
    }

    pub fn received_count(&self, name: &ActorName) -> u64 {
        self.actors.get(name).map_or(0, |s| s.received_count)
    }

    pub fn rate_per_second(&self, name: &ActorName) -> Option<f64> {
        self.actors
            .get(name)?
            .rate_per_second(self.start_time, self.end_time)
    }

    /// Renders the snapshot as JSON, for ad hoc inspection or diffing
    /// between runs — the same use case `kimberlite-sim`'s
    /// `ReproBundle`/`VoprResult` serve via `serde_json`/`postcard`.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One recorded message hop (spec.md §6.4).
#[derive(Debug, Clone, Serialize)]
pub struct TraceEvent<M> {
    pub timestamp: u64,
    pub from: ActorName,
    pub to: ActorName,
    pub message: M,
    pub kind: MessageKind,
}

/// Accumulates [`StatsSnapshot`] counters and an ordered [`TraceEvent`]
/// list as a simulation runs. Owned single-writer from the engine's
/// perspective (spec.md §5).
pub struct Collector<M> {
    stats: StatsSnapshot,
    trace: Vec<TraceEvent<M>>,
    trace_enabled: bool,
    max_trace_events: usize,
}

impl<M> Collector<M> {
    pub fn new(trace_enabled: bool) -> Self {
        Self {
            stats: StatsSnapshot::default(),
            trace: Vec::new(),
            trace_enabled,
            max_trace_events: 1_000_000,
        }
    }

    pub fn set_start_time(&mut self, start_ms: u64) {
        self.stats.start_time = start_ms;
        self.stats.end_time = start_ms;
    }

    pub fn set_end_time(&mut self, end_ms: u64) {
        self.stats.end_time = end_ms;
    }

    /// Records a send from `from` to `to`, with trace emission if enabled.
    /// Tracing is idempotent with respect to delivery order and stats
    /// counts (spec.md §8, "Laws") — this method only ever appends; it
    /// never feeds back into scheduling decisions.
    pub fn record_send(&mut self, now_ms: u64, from: &ActorName, to: &ActorName, kind: MessageKind, message: M)
    where
        M: Clone,
    {
        self.stats.total_messages += 1;
        self.stats
            .actors
            .entry(from.clone())
            .or_default()
            .record_sent(now_ms);

        if self.trace_enabled {
            if self.trace.len() >= self.max_trace_events {
                self.trace.remove(0);
            }
            self.trace.push(TraceEvent {
                timestamp: now_ms,
                from: from.clone(),
                to: to.clone(),
                message,
                kind,
            });
        }
    }

    pub fn record_received(&mut self, actor: &ActorName) {
        self.stats
            .actors
            .entry(actor.clone())
            .or_default()
            .record_received();
    }

    /// A point-in-time copy of the accumulated stats — used by
    /// condition-checked `run` to evaluate a `terminate_when` predicate
    /// against *live* effects, not just a post-run aggregate (spec.md
    /// §4.5.1).
    pub fn snapshot(&self) -> StatsSnapshot
    where
        M: Clone,
    {
        StatsSnapshot {
            actors: self.stats.actors.clone(),
            total_messages: self.stats.total_messages,
            start_time: self.stats.start_time,
            end_time: self.stats.end_time,
        }
    }

    pub fn trace(&self) -> &[TraceEvent<M>] {
        &self.trace
    }

    pub fn into_parts(self) -> (StatsSnapshot, Vec<TraceEvent<M>>) {
        (self.stats, self.trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> ActorName {
        ActorName::from(s)
    }

    #[test]
    fn records_sent_and_received_independently() {
        let mut c: Collector<&str> = Collector::new(true);
        c.record_send(100, &name("producer"), &name("consumer"), MessageKind::Send, "data");
        c.record_received(&name("consumer"));

        let snap = c.snapshot();
        assert_eq!(snap.sent_count(&name("producer")), 1);
        assert_eq!(snap.received_count(&name("consumer")), 1);
        assert_eq!(snap.total_messages, 1);
    }

    #[test]
    fn trace_disabled_does_not_affect_stats() {
        let mut enabled: Collector<&str> = Collector::new(true);
        let mut disabled: Collector<&str> = Collector::new(false);

        for c in [&mut enabled, &mut disabled] {
            c.record_send(100, &name("a"), &name("b"), MessageKind::Send, "x");
            c.record_received(&name("b"));
        }

        assert_eq!(enabled.snapshot().total_messages, disabled.snapshot().total_messages);
        assert_eq!(
            enabled.snapshot().sent_count(&name("a")),
            disabled.snapshot().sent_count(&name("a"))
        );
        assert!(!enabled.trace().is_empty());
        assert!(disabled.trace().is_empty());
    }

    #[test]
    fn rate_per_second_requires_positive_span() {
        let mut c: Collector<&str> = Collector::new(false);
        c.set_start_time(0);
        for i in 0..10 {
            c.record_send(i * 100, &name("a"), &name("b"), MessageKind::Send, "x");
        }
        c.set_end_time(1000);

        let snap = c.snapshot();
        assert_eq!(snap.rate_per_second(&name("a")), Some(10.0));

        let mut zero_span: Collector<&str> = Collector::new(false);
        zero_span.set_start_time(500);
        zero_span.set_end_time(500);
        zero_span.record_send(500, &name("a"), &name("b"), MessageKind::Send, "x");
        assert_eq!(zero_span.snapshot().rate_per_second(&name("a")), None);
    }

    #[test]
    fn bounded_trace_evicts_oldest() {
        let mut c: Collector<u32> = Collector::new(true);
        c.max_trace_events = 3;
        for i in 0..5 {
            c.record_send(i, &name("a"), &name("b"), MessageKind::Send, i as u32);
        }
        assert_eq!(c.trace().len(), 3);
        assert_eq!(c.trace()[0].message, 2);
        assert_eq!(c.trace()[2].message, 4);
    }
}
