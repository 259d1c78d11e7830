//! Property-based "Laws" from spec.md §8, mirroring the teacher's
//! `tests/determinism_tests.rs` split between literal scenarios
//! (`scenario_*.rs`) and property checks (this file).
//!
//! * FIFO tie-break: two events scheduled for the same timestamp are
//!   dispatched in the order they were scheduled, regardless of how many
//!   other timestamps are interleaved around them.
//! * Additivity: `advance(a); advance(b)` observes the same dispatch order
//!   and lands on the same `now` as a single `advance(a + b)`, for any split
//!   of a fixed total duration.

use chronosim::clock::{Dispatch, DispatchOutcome, VirtualClock};
use chronosim::name::ActorName;
use proptest::prelude::*;

struct Recorder(Vec<(u64, ActorName, u32)>);

impl Dispatch<u32> for Recorder {
    fn dispatch(&mut self, now_ms: u64, target: &ActorName, message: u32) -> DispatchOutcome<u32> {
        self.0.push((now_ms, target.clone(), message));
        DispatchOutcome::none()
    }
}

fn name(s: &str) -> ActorName {
    ActorName::from(s)
}

proptest! {
    /// Any number of events scheduled for the same virtual timestamp come
    /// back out in schedule order, no matter what other timestamps (lower
    /// or higher) are scheduled around them.
    #[test]
    fn fifo_tie_break_holds_for_same_timestamp_batches(
        tie_ms in 0u64..10_000,
        tie_count in 1usize..20,
        decoys in proptest::collection::vec((0u64..20_000, 1000u32..2000), 0..10),
    ) {
        let mut clock = VirtualClock::new();
        let mut expected_tied_order = Vec::with_capacity(tie_count);
        for i in 0..tie_count {
            clock.schedule_after(tie_ms, name("tied"), i as u32);
            expected_tied_order.push(i as u32);
        }
        for (delay, payload) in &decoys {
            clock.schedule_after(*delay, name("decoy"), *payload);
        }

        let max_delay = decoys.iter().map(|(d, _)| *d).max().unwrap_or(0).max(tie_ms);
        let mut rec = Recorder(Vec::new());
        clock.advance(max_delay, &mut rec);

        let observed_tied_order: Vec<u32> = rec
            .0
            .iter()
            .filter(|(t, target, _)| *t == tie_ms && target.as_str() == "tied")
            .map(|(_, _, m)| *m)
            .collect();
        prop_assert_eq!(observed_tied_order, expected_tied_order);
    }

    /// `advance(a); advance(b)` is observably identical to `advance(a + b)`:
    /// same final `now`, same dispatch order, for any non-negative split of
    /// a fixed total duration.
    #[test]
    fn advance_is_additive_across_any_split(
        total_ms in 0u64..5000,
        split_fraction in 0.0f64..1.0,
        event_delays in proptest::collection::vec(0u64..5000, 0..15),
    ) {
        let a = (total_ms as f64 * split_fraction) as u64;
        let b = total_ms - a;

        let mut clock_split = VirtualClock::new();
        let mut clock_combined = VirtualClock::new();
        for clock in [&mut clock_split, &mut clock_combined] {
            for (i, delay) in event_delays.iter().enumerate() {
                clock.schedule_after(*delay, name("actor"), i as u32);
            }
        }

        let mut rec_split = Recorder(Vec::new());
        clock_split.advance(a, &mut rec_split);
        clock_split.advance(b, &mut rec_split);

        let mut rec_combined = Recorder(Vec::new());
        clock_combined.advance(total_ms, &mut rec_combined);

        prop_assert_eq!(clock_split.now(), clock_combined.now());
        prop_assert_eq!(rec_split.0, rec_combined.0);
    }
}
