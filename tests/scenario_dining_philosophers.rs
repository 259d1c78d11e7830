//! spec.md §8 scenario 5: five philosophers, asymmetric fork acquisition
//! (the last philosopher reaches for their right fork first, everyone else
//! reaches left-then-right, the standard deadlock-avoidance asymmetry),
//! eat 100ms, think 1000ms. Forks are themselves simulated actors —
//! non-tree references resolved by name through the engine's registry
//! (spec.md §9), not by a direct owning reference between philosophers.

use chronosim::actor::ActorDefinition;
use chronosim::engine::SimulationEngine;
use chronosim::name::ActorName;
use chronosim::server::StepOutcome;

const N: usize = 5;
const THINK_MS: u64 = 1000;
const EAT_MS: u64 = 100;
const MAX_DURATION_MS: u64 = 120_000;

#[derive(Clone)]
enum DineMsg {
    StartThink,
    WakeToEat,
    RequestFork { philosopher: usize },
    GrantFork { fork: usize },
    ReleaseFork { fork: usize },
    Ate,
}

fn phil_name(i: usize) -> ActorName {
    ActorName::from(format!("philosopher-{i}"))
}

fn fork_name(i: usize) -> ActorName {
    ActorName::from(format!("fork-{i}"))
}

/// The asymmetric pickup order: everyone reaches for their lower-indexed
/// fork first, except the last philosopher, who reaches for their
/// higher-indexed (wraparound) fork first — the textbook fix that makes
/// the resource-allocation graph acyclic and rules out deadlock.
fn fork_order(i: usize) -> (usize, usize) {
    let left = i;
    let right = (i + 1) % N;
    if i == N - 1 {
        (right, left)
    } else {
        (left, right)
    }
}

#[derive(Default)]
struct ForkState {
    held_by: Option<usize>,
    queue: std::collections::VecDeque<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Thinking,
    WaitingFirst,
    WaitingSecond,
    Eating,
}

struct PhilState {
    stage: Stage,
    first_fork: usize,
    second_fork: usize,
}

#[test]
fn five_philosophers_never_deadlock_and_all_eat_at_least_once() {
    let mut sim: SimulationEngine<DineMsg> = SimulationEngine::new(true);

    sim.add_actor(
        "observer",
        ActorDefinition::<(), DineMsg>::builder(|| ()).build(),
    )
    .unwrap();

    for i in 0..N {
        let fork = ActorDefinition::<ForkState, DineMsg>::builder(ForkState::default)
            .on_receive(move |msg, mut state: ForkState| match msg {
                DineMsg::RequestFork { philosopher } => {
                    if state.held_by.is_none() {
                        state.held_by = Some(philosopher);
                        StepOutcome::Send(state, vec![(phil_name(philosopher), DineMsg::GrantFork { fork: i })])
                    } else {
                        state.queue.push_back(philosopher);
                        StepOutcome::Ok(state)
                    }
                }
                DineMsg::ReleaseFork { .. } => {
                    state.held_by = None;
                    if let Some(next) = state.queue.pop_front() {
                        state.held_by = Some(next);
                        StepOutcome::Send(state, vec![(phil_name(next), DineMsg::GrantFork { fork: i })])
                    } else {
                        StepOutcome::Ok(state)
                    }
                }
                _ => StepOutcome::Ok(state),
            })
            .build();
        sim.add_actor(fork_name(i), fork).unwrap();
    }

    for i in 0..N {
        let (first_fork, second_fork) = fork_order(i);
        let phil = ActorDefinition::<PhilState, DineMsg>::builder(move || PhilState {
            stage: Stage::Thinking,
            first_fork,
            second_fork,
        })
        .on_receive(move |msg, mut state: PhilState| match msg {
            DineMsg::StartThink => {
                state.stage = Stage::Thinking;
                StepOutcome::SendAfter(state, THINK_MS, vec![(phil_name(i), DineMsg::WakeToEat)])
            }
            DineMsg::WakeToEat => {
                state.stage = Stage::WaitingFirst;
                StepOutcome::Send(
                    state,
                    vec![(fork_name(first_fork), DineMsg::RequestFork { philosopher: i })],
                )
            }
            DineMsg::GrantFork { fork } if fork == first_fork && state.stage == Stage::WaitingFirst => {
                state.stage = Stage::WaitingSecond;
                StepOutcome::Send(
                    state,
                    vec![(fork_name(second_fork), DineMsg::RequestFork { philosopher: i })],
                )
            }
            DineMsg::GrantFork { fork } if fork == second_fork && state.stage == Stage::WaitingSecond => {
                state.stage = Stage::Eating;
                StepOutcome::SendAfter(state, EAT_MS, vec![(phil_name(i), DineMsg::Ate)])
            }
            DineMsg::Ate => {
                state.stage = Stage::Thinking;
                StepOutcome::Send(
                    state,
                    vec![
                        (fork_name(first_fork), DineMsg::ReleaseFork { fork: first_fork }),
                        (fork_name(second_fork), DineMsg::ReleaseFork { fork: second_fork }),
                        (ActorName::from("observer"), DineMsg::Ate),
                        (phil_name(i), DineMsg::StartThink),
                    ],
                )
            }
            _ => StepOutcome::Ok(state),
        })
        .build();
        sim.add_actor(phil_name(i), phil).unwrap();
    }

    for i in 0..N {
        sim.send_after(phil_name(i), DineMsg::StartThink, 0).unwrap();
    }

    // Each completed meal makes a philosopher send exactly 4 messages
    // (release both forks, notify the observer, restart thinking), so
    // "every philosopher has eaten at least once" (spec.md §8 scenario 5)
    // is observable straight off the live stats snapshot without reaching
    // into the trace.
    let report = sim.run_until(MAX_DURATION_MS, 100, |stats| {
        (0..N).all(|i| stats.sent_count(&phil_name(i)) >= 4)
    });

    assert!(
        report.terminated_early,
        "simulation hit max_duration without every philosopher eating"
    );
    assert!(
        report.actual_duration_ms < MAX_DURATION_MS,
        "expected early termination well before the {MAX_DURATION_MS}ms cap"
    );

    // No deadlock: the simulation always completes synchronously (there is
    // no blocking primitive in this crate's dispatch loop to hang on), and
    // every philosopher's trace shows at least one completed meal.
    let trace = sim.trace();
    for i in 0..N {
        let ate = trace
            .iter()
            .filter(|e| e.from == phil_name(i) && matches!(e.message, DineMsg::Ate))
            .count();
        assert!(ate >= 1, "philosopher {i} never completed a meal");
    }
}
