//! # chronosim: Deterministic Virtual-Time Simulation for Actor Systems
//!
//! A discrete-event simulation runtime for message-passing actor code.
//! Time-dependent behavior — periodic timers, timeouts, scheduled retries,
//! multi-stage pipelines — runs against a [`VirtualClock`] instead of the
//! host OS clock, so simulated hours of behavior execute in milliseconds,
//! deterministically.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       SimulationEngine                            │
//! │  ┌────────────────┐   owns   ┌─────────────────────────────────┐ │
//! │  │  VirtualClock   │◄─────────│ actor registry (name -> Entry)  │ │
//! │  │  (event queue,  │          │ stats + trace Collector         │ │
//! │  │   advance/now)  │          └─────────────────────────────────┘ │
//! │  └────────────────┘                                               │
//! └──────────────────────────────────────────────────────────────────┘
//!            ▲
//!            │ TimeBackend (now/schedule_after/cancel)
//!            │
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     VirtualTimeServer<S>                          │
//! │   init -> (handle_call | handle_cast | handle_info)* -> terminate │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```
//! use chronosim::actor::{ActorDefinition, SendPattern};
//! use chronosim::engine::SimulationEngine;
//! use chronosim::server::StepOutcome;
//!
//! let mut sim: SimulationEngine<&str> = SimulationEngine::new(true);
//!
//! let producer = ActorDefinition::<(), &str>::builder(|| ())
//!     .send_pattern(SendPattern::Periodic { interval_ms: 100, message: "data" })
//!     .targets(["consumer".into()])
//!     .build();
//! sim.add_actor("producer", producer).unwrap();
//!
//! let consumer = ActorDefinition::<u32, &str>::builder(|| 0u32)
//!     .on_receive(|_msg, count| StepOutcome::Ok(count + 1))
//!     .build();
//! sim.add_actor("consumer", consumer).unwrap();
//!
//! let report = sim.run_for(1000);
//! assert_eq!(report.actual_duration_ms, 1000);
//! assert_eq!(sim.stats().sent_count(&"producer".into()), 10);
//! ```

pub mod actor;
pub mod backend;
pub mod clock;
pub mod engine;
pub mod error;
pub mod message;
pub mod name;
pub mod server;
pub mod stats;

pub use actor::{ActorDefinition, ReceiveBehavior, SendPattern};
pub use backend::{CancelOutcome, RealTimeBackend, TimeBackend, VirtualClockBackend};
pub use clock::{Dispatch, DispatchOutcome, EventId, VirtualClock};
pub use engine::{RunReport, SimulationEngine};
pub use error::SimError;
pub use message::{Envelope, MessageKind};
pub use name::ActorName;
pub use server::{ActorBehavior, ServerStats, StepOutcome, VirtualTimeServer};
pub use stats::{ActorStats, Collector, StatsSnapshot, TraceEvent};
