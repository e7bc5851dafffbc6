//! Shopfloor Core -- a discrete-time production line simulator.
//!
//! Sources spawn parts that travel along directed edges into buffers and
//! machines and finally sinks. The engine tracks work in progress, flags the
//! most constrained machine, and accrues cost and quality totals.
//!
//! # Tick Pipeline
//!
//! Each tick run by [`engine::Engine::step`] or
//! [`engine::Engine::advance_frame`] goes through:
//!
//! 1. **Sources** -- spawn timers fire onto the first outgoing edge.
//! 2. **Machines** -- countdowns finish, parts are released or reworked,
//!    free machines pick up from an upstream buffer or their own queue.
//! 3. **Buffers** -- a queued part is forwarded to a free successor machine.
//! 4. **Transport** -- parts advance along edges and are delivered.
//! 5. **Accounting** -- machine, labor and overhead cost accrue.
//! 6. **Metrics** -- WIP and the bottleneck are recomputed.
//! 7. **Bookkeeping** -- events are delivered and the tick counter advances.
//!
//! # Editing
//!
//! Edits run between ticks, either directly (`engine.add_node(..)`,
//! `engine.connect(..)`) or as [`command::EditCommand`]s applied at the next
//! frame boundary. The [`input::InputState`] maps pointer gestures onto the
//! same edits.
//!
//! ```rust
//! use shopfloor_core::engine::Engine;
//! use shopfloor_core::params::SimParams;
//!
//! let (mut engine, line) = Engine::with_default_layout(SimParams::default()).unwrap();
//! engine.run_ticks(1_000);
//! assert!(engine.metrics().throughput > 0);
//! assert_eq!(engine.metrics().bottleneck.map(|b| b.node), Some(line.first_machine));
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- owns the graph, parts and accounting; runs ticks.
//! - [`graph::FactoryGraph`] -- nodes and directed edges in slotmap arenas,
//!   with insertion-ordered adjacency.
//! - [`params::SimParams`] -- the parameter panel; resolved to fixed-point
//!   [`params::Rates`].
//! - [`metrics::BottleneckPolicy`] -- replaceable bottleneck scoring.
//! - [`rng::RandomSource`] -- injectable randomness for quality draws.
//! - [`query::FrameSnapshot`] -- owned per-frame view for rendering.

pub mod accounting;
pub mod command;
pub mod engine;
pub mod event;
pub mod fixed;
pub mod graph;
pub mod id;
pub mod input;
pub mod inspect;
pub mod layout;
pub mod metrics;
pub mod node;
pub mod params;
pub mod part;
pub mod query;
pub mod rng;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
