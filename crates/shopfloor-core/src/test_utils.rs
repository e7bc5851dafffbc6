//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::engine::Engine;
use crate::fixed::{Fixed64, Ticks};
use crate::id::{EdgeId, NodeId};
use crate::node::{NodeKind, NodeParams, Position};
use crate::params::SimParams;

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Default parameters with parts crossing any edge in a single tick.
pub fn fast_params() -> SimParams {
    SimParams {
        transport_speed: 1.0,
        ..SimParams::default()
    }
}

/// An empty engine whose edges take one tick to cross.
pub fn fast_engine(params: SimParams) -> Engine {
    Engine::with_params(SimParams {
        transport_speed: 1.0,
        ..params
    })
}

pub fn add_source(engine: &mut Engine, spawn_interval: Ticks) -> NodeId {
    engine.place_node(
        NodeKind::Source,
        Position::default(),
        NodeParams {
            spawn_interval,
            ..NodeParams::default()
        },
    )
}

pub fn add_machine(engine: &mut Engine, processing_ticks: Ticks) -> NodeId {
    engine.place_node(
        NodeKind::Machine,
        Position::default(),
        NodeParams {
            processing_ticks,
            ..NodeParams::default()
        },
    )
}

pub fn add_buffer(engine: &mut Engine, capacity: Option<u32>) -> NodeId {
    engine.place_node(
        NodeKind::Buffer,
        Position::default(),
        NodeParams {
            capacity,
            ..NodeParams::default()
        },
    )
}

/// A source at (0, 0) feeding a sink at (200, 0).
#[derive(Debug, Clone, Copy)]
pub struct SourceToSink {
    pub source: NodeId,
    pub sink: NodeId,
    pub edge: EdgeId,
}

pub fn source_to_sink(params: SimParams, spawn_interval: Ticks) -> (Engine, SourceToSink) {
    let mut engine = Engine::with_params(params);
    let source = add_source(&mut engine, spawn_interval);
    let sink = engine.add_node(NodeKind::Sink, Position::new(200.0, 0.0));
    let edge = engine
        .connect(source, sink)
        .expect("source and sink are distinct");
    (engine, SourceToSink { source, sink, edge })
}

/// `source -> machine -> sink` with one-tick edges.
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    pub source: NodeId,
    pub machine: NodeId,
    pub sink: NodeId,
}

pub fn machine_cell(params: SimParams, spawn_interval: Ticks, processing_ticks: Ticks) -> (Engine, Cell) {
    let mut engine = fast_engine(params);
    let source = add_source(&mut engine, spawn_interval);
    let machine = add_machine(&mut engine, processing_ticks);
    let sink = engine.add_node(NodeKind::Sink, Position::default());
    engine.connect(source, machine).expect("distinct nodes");
    engine.connect(machine, sink).expect("distinct nodes");
    (engine, Cell { source, machine, sink })
}

/// Run `ticks` ticks and return the state hash.
pub fn run_and_hash(engine: &mut Engine, ticks: Ticks) -> u64 {
    engine.run_ticks(ticks);
    engine.state_hash()
}
