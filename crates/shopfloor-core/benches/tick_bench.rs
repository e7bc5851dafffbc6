//! Criterion benchmarks for the tick loop.
//!
//! - `default_line`: the six-node starter line, warmed up to steady state
//! - `parallel_lines`: 100 independent lines fed through shared buffers
//! - `snapshot`: building a render frame for the parallel lines

use criterion::{Criterion, criterion_group, criterion_main};
use shopfloor_core::engine::Engine;
use shopfloor_core::id::NodeId;
use shopfloor_core::node::{NodeKind, Position};
use shopfloor_core::params::SimParams;
use shopfloor_core::test_utils::*;

// ===========================================================================
// Factory builders
// ===========================================================================

/// `lines` copies of source -> buffer -> machine -> buffer -> machine -> sink,
/// with a cross-link from each line's first buffer into the next line.
fn build_parallel_lines(lines: usize) -> Engine {
    let params = SimParams {
        defect_rate: 0.05,
        rework_rate: 0.5,
        downtime_rate: 0.01,
        ..SimParams::default()
    };
    let mut engine = Engine::with_seed(params, 7);
    engine.grid.enabled = false;
    let mut first_buffers: Vec<NodeId> = Vec::with_capacity(lines);
    let mut first_machines: Vec<NodeId> = Vec::with_capacity(lines);

    for line in 0..lines {
        let y = line as f64 * 80.0;
        let source = add_source(&mut engine, 20 + (line as u64 % 7));
        let inbound = add_buffer(&mut engine, Some(16));
        let m1 = add_machine(&mut engine, 25);
        let between = add_buffer(&mut engine, None);
        let m2 = add_machine(&mut engine, 18);
        let sink = engine.add_node(NodeKind::Sink, Position::new(1000.0, y));
        for pair in [source, inbound, m1, between, m2, sink].windows(2) {
            engine.connect(pair[0], pair[1]).unwrap();
        }
        first_buffers.push(inbound);
        first_machines.push(m1);
    }
    for i in 0..lines.saturating_sub(1) {
        engine.connect(first_buffers[i], first_machines[i + 1]).unwrap();
    }

    engine.run_ticks(500);
    engine
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_default_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("default_line");
    group.sample_size(50);

    let (mut engine, _) = Engine::with_default_layout(SimParams::default()).unwrap();
    engine.run_ticks(1_000);

    group.bench_function("step", |b| {
        b.iter(|| {
            engine.step();
        });
    });

    group.finish();
}

fn bench_parallel_lines(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_lines");
    group.sample_size(30);

    let mut engine = build_parallel_lines(100);

    group.bench_function("100_lines_step", |b| {
        b.iter(|| {
            engine.step();
        });
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");
    group.sample_size(30);

    let engine = build_parallel_lines(100);

    group.bench_function("100_lines_frame", |b| {
        b.iter(|| engine.snapshot());
    });

    group.finish();
}

criterion_group!(benches, bench_default_line, bench_parallel_lines, bench_snapshot);
criterion_main!(benches);
