//! Read-only snapshots for the rendering surface.
//!
//! A [`FrameSnapshot`] is an owned copy of everything drawn in one frame:
//! nodes, edges, parts with interpolated positions, and the HUD counters.
//! Nothing in it refers back into engine storage.

use crate::engine::Engine;
use crate::fixed::{Ticks, fixed64_to_f64};
use crate::graph::FactoryGraph;
use crate::id::{EdgeId, NodeId, PartId};
use crate::node::{Node, NodeKind, Position};
use crate::part::{Part, PartState, Quality};

// ---------------------------------------------------------------------------
// Node snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub kind: NodeKind,
    /// e.g. `SOURCE #1`.
    pub label: String,
    pub position: Position,
    pub queue_len: usize,
    /// Machines: `1 - busy / processing` while holding a part, else 0.
    pub busy_fraction: f64,
    /// Machines: holding a part.
    pub occupied: bool,
    /// Machines: the held part is on its rework pass.
    pub reworking: bool,
}

impl NodeSnapshot {
    pub fn of(id: NodeId, node: &Node) -> Self {
        let occupied = node.state.current.is_some();
        let busy_fraction = if node.kind == NodeKind::Machine && occupied {
            let total = node.params.processing_ticks.max(1) as f64;
            (1.0 - node.state.busy as f64 / total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            id,
            kind: node.kind,
            label: node.label(),
            position: node.position,
            queue_len: node.state.queue.len(),
            busy_fraction,
            occupied,
            reworking: node.state.reworking,
        }
    }
}

// ---------------------------------------------------------------------------
// Edge snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSnapshot {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub start: Position,
    pub end: Position,
}

// ---------------------------------------------------------------------------
// Part snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartSnapshot {
    pub id: PartId,
    pub serial: u64,
    pub state: PartState,
    pub quality: Quality,
    pub position: Position,
    pub cost: f64,
}

/// Where a part should be drawn: interpolated along its edge while moving.
/// `None` while moving on an edge that no longer resolves.
pub fn part_position(graph: &FactoryGraph, part: &Part) -> Option<Position> {
    let (from, to) = graph.resolve_edge(part.edge?)?;
    Some(from.position.lerp(to.position, fixed64_to_f64(part.progress)))
}

// ---------------------------------------------------------------------------
// HUD and frame
// ---------------------------------------------------------------------------

/// Counters shown above the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Hud {
    pub tick: Ticks,
    pub throughput: u64,
    pub wip: usize,
    /// `M#3 (200f)` or `-`.
    pub bottleneck: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub part_count: usize,
    pub paused: bool,
    pub speed: u32,
}

/// Everything the rendering surface draws for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    /// In placement order.
    pub nodes: Vec<NodeSnapshot>,
    /// Edges whose endpoints both exist.
    pub edges: Vec<EdgeSnapshot>,
    /// Parts in spawn order.
    pub parts: Vec<PartSnapshot>,
    pub hud: Hud,
}

impl FrameSnapshot {
    pub fn capture(engine: &Engine) -> Self {
        let graph = engine.graph();

        let nodes: Vec<NodeSnapshot> = graph
            .nodes()
            .map(|(id, node)| NodeSnapshot::of(id, node))
            .collect();

        let edges: Vec<EdgeSnapshot> = graph
            .edges()
            .filter_map(|(id, data)| {
                let (from, to) = graph.resolve_edge(id)?;
                Some(EdgeSnapshot {
                    id,
                    from: data.from,
                    to: data.to,
                    start: from.position,
                    end: to.position,
                })
            })
            .collect();

        // Waiting and processing parts are drawn at the node holding them.
        let mut held_at: Vec<(PartId, Position)> = Vec::new();
        for (_, node) in graph.nodes() {
            for &part in node.state.queue.iter().chain(node.state.current.iter()) {
                held_at.push((part, node.position));
            }
        }

        let mut parts: Vec<PartSnapshot> = engine
            .parts()
            .filter_map(|(id, part)| {
                let position = match part.state {
                    PartState::Moving => part_position(graph, part)?,
                    PartState::Waiting | PartState::Processing => held_at
                        .iter()
                        .find(|(held, _)| *held == id)
                        .map(|(_, at)| *at)?,
                };
                Some(PartSnapshot {
                    id,
                    serial: part.serial,
                    state: part.state,
                    quality: part.quality,
                    position,
                    cost: fixed64_to_f64(part.cost),
                })
            })
            .collect();
        parts.sort_unstable_by_key(|p| p.serial);

        let metrics = engine.metrics();
        let hud = Hud {
            tick: engine.tick(),
            throughput: metrics.throughput,
            wip: metrics.wip,
            bottleneck: metrics.bottleneck_label(),
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            part_count: engine.part_count(),
            paused: engine.is_paused(),
            speed: engine.speed(),
        };

        Self {
            nodes,
            edges,
            parts,
            hud,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SimParams;
    use crate::test_utils::*;

    #[test]
    fn moving_part_is_interpolated() {
        let (mut engine, _) = source_to_sink(SimParams::default(), 1);
        engine.run_ticks(50);
        let frame = engine.snapshot();
        let oldest = &frame.parts[0];
        assert_eq!(oldest.serial, 1);
        assert_eq!(oldest.state, PartState::Moving);
        // 50 steps of 0.01 along (0,0) -> (200,0).
        assert!((oldest.position.x - 100.0).abs() < 1e-3);
        assert_eq!(oldest.position.y, 0.0);
    }

    #[test]
    fn queued_parts_are_drawn_at_their_node() {
        let mut engine = fast_engine(SimParams::default());
        let source = add_source(&mut engine, 1);
        let buffer = engine.add_node(NodeKind::Buffer, Position::new(400.0, 80.0));
        engine.connect(source, buffer).unwrap();
        engine.run_ticks(2);
        let frame = engine.snapshot();
        assert_eq!(frame.parts.len(), 2);
        assert!(frame.parts.iter().all(|p| p.position == Position::new(400.0, 80.0)));
        assert_eq!(frame.nodes[1].queue_len, 2);
    }

    #[test]
    fn busy_fraction_counts_up() {
        let mut engine = fast_engine(SimParams::default());
        let source = add_source(&mut engine, 100);
        let machine = add_machine(&mut engine, 4);
        engine.connect(source, machine).unwrap();
        // Spawn and arrive at tick 100, pick up at 101, one tick done at 102.
        engine.run_ticks(102);
        let frame = engine.snapshot();
        let node = frame.nodes.iter().find(|n| n.id == machine).unwrap();
        assert!(node.occupied);
        assert_eq!(node.busy_fraction, 0.25);
    }

    #[test]
    fn hud_reflects_engine() {
        let mut engine = Engine::new();
        engine.reset().unwrap();
        engine.set_speed(2);
        engine.pause();
        let hud = engine.snapshot().hud;
        assert_eq!(hud.node_count, 6);
        assert_eq!(hud.edge_count, 5);
        assert_eq!(hud.bottleneck, "M#3 (200f)");
        assert_eq!(hud.speed, 2);
        assert!(hud.paused);
    }

    #[test]
    fn edges_with_missing_endpoints_are_skipped() {
        let (mut engine, line) = source_to_sink(SimParams::default(), 1);
        assert_eq!(engine.snapshot().edges.len(), 1);
        engine.remove_node(line.sink).unwrap();
        assert!(engine.snapshot().edges.is_empty());
    }
}
