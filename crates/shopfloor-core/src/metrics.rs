//! Aggregate metrics recomputed at the end of every tick, and the
//! bottleneck heuristic.

use crate::fixed::Ticks;
use crate::graph::FactoryGraph;
use crate::id::{NodeId, NodeSerial};
use crate::node::{Node, NodeKind};

/// Score added per queued part.
pub const QUEUE_WEIGHT: Ticks = 20;

/// Score added while the machine holds a part.
pub const BUSY_WEIGHT: Ticks = 10;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Scores a machine; the highest score is reported as the bottleneck.
pub trait BottleneckPolicy: std::fmt::Debug {
    fn score(&self, machine: &Node) -> u64;
}

/// `processing + queue_len * queue_weight + busy * busy_weight`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedScore {
    pub queue_weight: Ticks,
    pub busy_weight: Ticks,
}

impl Default for WeightedScore {
    fn default() -> Self {
        Self {
            queue_weight: QUEUE_WEIGHT,
            busy_weight: BUSY_WEIGHT,
        }
    }
}

impl BottleneckPolicy for WeightedScore {
    fn score(&self, machine: &Node) -> u64 {
        let queued = machine.state.queue.len() as u64;
        let busy = if machine.state.busy > 0 { self.busy_weight } else { 0 };
        machine
            .params
            .processing_ticks
            .saturating_add(queued.saturating_mul(self.queue_weight))
            .saturating_add(busy)
    }
}

// ---------------------------------------------------------------------------
// Bottleneck
// ---------------------------------------------------------------------------

/// The machine flagged as most constrained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bottleneck {
    pub node: NodeId,
    pub serial: NodeSerial,
    pub processing_ticks: Ticks,
    pub score: u64,
}

impl Bottleneck {
    /// HUD label, e.g. `M#3 (200f)`.
    pub fn label(&self) -> String {
        format!("M{} ({}f)", self.serial, self.processing_ticks)
    }
}

/// Highest-scoring machine; ties go to the machine placed first.
pub fn find_bottleneck(graph: &FactoryGraph, policy: &dyn BottleneckPolicy) -> Option<Bottleneck> {
    let mut best: Option<Bottleneck> = None;
    for (id, node) in graph.nodes() {
        if node.kind != NodeKind::Machine {
            continue;
        }
        let score = policy.score(node);
        if best.is_none_or(|b| score > b.score) {
            best = Some(Bottleneck {
                node: id,
                serial: node.serial,
                processing_ticks: node.params.processing_ticks,
                score,
            });
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters shown on the HUD.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics {
    /// Parts consumed by sinks since the last reset.
    pub throughput: u64,
    /// Live parts (not yet at a sink).
    pub wip: usize,
    pub bottleneck: Option<Bottleneck>,
}

impl Metrics {
    /// `-` when there is no machine.
    pub fn bottleneck_label(&self) -> String {
        self.bottleneck
            .map(|b| b.label())
            .unwrap_or_else(|| "-".to_string())
    }
}
