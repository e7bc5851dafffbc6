//! Node kinds, per-node parameters and per-node runtime state.

use std::collections::VecDeque;

use crate::fixed::Ticks;
use crate::id::{NodeSerial, PartId};

/// Spawn interval given to a freshly placed source.
pub const DEFAULT_SPAWN_INTERVAL: Ticks = 180;

/// Processing duration given to a freshly placed machine.
pub const DEFAULT_PROCESSING_TICKS: Ticks = 180;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// What a node does with the parts that reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Spawns a part every `spawn_interval` ticks.
    Source,
    /// Passive FIFO with optional finite capacity.
    Buffer,
    /// Holds and processes one part at a time.
    Machine,
    /// Consumes finished parts.
    Sink,
}

impl NodeKind {
    /// Upper-case name used in labels (`MACHINE #3`).
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Source => "SOURCE",
            NodeKind::Buffer => "BUFFER",
            NodeKind::Machine => "MACHINE",
            NodeKind::Sink => "SINK",
        }
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "source" => Ok(NodeKind::Source),
            "buffer" => Ok(NodeKind::Buffer),
            "machine" => Ok(NodeKind::Machine),
            "sink" => Ok(NodeKind::Sink),
            other => Err(format!("unknown node kind '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// Canvas position. Display-only; the simulation never reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `other` by `t` in [0, 1].
    pub fn lerp(self, other: Position, t: f64) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Kind-specific parameters. Fields that do not apply to a kind are ignored.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeParams {
    /// Source: ticks between spawns. Always >= 1.
    pub spawn_interval: Ticks,
    /// Machine: ticks to process one part. Always >= 1.
    pub processing_ticks: Ticks,
    /// Buffer: maximum queued parts. `None` is unbounded.
    pub capacity: Option<u32>,
}

impl Default for NodeParams {
    fn default() -> Self {
        Self {
            spawn_interval: DEFAULT_SPAWN_INTERVAL,
            processing_ticks: DEFAULT_PROCESSING_TICKS,
            capacity: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Transient per-node simulation state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeState {
    /// Source: ticks since the last spawn.
    pub spawn_timer: Ticks,
    /// Parts waiting at this node, oldest first.
    pub queue: VecDeque<PartId>,
    /// Machine: remaining busy ticks for the held part.
    pub busy: Ticks,
    /// Machine: the part being processed, if any.
    pub current: Option<PartId>,
    /// Machine: the held part is in its rework pass.
    pub reworking: bool,
    /// Machine: ticks spent holding a part.
    pub busy_ticks: Ticks,
    /// Machine: ticks lost to downtime.
    pub downtime_ticks: Ticks,
    /// Sink: parts consumed here.
    pub completed: u64,
}

impl NodeState {
    /// Whether a machine is free to pick up a part.
    pub fn is_free(&self) -> bool {
        self.current.is_none()
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A node in the factory graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub serial: NodeSerial,
    pub kind: NodeKind,
    pub position: Position,
    pub params: NodeParams,
    pub state: NodeState,
}

impl Node {
    pub fn new(serial: NodeSerial, kind: NodeKind, position: Position, params: NodeParams) -> Self {
        Self {
            serial,
            kind,
            position,
            params,
            state: NodeState::default(),
        }
    }

    /// Inspector label, e.g. `MACHINE #3`.
    pub fn label(&self) -> String {
        format!("{} {}", self.kind.label(), self.serial)
    }

    /// Whether a buffer can accept one more part.
    pub fn has_room(&self) -> bool {
        match self.params.capacity {
            Some(cap) => self.state.queue.len() < cap as usize,
            None => true,
        }
    }
}
