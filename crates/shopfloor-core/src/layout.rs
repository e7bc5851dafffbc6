//! Grid snapping and the default starter line.

use crate::engine::Engine;
use crate::graph::GraphError;
use crate::id::NodeId;
use crate::node::{NodeKind, NodeParams, Position};

/// Grid spacing in canvas units.
pub const DEFAULT_GRID_SIZE: f64 = 40.0;

/// Optional snap-to-grid for placed and moved nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSnap {
    pub enabled: bool,
    pub size: f64,
}

impl Default for GridSnap {
    fn default() -> Self {
        Self {
            enabled: true,
            size: DEFAULT_GRID_SIZE,
        }
    }
}

impl GridSnap {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Round to the nearest grid point when enabled.
    pub fn snap(&self, position: Position) -> Position {
        if !self.enabled || !(self.size > 0.0) {
            return position;
        }
        Position::new(
            (position.x / self.size).round() * self.size,
            (position.y / self.size).round() * self.size,
        )
    }
}

/// Handles to the nodes of the starter line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultLayout {
    pub source: NodeId,
    pub inbound: NodeId,
    /// The slow machine (200 ticks).
    pub first_machine: NodeId,
    pub between: NodeId,
    /// The fast machine (120 ticks).
    pub second_machine: NodeId,
    pub sink: NodeId,
}

impl DefaultLayout {
    pub fn nodes(&self) -> [NodeId; 6] {
        [
            self.source,
            self.inbound,
            self.first_machine,
            self.between,
            self.second_machine,
            self.sink,
        ]
    }
}

/// Place `source -> buffer -> machine(200) -> buffer -> machine(120) -> sink`
/// along y = 320.
pub fn seed_default_layout(engine: &mut Engine) -> Result<DefaultLayout, GraphError> {
    let buffer_params = NodeParams {
        capacity: engine.params().buffer_capacity,
        ..NodeParams::default()
    };
    let machine = |processing_ticks| NodeParams {
        processing_ticks,
        ..NodeParams::default()
    };

    let layout = DefaultLayout {
        source: engine.place_node(NodeKind::Source, Position::new(120.0, 320.0), NodeParams::default()),
        inbound: engine.place_node(NodeKind::Buffer, Position::new(320.0, 320.0), buffer_params.clone()),
        first_machine: engine.place_node(NodeKind::Machine, Position::new(520.0, 320.0), machine(200)),
        between: engine.place_node(NodeKind::Buffer, Position::new(720.0, 320.0), buffer_params),
        second_machine: engine.place_node(NodeKind::Machine, Position::new(920.0, 320.0), machine(120)),
        sink: engine.place_node(NodeKind::Sink, Position::new(1080.0, 320.0), NodeParams::default()),
    };

    for pair in layout.nodes().windows(2) {
        engine.connect(pair[0], pair[1])?;
    }
    tracing::info!(nodes = 6, edges = 5, "seeded default layout");
    Ok(layout)
}
