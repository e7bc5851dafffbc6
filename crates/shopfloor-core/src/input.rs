//! Pointer input: turns press / move / release on the canvas into edits.
//!
//! The input layer holds only UI state (tool, selection, drag, pending
//! connect origin). Every change to the factory goes through the engine's
//! edit methods, between frames.

use crate::engine::Engine;
use crate::graph::FactoryGraph;
use crate::id::{EdgeId, NodeId};
use crate::node::{NodeKind, Position};

/// Half-width of a node's hit box.
pub const HIT_HALF_WIDTH: f64 = 36.0;

/// Half-height of a node's hit box.
pub const HIT_HALF_HEIGHT: f64 = 28.0;

/// What a press on the canvas does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Select and drag nodes.
    #[default]
    Select,
    /// Two presses connect origin to target.
    Connect,
    /// A press deletes the node under the pointer.
    Delete,
}

/// The first node (in placement order) whose hit box contains `point`.
pub fn hit_test(graph: &FactoryGraph, point: Position) -> Option<NodeId> {
    graph
        .nodes()
        .find(|(_, node)| {
            (node.position.x - point.x).abs() < HIT_HALF_WIDTH
                && (node.position.y - point.y).abs() < HIT_HALF_HEIGHT
        })
        .map(|(id, _)| id)
}

/// Result of a pointer press, for the caller's UI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Nothing,
    Selected(NodeId),
    SelectionCleared,
    ConnectOrigin(NodeId),
    Connected(EdgeId),
    /// Second press landed on the origin itself.
    ConnectCancelled,
    Deleted(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Drag {
    node: NodeId,
    /// Pointer position relative to the node at press time.
    offset: Position,
}

/// Tool mode, selection and gesture state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputState {
    tool: Tool,
    selected: Option<NodeId>,
    connect_from: Option<NodeId>,
    drag: Option<Drag>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Origin picked by the first press in connect mode.
    pub fn connect_origin(&self) -> Option<NodeId> {
        self.connect_from
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Switch tools, abandoning any gesture in progress.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.connect_from = None;
        self.drag = None;
    }

    /// Toolbar placement: add a node, select it and return to select mode.
    pub fn place(&mut self, engine: &mut Engine, kind: NodeKind, at: Position) -> NodeId {
        let node = engine.add_node(kind, at);
        self.set_tool(Tool::Select);
        self.selected = Some(node);
        node
    }

    pub fn pointer_down(&mut self, engine: &mut Engine, point: Position) -> PressOutcome {
        let hit = hit_test(engine.graph(), point);
        match self.tool {
            Tool::Select => match hit {
                Some(node) => {
                    let origin = engine.graph().node(node).map(|n| n.position).unwrap_or(point);
                    self.selected = Some(node);
                    self.drag = Some(Drag {
                        node,
                        offset: Position::new(point.x - origin.x, point.y - origin.y),
                    });
                    PressOutcome::Selected(node)
                }
                None => {
                    self.selected = None;
                    PressOutcome::SelectionCleared
                }
            },
            Tool::Connect => {
                let Some(target) = hit else {
                    return PressOutcome::Nothing;
                };
                let Some(origin) = self.connect_from.take() else {
                    self.connect_from = Some(target);
                    return PressOutcome::ConnectOrigin(target);
                };
                match engine.connect(origin, target) {
                    Ok(edge) => PressOutcome::Connected(edge),
                    Err(err) => {
                        tracing::debug!(%err, "connect cancelled");
                        PressOutcome::ConnectCancelled
                    }
                }
            }
            Tool::Delete => {
                let Some(node) = hit else {
                    return PressOutcome::Nothing;
                };
                if engine.remove_node(node).is_err() {
                    return PressOutcome::Nothing;
                }
                if self.selected == Some(node) {
                    self.selected = None;
                }
                PressOutcome::Deleted(node)
            }
        }
    }

    /// Drag the grabbed node, keeping the press offset.
    pub fn pointer_move(&mut self, engine: &mut Engine, point: Position) {
        let Some(drag) = self.drag else {
            return;
        };
        let target = Position::new(point.x - drag.offset.x, point.y - drag.offset.y);
        if engine.move_node(drag.node, target).is_err() {
            self.drag = None;
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Forget references to nodes that no longer exist (after a reset or a
    /// queued removal).
    pub fn prune(&mut self, graph: &FactoryGraph) {
        let alive = |id: &NodeId| graph.contains_node(*id);
        self.selected = self.selected.filter(alive);
        self.connect_from = self.connect_from.filter(alive);
        self.drag = self.drag.filter(|d| graph.contains_node(d.node));
    }
}
