//! The per-node inspector: a read-only view and the edit it applies.

use crate::fixed::Ticks;
use crate::id::{NodeId, NodeSerial};
use crate::node::{Node, NodeKind, Position};

/// What the inspector shows for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct InspectorView {
    pub node: NodeId,
    pub serial: NodeSerial,
    pub kind: NodeKind,
    /// e.g. `BUFFER #2`.
    pub label: String,
    pub position: Position,
    /// Sources only.
    pub spawn_interval: Option<Ticks>,
    /// Machines only.
    pub processing_ticks: Option<Ticks>,
    /// Buffers only; the inner `None` is unbounded.
    pub capacity: Option<Option<u32>>,
    pub queue_len: usize,
    /// Machines: remaining busy ticks on the held part.
    pub busy: Ticks,
    /// Sinks only.
    pub completed: Option<u64>,
}

impl InspectorView {
    pub fn of(id: NodeId, node: &Node) -> Self {
        Self {
            node: id,
            serial: node.serial,
            kind: node.kind,
            label: node.label(),
            position: node.position,
            spawn_interval: (node.kind == NodeKind::Source).then_some(node.params.spawn_interval),
            processing_ticks: (node.kind == NodeKind::Machine)
                .then_some(node.params.processing_ticks),
            capacity: (node.kind == NodeKind::Buffer).then_some(node.params.capacity),
            queue_len: node.state.queue.len(),
            busy: node.state.busy,
            completed: (node.kind == NodeKind::Sink).then_some(node.state.completed),
        }
    }
}

/// Changes requested from the inspector. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeEdit {
    pub position: Option<Position>,
    pub spawn_interval: Option<Ticks>,
    pub processing_ticks: Option<Ticks>,
    /// `Some(None)` makes a buffer unbounded.
    pub capacity: Option<Option<u32>>,
}

impl NodeEdit {
    /// Build an edit from form fields (`x`, `y`, `spawn_interval`,
    /// `processing_ticks`, `capacity`).
    ///
    /// A field that fails to parse is left unchanged. A lone `x` or `y`
    /// keeps the other coordinate of `current`.
    pub fn from_pairs<'a>(
        current: Position,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut edit = NodeEdit::default();
        let mut x = None;
        let mut y = None;
        for (key, raw) in pairs {
            let parsed = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite());
            match key.trim() {
                "x" => x = parsed,
                "y" => y = parsed,
                "spawn_interval" => edit.spawn_interval = parsed.map(to_ticks),
                "processing_ticks" => edit.processing_ticks = parsed.map(to_ticks),
                "capacity" => {
                    let raw = raw.trim();
                    if raw.is_empty() || raw.eq_ignore_ascii_case("inf") {
                        edit.capacity = Some(None);
                    } else if let Some(v) = parsed.filter(|v| *v >= 0.0) {
                        edit.capacity = Some(Some(v.min(u32::MAX as f64) as u32));
                    }
                }
                other => tracing::debug!(key = other, "ignoring unknown inspector field"),
            }
        }
        if x.is_some() || y.is_some() {
            edit.position = Some(Position::new(
                x.unwrap_or(current.x),
                y.unwrap_or(current.y),
            ));
        }
        edit
    }

    /// Apply to `node`, clamping durations to at least one tick. Fields that
    /// do not apply to the node's kind are ignored.
    pub(crate) fn apply(&self, node: &mut Node) {
        if let Some(position) = self.position {
            node.position = position;
        }
        match node.kind {
            NodeKind::Source => {
                if let Some(spawn) = self.spawn_interval {
                    node.params.spawn_interval = spawn.max(1);
                }
            }
            NodeKind::Machine => {
                if let Some(proc) = self.processing_ticks {
                    node.params.processing_ticks = proc.max(1);
                }
            }
            NodeKind::Buffer => {
                if let Some(capacity) = self.capacity {
                    node.params.capacity = capacity;
                }
            }
            NodeKind::Sink => {}
        }
    }
}

fn to_ticks(v: f64) -> Ticks {
    if v <= 0.0 {
        0
    } else {
        v.min(u64::MAX as f64) as Ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeParams;
    use slotmap::SlotMap;

    fn node(kind: NodeKind) -> (NodeId, Node) {
        let mut sm = SlotMap::<NodeId, ()>::with_key();
        let node = Node::new(NodeSerial(4), kind, Position::new(80.0, 40.0), NodeParams::default());
        (sm.insert(()), node)
    }

    #[test]
    fn view_shows_kind_specific_fields() {
        let (id, machine) = node(NodeKind::Machine);
        let view = InspectorView::of(id, &machine);
        assert_eq!(view.label, "MACHINE #4");
        assert_eq!(view.processing_ticks, Some(180));
        assert_eq!(view.spawn_interval, None);
        assert_eq!(view.capacity, None);
        assert_eq!(view.completed, None);

        let (id, sink) = node(NodeKind::Sink);
        assert_eq!(InspectorView::of(id, &sink).completed, Some(0));
    }

    #[test]
    fn apply_clamps_durations() {
        let (_, mut source) = node(NodeKind::Source);
        NodeEdit {
            spawn_interval: Some(0),
            ..NodeEdit::default()
        }
        .apply(&mut source);
        assert_eq!(source.params.spawn_interval, 1);

        let (_, mut machine) = node(NodeKind::Machine);
        let edit = NodeEdit::from_pairs(machine.position, [("processing_ticks", "-5")]);
        edit.apply(&mut machine);
        assert_eq!(machine.params.processing_ticks, 1);
    }

    #[test]
    fn unparseable_fields_keep_values() {
        let (_, mut machine) = node(NodeKind::Machine);
        let edit = NodeEdit::from_pairs(
            machine.position,
            [("processing_ticks", "fast"), ("y", "120"), ("x", "")],
        );
        edit.apply(&mut machine);
        assert_eq!(machine.params.processing_ticks, 180);
        assert_eq!(machine.position, Position::new(80.0, 120.0));
    }

    #[test]
    fn fields_for_other_kinds_are_ignored() {
        let (_, mut sink) = node(NodeKind::Sink);
        NodeEdit {
            processing_ticks: Some(9),
            capacity: Some(Some(2)),
            ..NodeEdit::default()
        }
        .apply(&mut sink);
        assert_eq!(sink.params, NodeParams::default());
    }

    #[test]
    fn capacity_field_parsing() {
        let here = Position::default();
        assert_eq!(NodeEdit::from_pairs(here, [("capacity", "3")]).capacity, Some(Some(3)));
        assert_eq!(NodeEdit::from_pairs(here, [("capacity", "inf")]).capacity, Some(None));
        assert_eq!(NodeEdit::from_pairs(here, [("capacity", "many")]).capacity, None);
    }
}
