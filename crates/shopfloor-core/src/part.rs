//! Parts: the units of work that flow through the graph.

use crate::fixed::Fixed64;
use crate::id::EdgeId;

/// Lifecycle state of a live part.
///
/// A part that reaches a sink is counted and removed; it never lingers as a
/// live object, so there is no `Done` state here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PartState {
    /// Travelling along `edge`.
    Moving,
    /// Queued at a buffer or machine.
    Waiting,
    /// Held by a machine.
    Processing,
}

/// Quality tag assigned at spawn and updated by rework.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Quality {
    #[default]
    Good,
    Defect,
    /// A defect that went through a rework pass.
    Rework,
}

/// A live part.
#[derive(Debug, Clone)]
pub struct Part {
    /// Monotonic spawn number, for display.
    pub serial: u64,
    pub state: PartState,
    /// The edge being traversed. Only meaningful while `Moving`.
    pub edge: Option<EdgeId>,
    /// Fraction of `edge` covered, in [0, 1].
    pub progress: Fixed64,
    pub quality: Quality,
    /// Cost accumulated so far (material plus processing).
    pub cost: Fixed64,
}

impl Part {
    /// A part that starts at the beginning of `edge`.
    pub fn on_edge(serial: u64, edge: EdgeId, quality: Quality, cost: Fixed64) -> Self {
        Self {
            serial,
            state: PartState::Moving,
            edge: Some(edge),
            progress: Fixed64::ZERO,
            quality,
            cost,
        }
    }

    /// Put the part back in motion at the start of `edge`.
    pub fn depart(&mut self, edge: EdgeId) {
        self.state = PartState::Moving;
        self.edge = Some(edge);
        self.progress = Fixed64::ZERO;
    }

    /// Advance along the current edge, clamping at 1. Returns true on arrival.
    pub fn advance(&mut self, step: Fixed64) -> bool {
        self.progress = self.progress.saturating_add(step.max(Fixed64::ZERO));
        if self.progress > Fixed64::ONE {
            self.progress = Fixed64::ONE;
        }
        self.progress >= Fixed64::ONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn edge() -> EdgeId {
        let mut sm = SlotMap::<EdgeId, ()>::with_key();
        sm.insert(())
    }

    #[test]
    fn advance_clamps_to_one() {
        let mut part = Part::on_edge(1, edge(), Quality::Good, Fixed64::ZERO);
        assert!(!part.advance(Fixed64::from_num(0.75)));
        assert!(part.advance(Fixed64::from_num(0.75)));
        assert_eq!(part.progress, Fixed64::ONE);
    }

    #[test]
    fn negative_step_never_moves_backwards() {
        let mut part = Part::on_edge(1, edge(), Quality::Good, Fixed64::ZERO);
        part.advance(Fixed64::from_num(0.5));
        part.advance(Fixed64::from_num(-0.25));
        assert_eq!(part.progress, Fixed64::from_num(0.5));
    }

    #[test]
    fn depart_resets_progress() {
        let e = edge();
        let mut part = Part::on_edge(1, e, Quality::Defect, Fixed64::ZERO);
        part.advance(Fixed64::ONE);
        part.state = PartState::Processing;
        part.depart(e);
        assert_eq!(part.state, PartState::Moving);
        assert_eq!(part.progress, Fixed64::ZERO);
    }
}
