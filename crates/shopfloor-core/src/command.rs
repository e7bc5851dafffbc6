//! Edit command queue.
//!
//! Editors that do not hold the engine mutably (scripts, replay, event
//! reactions) submit [`EditCommand`]s; the engine applies them at the start
//! of the next frame, before any tick runs. Each command is one atomic edit.

use crate::fixed::Ticks;
use crate::id::{EdgeId, NodeId};
use crate::inspect::NodeEdit;
use crate::node::{NodeKind, Position};
use crate::params::SimParams;

// ---------------------------------------------------------------------------
// Command enum
// ---------------------------------------------------------------------------

/// A single queued edit.
#[derive(Debug, Clone, PartialEq)]
pub enum EditCommand {
    /// Place a node of `kind`; the position is snapped when the grid is on.
    AddNode { kind: NodeKind, position: Position },
    /// Delete a node, its incident edges and the parts it holds.
    RemoveNode { node: NodeId },
    /// Connect two distinct nodes. Self-loops have no effect.
    Connect { from: NodeId, to: NodeId },
    Disconnect { edge: EdgeId },
    MoveNode { node: NodeId, position: Position },
    /// Inspector apply.
    EditNode { node: NodeId, edit: NodeEdit },
    SetParams { params: SimParams },
    /// Clear everything and reseed the default layout.
    Reset,
}

// ---------------------------------------------------------------------------
// CommandQueue
// ---------------------------------------------------------------------------

/// Commands waiting for the next frame boundary, with optional history.
#[derive(Debug)]
pub struct CommandQueue {
    pending: Vec<EditCommand>,
    /// Applied commands: (tick, command).
    history: Vec<(Ticks, EditCommand)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    /// An empty queue without history.
    pub fn new() -> Self {
        Self::with_max_history(0)
    }

    /// An empty queue that keeps up to `max_history` applied commands.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            pending: Vec::new(),
            history: Vec::new(),
            max_history,
        }
    }

    pub fn push(&mut self, command: EditCommand) {
        self.pending.push(command);
    }

    pub fn push_batch(&mut self, commands: impl IntoIterator<Item = EditCommand>) {
        self.pending.extend(commands);
    }

    /// Take all pending commands in submission order, recording them in the
    /// history under `tick`.
    pub fn drain(&mut self, tick: Ticks) -> Vec<EditCommand> {
        let commands: Vec<EditCommand> = self.pending.drain(..).collect();

        if self.max_history > 0 {
            self.history
                .extend(commands.iter().map(|cmd| (tick, cmd.clone())));
            let excess = self.history.len().saturating_sub(self.max_history);
            if excess > 0 {
                self.history.drain(..excess);
            }
        }

        commands
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Discard pending commands without applying them.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn history(&self) -> &[(Ticks, EditCommand)] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn node_id() -> NodeId {
        let mut sm = SlotMap::<NodeId, ()>::with_key();
        sm.insert(())
    }

    fn add_machine() -> EditCommand {
        EditCommand::AddNode {
            kind: NodeKind::Machine,
            position: Position::new(40.0, 80.0),
        }
    }

    #[test]
    fn new_queue_is_empty() {
        let queue = CommandQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.history().is_empty());
    }

    #[test]
    fn drain_preserves_submission_order() {
        let mut queue = CommandQueue::new();
        let node = node_id();
        queue.push(add_machine());
        queue.push_batch([EditCommand::RemoveNode { node }, EditCommand::Reset]);
        assert_eq!(queue.pending_count(), 3);

        let drained = queue.drain(7);
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0], add_machine());
        assert_eq!(drained[1], EditCommand::RemoveNode { node });
        assert_eq!(drained[2], EditCommand::Reset);
        assert!(queue.is_empty());
    }

    #[test]
    fn no_history_by_default() {
        let mut queue = CommandQueue::new();
        queue.push(add_machine());
        queue.drain(1);
        assert!(queue.history().is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let mut queue = CommandQueue::with_max_history(2);
        for tick in 0..3 {
            queue.push(add_machine());
            queue.drain(tick);
        }
        let ticks: Vec<Ticks> = queue.history().iter().map(|(t, _)| *t).collect();
        assert_eq!(ticks, vec![1, 2]);

        queue.clear_history();
        assert!(queue.history().is_empty());
    }

    #[test]
    fn clear_pending_discards() {
        let mut queue = CommandQueue::with_max_history(4);
        queue.push(EditCommand::Reset);
        queue.clear_pending();
        assert!(queue.drain(0).is_empty());
        assert!(queue.history().is_empty());
    }
}
