use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a node (source, buffer, machine or sink) in the factory graph.
    pub struct NodeId;

    /// Identifies a directed transport edge in the factory graph.
    pub struct EdgeId;

    /// Identifies a live part.
    pub struct PartId;
}

/// Display number of a node (`MACHINE #3`). Allocated from a counter that
/// never hands out the same value twice within one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeSerial(pub u32);

impl std::fmt::Display for NodeSerial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn serial_displays_with_hash() {
        assert_eq!(NodeSerial(7).to_string(), "#7");
    }

    #[test]
    fn node_ids_are_not_reused_by_key_equality() {
        let mut sm = SlotMap::<NodeId, ()>::with_key();
        let a = sm.insert(());
        sm.remove(a);
        let b = sm.insert(());
        // Same slot, new version: stale keys never resolve to the new node.
        assert_ne!(a, b);
        assert!(!sm.contains_key(a));
    }
}
