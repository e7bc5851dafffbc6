//! The factory graph: nodes, directed edges, and adjacency.
//!
//! Nodes and edges live in `SlotMap` arenas so stale ids never resolve to a
//! different entity. Adjacency is a `SecondaryMap` keyed by `NodeId` that
//! stays in sync with the node arena. An insertion-order index of node ids
//! is rebuilt on structural edits only; the tick loop walks it so that
//! "first encountered" always means "placed first".
//!
//! Parallel edges and cycles are allowed. Self-loops are rejected.

use slotmap::{SecondaryMap, SlotMap};

use crate::id::*;
use crate::node::{Node, NodeKind, NodeParams, Position};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during graph edits.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("edge not found: {0:?}")]
    EdgeNotFound(EdgeId),
    #[error("cannot connect node {0:?} to itself")]
    SelfLoop(NodeId),
}

// ---------------------------------------------------------------------------
// Core data structures
// ---------------------------------------------------------------------------

/// Adjacency lists for a single node, in edge creation order.
#[derive(Debug, Clone, Default)]
struct NodeAdjacency {
    /// Edges whose destination is this node.
    inputs: Vec<EdgeId>,
    /// Edges whose source is this node.
    outputs: Vec<EdgeId>,
}

/// Per-edge data stored in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EdgeData {
    /// Source node.
    pub from: NodeId,
    /// Destination node.
    pub to: NodeId,
}

/// What a node removal took with it.
#[derive(Debug, Clone)]
pub struct RemovedNode {
    pub node: Node,
    pub edges: Vec<EdgeId>,
}

// ---------------------------------------------------------------------------
// FactoryGraph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FactoryGraph {
    nodes: SlotMap<NodeId, Node>,
    edges: SlotMap<EdgeId, EdgeData>,
    adjacency: SecondaryMap<NodeId, NodeAdjacency>,
    /// Node ids in placement order.
    order: Vec<NodeId>,
    next_serial: u32,
}

impl Default for FactoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryGraph {
    /// Create a new, empty graph.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            adjacency: SecondaryMap::new(),
            order: Vec::new(),
            next_serial: 1,
        }
    }

    fn rebuild_order(&mut self) {
        let nodes = &self.nodes;
        self.order.retain(|id| nodes.contains_key(*id));
    }

    // -----------------------------------------------------------------------
    // Structural edits
    // -----------------------------------------------------------------------

    /// Place a node. Returns its id.
    pub fn add_node(&mut self, kind: NodeKind, position: Position, params: NodeParams) -> NodeId {
        let serial = NodeSerial(self.next_serial);
        self.next_serial += 1;
        let id = self.nodes.insert(Node::new(serial, kind, position, params));
        self.adjacency.insert(id, NodeAdjacency::default());
        self.order.push(id);
        id
    }

    /// Connect `from` to `to`. Parallel edges are allowed; self-loops are not.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<EdgeId, GraphError> {
        if !self.nodes.contains_key(from) {
            return Err(GraphError::NodeNotFound(from));
        }
        if !self.nodes.contains_key(to) {
            return Err(GraphError::NodeNotFound(to));
        }
        if from == to {
            return Err(GraphError::SelfLoop(from));
        }

        let edge = self.edges.insert(EdgeData { from, to });
        if let Some(adj) = self.adjacency.get_mut(from) {
            adj.outputs.push(edge);
        }
        if let Some(adj) = self.adjacency.get_mut(to) {
            adj.inputs.push(edge);
        }
        Ok(edge)
    }

    /// Remove an edge.
    pub fn disconnect(&mut self, edge: EdgeId) -> Result<EdgeData, GraphError> {
        let data = self
            .edges
            .remove(edge)
            .ok_or(GraphError::EdgeNotFound(edge))?;
        if let Some(adj) = self.adjacency.get_mut(data.from) {
            adj.outputs.retain(|&e| e != edge);
        }
        if let Some(adj) = self.adjacency.get_mut(data.to) {
            adj.inputs.retain(|&e| e != edge);
        }
        Ok(data)
    }

    /// Remove a node and every edge that touches it.
    ///
    /// The returned node still carries its queue and held part; the caller
    /// decides what happens to those parts.
    pub fn remove_node(&mut self, node: NodeId) -> Result<RemovedNode, GraphError> {
        let adj = self
            .adjacency
            .remove(node)
            .ok_or(GraphError::NodeNotFound(node))?;

        let mut removed_edges = Vec::with_capacity(adj.inputs.len() + adj.outputs.len());
        for edge in adj.inputs.into_iter().chain(adj.outputs) {
            if self.disconnect(edge).is_ok() {
                removed_edges.push(edge);
            }
        }

        let node_data = self
            .nodes
            .remove(node)
            .ok_or(GraphError::NodeNotFound(node))?;
        self.rebuild_order();

        Ok(RemovedNode {
            node: node_data,
            edges: removed_edges,
        })
    }

    /// Remove everything. Serial numbering continues where it left off.
    pub fn clear(&mut self) {
        let next_serial = self.next_serial;
        *self = Self::new();
        self.next_serial = next_serial;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn node_mut(&mut self, node: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node)
    }

    pub fn edge(&self, edge: EdgeId) -> Option<&EdgeData> {
        self.edges.get(edge)
    }

    /// Resolve both endpoints of an edge. `None` if the edge or either
    /// endpoint no longer exists.
    pub fn resolve_edge(&self, edge: EdgeId) -> Option<(&Node, &Node)> {
        let data = self.edges.get(edge)?;
        Some((self.nodes.get(data.from)?, self.nodes.get(data.to)?))
    }

    /// Edges ending at `node`, oldest first.
    pub fn inputs(&self, node: NodeId) -> &[EdgeId] {
        self.adjacency
            .get(node)
            .map(|adj| adj.inputs.as_slice())
            .unwrap_or(&[])
    }

    /// Edges leaving `node`, oldest first.
    pub fn outputs(&self, node: NodeId) -> &[EdgeId] {
        self.adjacency
            .get(node)
            .map(|adj| adj.outputs.as_slice())
            .unwrap_or(&[])
    }

    /// The route a part leaving `node` takes.
    pub fn first_output(&self, node: NodeId) -> Option<EdgeId> {
        self.outputs(node).first().copied()
    }

    /// Predecessor node ids in input-edge order. May repeat for parallel edges.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.inputs(node)
            .iter()
            .filter_map(|&e| self.edges.get(e).map(|d| d.from))
    }

    /// Successor node ids in output-edge order. May repeat for parallel edges.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.outputs(node)
            .iter()
            .filter_map(|&e| self.edges.get(e).map(|d| d.to))
    }

    /// Node ids in placement order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Node ids of one kind, in placement order.
    pub fn ids_of_kind(&self, kind: NodeKind) -> Vec<NodeId> {
        self.order
            .iter()
            .copied()
            .filter(|&id| self.nodes.get(id).is_some_and(|n| n.kind == kind))
            .collect()
    }

    /// Nodes in placement order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.order
            .iter()
            .filter_map(|&id| self.nodes.get(id).map(|n| (id, n)))
    }

    /// All edges (arena order).
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &EdgeData)> {
        self.edges.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn contains_edge(&self, edge: EdgeId) -> bool {
        self.edges.contains_key(edge)
    }
}
