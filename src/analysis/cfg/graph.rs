//! Control Flow Graph implementation.
//!
//! This module provides the main [`ControlFlowGraph`] structure that wraps the
//! basic blocks of one function with graph semantics.

use std::fmt;

use crate::{
    analysis::cfg::{CfgEdgeKind, Node},
    ir::{Address, Instruction, RegisterFile},
    utils::graph::{DirectedGraph, NodeId},
};

/// A control flow graph over the [`Node`]s of one function.
///
/// Node ids follow creation order, which is program order: the entry node
/// is always node 0. The successors of a conditional jump node are listed
/// branch target first, fall-through second.
///
/// # Construction
///
/// ```rust,ignore
/// use decoflow::analysis::CfgBuilder;
/// use decoflow::compiler::EventLog;
///
/// let events = EventLog::new();
/// let cfg = CfgBuilder::new(&events).build(instructions)?;
/// println!("CFG has {} nodes", cfg.node_count());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    graph: DirectedGraph<Node, CfgEdgeKind>,
}

impl ControlFlowGraph {
    pub(crate) fn from_graph(graph: DirectedGraph<Node, CfgEdgeKind>) -> Self {
        ControlFlowGraph { graph }
    }

    /// Returns the entry node, `None` for an empty graph.
    #[must_use]
    pub fn entry(&self) -> Option<NodeId> {
        (!self.graph.is_empty()).then(|| NodeId::new(0))
    }

    /// Returns the nodes without successors.
    #[must_use]
    pub fn exits(&self) -> Vec<NodeId> {
        self.graph
            .node_ids()
            .filter(|&id| self.graph.out_degree(id) == 0)
            .collect()
    }

    /// Returns the node with the given id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.node(id)
    }

    /// Returns the node with the given id mutably.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.graph.node_mut(id)
    }

    /// Returns the node starting at `address`.
    #[must_use]
    pub fn node_at(&self, address: Address) -> Option<NodeId> {
        self.graph
            .nodes()
            .find(|(_, node)| node.address() == address && !node.instructions().is_empty())
            .map(|(id, _)| id)
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of resolved edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Iterates node ids in creation order.
    pub fn node_ids(&self) -> impl DoubleEndedIterator<Item = NodeId> + '_ {
        self.graph.node_ids()
    }

    /// Iterates nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.graph.nodes()
    }

    /// Iterates nodes mutably in creation order.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut Node)> + '_ {
        self.graph.nodes_mut()
    }

    /// Iterates the resolved successors of `id` with their edge kinds.
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = (NodeId, CfgEdgeKind)> + '_ {
        self.graph.outgoing(id).map(|(target, kind)| (target, *kind))
    }

    /// Iterates the resolved successors of `id`.
    pub fn successors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.successors(id)
    }

    /// Iterates the predecessors of `id`.
    pub fn predecessors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.predecessors(id)
    }

    /// Returns the total number of instructions over all nodes.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.graph.nodes().map(|(_, node)| node.instructions().len()).sum()
    }

    /// Iterates all instructions in node order.
    pub fn instructions(&self) -> impl Iterator<Item = (NodeId, &Instruction)> + '_ {
        self.graph.nodes().flat_map(|(id, node)| {
            node.instructions()
                .iter()
                .map(move |instruction| (id, instruction))
        })
    }

    /// Returns the first instruction at `address` in any node.
    #[must_use]
    pub fn instruction_at(&self, address: Address) -> Option<&Instruction> {
        self.instructions()
            .map(|(_, instruction)| instruction)
            .find(|instruction| instruction.address() == address)
    }

    /// Renders every node with its analysis state for diagnostics.
    #[must_use]
    pub fn dump<'a>(&'a self, registers: &'a dyn RegisterFile) -> GraphDump<'a> {
        GraphDump {
            cfg: self,
            registers,
        }
    }
}

/// Diagnostic rendering of a [`ControlFlowGraph`], see [`ControlFlowGraph::dump`].
pub struct GraphDump<'a> {
    cfg: &'a ControlFlowGraph,
    registers: &'a dyn RegisterFile,
}

impl fmt::Display for GraphDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, node) in self.cfg.nodes() {
            write!(f, "{id}: {}", node.dump(self.registers))?;
        }
        Ok(())
    }
}
