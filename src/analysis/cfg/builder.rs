//! Splits an instruction stream into basic blocks.
//!
//! The builder makes one forward pass over the flat instruction list:
//!
//! - a `Label` or `Case` closes the pending run as a fall-through node and
//!   starts a new run with itself
//! - a `Jump`, `ConditionalJump` or `Return` closes the run including itself
//! - anything else joins the pending run
//!
//! Successor addresses are read off the terminating instruction. Once every
//! node exists, a second pass maps each address to the node that starts
//! there and adds the edges. Addresses that match no node are logged and
//! left unconnected; the builder never fails on malformed flow.

use rustc_hash::FxHashMap;

use crate::{
    analysis::cfg::{CfgEdgeKind, ControlFlowGraph, Node, NodeKind},
    compiler::{EventKind, EventLog},
    ir::{Address, Instruction, InstructionKind, InstructionList},
    utils::graph::DirectedGraph,
    Result,
};

/// Builds a [`ControlFlowGraph`] from a flat instruction list.
pub struct CfgBuilder<'a> {
    events: &'a EventLog,
    nodes: Vec<Node>,
    pending: Vec<Instruction>,
}

impl<'a> CfgBuilder<'a> {
    /// Creates a builder that records diagnostics into `events`.
    #[must_use]
    pub fn new(events: &'a EventLog) -> Self {
        CfgBuilder {
            events,
            nodes: Vec::new(),
            pending: Vec::new(),
        }
    }

    /// Consumes the builder and splits `instructions` into nodes.
    ///
    /// An empty list yields an empty graph.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if an edge cannot be added, which
    /// only happens when the internal node bookkeeping is inconsistent.
    pub fn build(mut self, instructions: InstructionList) -> Result<ControlFlowGraph> {
        let mut stream = instructions.into_vec().into_iter().peekable();

        while let Some(instruction) = stream.next() {
            match instruction.kind() {
                InstructionKind::Label(_) | InstructionKind::Case(_) => {
                    let address = instruction.address();
                    self.flush(NodeKind::FallThrough, vec![Some(address)]);
                    self.pending.push(instruction);
                }
                InstructionKind::Jump(target) => {
                    let successor = target.global_address();
                    if successor.is_none() {
                        self.events
                            .record(EventKind::Warning)
                            .at(instruction.address())
                            .message(format!("jump target '{target}' is not a code address"));
                    }
                    self.pending.push(instruction);
                    self.flush(NodeKind::Jump, vec![successor]);
                }
                InstructionKind::ConditionalJump { target, .. } => {
                    let branch = target.global_address();
                    if branch.is_none() {
                        self.events
                            .record(EventKind::Warning)
                            .at(instruction.address())
                            .message(format!("branch target '{target}' is not a code address"));
                    }
                    let fall_through = stream.peek().map(Instruction::address);
                    if fall_through.is_none() {
                        self.events
                            .record(EventKind::Warning)
                            .at(instruction.address())
                            .message("conditional jump at the end of the function has no fall-through");
                    }
                    self.pending.push(instruction);
                    self.flush(NodeKind::ConditionalJump, vec![branch, fall_through]);
                }
                InstructionKind::Return(_) => {
                    self.pending.push(instruction);
                    self.flush(NodeKind::Return, Vec::new());
                }
                _ => self.pending.push(instruction),
            }
        }

        if let Some(first) = self.pending.first() {
            self.events
                .record(EventKind::Warning)
                .at(first.address())
                .message("instructions after the last control transfer form an open-ended node");
            self.flush(NodeKind::FallThrough, vec![None]);
        }

        self.connect()
    }

    /// Closes the pending run as a node. Does nothing for an empty run.
    fn flush(&mut self, kind: NodeKind, successors: Vec<Option<Address>>) {
        if self.pending.is_empty() {
            return;
        }
        let instructions = std::mem::take(&mut self.pending);

        let mut previous: Option<Address> = None;
        for instruction in &instructions {
            if let Some(previous) = previous {
                if instruction.address() < previous {
                    let error = malformed_error!(
                        "address {:08x} follows {:08x} inside a node",
                        instruction.address(),
                        previous
                    );
                    self.events
                        .record(EventKind::Error)
                        .at(instruction.address())
                        .message(error.to_string());
                }
            }
            previous = Some(instruction.address());
        }

        self.nodes.push(Node::new(
            kind,
            InstructionList::from_placed(instructions),
            successors,
        ));
    }

    /// Resolves successor addresses into edges.
    fn connect(self) -> Result<ControlFlowGraph> {
        let mut graph: DirectedGraph<Node, CfgEdgeKind> =
            DirectedGraph::with_capacity(self.nodes.len(), self.nodes.len() * 2);

        let mut by_address: FxHashMap<Address, _> = FxHashMap::default();
        for node in self.nodes {
            let address = node.address();
            let id = graph.add_node(node);
            by_address.entry(address).or_insert(id);
            self.events
                .record(EventKind::NodeCreated)
                .at(address)
                .node(id);
        }

        let mut edges = Vec::new();
        for (id, node) in graph.nodes() {
            for (slot, successor) in node.successor_addresses().iter().enumerate() {
                let Some(address) = *successor else {
                    continue;
                };
                let kind = match (node.kind(), slot) {
                    (NodeKind::ConditionalJump, 0) => CfgEdgeKind::ConditionalTrue,
                    (NodeKind::ConditionalJump, _) => CfgEdgeKind::ConditionalFalse,
                    _ => CfgEdgeKind::Unconditional,
                };
                match by_address.get(&address) {
                    Some(&target) => edges.push((id, target, kind)),
                    None => {
                        self.events
                            .record(EventKind::EdgeUnresolved)
                            .at(node.end_address())
                            .node(id)
                            .message(format!("unable to find successor node at {address:08x}"));
                    }
                }
            }
        }

        for (source, target, kind) in edges {
            graph.add_edge(source, target, kind)?;
        }

        Ok(ControlFlowGraph::from_graph(graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BinaryOperator, Expression},
        utils::graph::NodeId,
    };

    fn r(reg: u16) -> crate::ir::ExprRef {
        Expression::register(reg)
    }

    fn build(instructions: Vec<Instruction>) -> (ControlFlowGraph, EventLog) {
        let events = EventLog::new();
        let cfg = CfgBuilder::new(&events)
            .build(InstructionList::from(instructions))
            .unwrap();
        (cfg, events)
    }

    #[test]
    fn test_empty_stream() {
        let (cfg, events) = build(Vec::new());
        assert!(cfg.is_empty());
        assert_eq!(cfg.entry(), None);
        assert!(events.is_empty());
    }

    #[test]
    fn test_conditional_jump_successors() {
        let (cfg, _) = build(vec![
            Instruction::assignment(6, r(1), Expression::number(1)),
            Instruction::conditional_jump(
                10,
                Expression::binary(BinaryOperator::NotEqual, r(1), Expression::number(0)),
                Expression::global_at("L", 20),
            ),
            Instruction::assignment(14, r(2), Expression::number(2)),
            Instruction::label(20, "L"),
            Instruction::ret(24, Expression::dummy()),
        ]);

        assert_eq!(cfg.node_count(), 3);
        let first = cfg.node(NodeId::new(0)).unwrap();
        assert_eq!(first.kind(), NodeKind::ConditionalJump);
        assert_eq!(first.end_address(), 10);
        assert_eq!(first.successor_addresses(), &[Some(20), Some(14)]);

        let outgoing: Vec<_> = cfg.outgoing(NodeId::new(0)).collect();
        assert_eq!(
            outgoing,
            vec![
                (NodeId::new(2), CfgEdgeKind::ConditionalTrue),
                (NodeId::new(1), CfgEdgeKind::ConditionalFalse),
            ]
        );

        // 14 falls through into the label
        let middle = cfg.node(NodeId::new(1)).unwrap();
        assert_eq!(middle.kind(), NodeKind::FallThrough);
        assert_eq!(cfg.successors(NodeId::new(1)).collect::<Vec<_>>(), vec![NodeId::new(2)]);
        assert_eq!(cfg.exits(), vec![NodeId::new(2)]);
    }

    #[test]
    fn test_case_starts_node() {
        let (cfg, _) = build(vec![
            Instruction::switch(0, r(0)),
            Instruction::case(4, 1),
            Instruction::ret(8, r(0)),
        ]);
        assert_eq!(cfg.node_count(), 2);
        assert_eq!(cfg.node(NodeId::new(1)).map(Node::address), Some(4));
    }

    #[test]
    fn test_unresolved_successor_is_logged() {
        let (cfg, events) = build(vec![
            Instruction::jump(0, Expression::global_at("far", 0x1000)),
            Instruction::label(4, "L"),
            Instruction::ret(8, Expression::dummy()),
        ]);
        assert_eq!(cfg.edge_count(), 0);
        assert_eq!(events.count_kind(EventKind::EdgeUnresolved), 1);
    }

    #[test]
    fn test_indirect_jump_has_no_successor() {
        let (cfg, events) = build(vec![Instruction::jump(0, r(1))]);
        let node = cfg.node(NodeId::new(0)).unwrap();
        assert_eq!(node.kind(), NodeKind::Jump);
        assert_eq!(node.successor_addresses(), &[None]);
        assert_eq!(events.count_kind(EventKind::Warning), 1);
    }

    #[test]
    fn test_trailing_run_is_kept() {
        let (cfg, events) = build(vec![
            Instruction::ret(0, Expression::dummy()),
            Instruction::assignment(4, r(1), r(2)),
            Instruction::push(8, r(1)),
        ]);
        assert_eq!(cfg.node_count(), 2);
        let tail = cfg.node(NodeId::new(1)).unwrap();
        assert_eq!(tail.kind(), NodeKind::FallThrough);
        assert_eq!(tail.instructions().len(), 2);
        assert!(events.has(EventKind::Warning));
    }

    #[test]
    fn test_address_order_violation_is_logged() {
        let (cfg, events) = build(vec![
            Instruction::assignment(8, r(1), r(2)),
            Instruction::ret(4, r(1)),
        ]);
        assert_eq!(cfg.node_count(), 1);
        assert_eq!(events.count_kind(EventKind::Error), 1);
    }

    #[test]
    fn test_instruction_ids_survive_split() {
        let (cfg, _) = build(vec![
            Instruction::assignment(0, r(1), r(2)),
            Instruction::label(4, "L"),
            Instruction::ret(8, r(1)),
        ]);
        let second = cfg.node(NodeId::new(1)).unwrap();
        let ids: Vec<_> = second.instructions().iter().map(|i| i.id().value()).collect();
        assert_eq!(ids, vec![1, 2]);
    }
}
