//! Basic blocks of the control flow graph.

use std::fmt;

use strum::Display;

use crate::ir::{Address, Instruction, InstructionList, RegisterFile, RegisterSet};

/// How control leaves a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum NodeKind {
    /// Runs into the node that follows it.
    FallThrough,
    /// Ends with an unconditional jump.
    Jump,
    /// Ends with a conditional jump: branch target, then fall-through.
    ConditionalJump,
    /// Ends with a return.
    Return,
}

/// A basic block: a maximal run of instructions with control transfer only at the end.
///
/// Besides its instructions a node carries the aggregate register sets used
/// by live-variable analysis. Successor addresses are recorded when the node
/// is created and resolved into graph edges once all nodes exist.
#[derive(Debug, Clone)]
pub struct Node {
    kind: NodeKind,
    address: Address,
    instructions: InstructionList,
    successor_addresses: Vec<Option<Address>>,
    uses: RegisterSet,
    definitions: RegisterSet,
    live_in: RegisterSet,
    live_out: RegisterSet,
}

impl Node {
    /// Creates a node over `instructions`.
    ///
    /// The node address is the address of its first instruction.
    #[must_use]
    pub fn new(
        kind: NodeKind,
        instructions: InstructionList,
        successor_addresses: Vec<Option<Address>>,
    ) -> Self {
        let address = instructions.first().map_or(0, Instruction::address);
        Node {
            kind,
            address,
            instructions,
            successor_addresses,
            uses: RegisterSet::new(),
            definitions: RegisterSet::new(),
            live_in: RegisterSet::new(),
            live_out: RegisterSet::new(),
        }
    }

    /// Returns how control leaves this node.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Returns the address of the first instruction.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns the address of the last instruction.
    #[must_use]
    pub fn end_address(&self) -> Address {
        self.instructions.last().map_or(self.address, Instruction::address)
    }

    /// Returns the instructions.
    #[must_use]
    pub fn instructions(&self) -> &InstructionList {
        &self.instructions
    }

    /// Returns the instructions mutably.
    pub fn instructions_mut(&mut self) -> &mut InstructionList {
        &mut self.instructions
    }

    /// Returns the successor addresses recorded at creation, `None` where
    /// the target could not be determined.
    #[must_use]
    pub fn successor_addresses(&self) -> &[Option<Address>] {
        &self.successor_addresses
    }

    /// Returns the registers read before being written in this node.
    #[must_use]
    pub fn uses(&self) -> RegisterSet {
        self.uses
    }

    /// Returns the registers written in this node.
    #[must_use]
    pub fn definitions(&self) -> RegisterSet {
        self.definitions
    }

    /// Replaces the aggregate use and definition sets.
    pub fn set_registers(&mut self, definitions: RegisterSet, uses: RegisterSet) {
        self.definitions = definitions;
        self.uses = uses;
    }

    /// Returns the registers live on entry.
    #[must_use]
    pub fn live_in(&self) -> RegisterSet {
        self.live_in
    }

    /// Returns the registers live on exit.
    #[must_use]
    pub fn live_out(&self) -> RegisterSet {
        self.live_out
    }

    /// Replaces the live sets. Returns `true` if either changed.
    pub fn set_live(&mut self, live_in: RegisterSet, live_out: RegisterSet) -> bool {
        let changed = self.live_in != live_in || self.live_out != live_out;
        self.live_in = live_in;
        self.live_out = live_out;
        changed
    }

    /// Renders the node header and its instructions for diagnostics.
    #[must_use]
    pub fn dump<'a>(&'a self, registers: &'a dyn RegisterFile) -> NodeDump<'a> {
        NodeDump {
            node: self,
            registers,
        }
    }
}

/// Diagnostic rendering of a [`Node`], see [`Node::dump`].
pub struct NodeDump<'a> {
    node: &'a Node,
    registers: &'a dyn RegisterFile,
}

impl fmt::Display for NodeDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node;
        let names = self.registers;
        write!(f, "{:08x} {}", node.address, node.kind)?;
        for successor in &node.successor_addresses {
            match successor {
                Some(address) => write!(f, " -> {address:08x}")?,
                None => write!(f, " -> ?")?,
            }
        }
        writeln!(
            f,
            " uses={} defs={} in={} out={}",
            node.uses.display(names),
            node.definitions.display(names),
            node.live_in.display(names),
            node.live_out.display(names)
        )?;
        for instruction in &node.instructions {
            writeln!(f, "  {}", instruction.dump(names))?;
        }
        Ok(())
    }
}
