//! Single-walk instruction pass framework.
//!
//! A pass implements [`InstructionAnalysis`] and overrides only the
//! handlers it needs. The driver walks each node's instructions forward:
//!
//! 1. instructions already pending deletion are skipped
//! 2. [`InstructionAnalysis::on_instruction`] runs for every live instruction
//! 3. unless it returned [`Flow::InstructionRemoved`], the typed handler for
//!    the instruction kind runs
//!
//! Handlers rewrite through a [`Cursor`]. Every deletion goes through the
//! node's [`ErasePool`], so the walk never loses its place; removed
//! instructions disappear when the driver closes the pool at the end of the
//! node. Insertions are visible immediately.

use crate::{
    analysis::ControlFlowGraph,
    compiler::{AnalysisConfig, EventBuilder, EventKind, EventLog},
    ir::{
        Address, ErasePool, InstrId, Instruction, InstructionList, InstructionType, RegisterFile,
        RegisterSet,
    },
    utils::graph::NodeId,
};

/// Everything a pass may consult besides the instructions themselves.
#[derive(Clone, Copy)]
pub struct PassContext<'a> {
    /// Active configuration
    pub config: &'a AnalysisConfig,
    /// Register naming and canonicalization
    pub registers: &'a dyn RegisterFile,
    /// Event log of the function being analysed
    pub events: &'a EventLog,
}

/// What the generic instruction hook decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Go on to the typed handler.
    Continue,
    /// The current instruction was removed, skip the typed handler.
    InstructionRemoved,
}

/// A pass made of one forward walk over the instructions.
///
/// All handlers default to doing nothing.
pub trait InstructionAnalysis {
    /// Unique name for logging and events.
    fn name(&self) -> &'static str;

    /// Should this pass run at all under `config`?
    fn should_run(&self, _config: &AnalysisConfig) -> bool {
        true
    }

    /// Called for every live instruction before the typed handler.
    fn on_instruction(&mut self, _cursor: &mut Cursor<'_>) -> Flow {
        Flow::Continue
    }

    /// Handle an `Assignment`.
    fn on_assignment(&mut self, _cursor: &mut Cursor<'_>) {}

    /// Handle a `Push`.
    fn on_push(&mut self, _cursor: &mut Cursor<'_>) {}

    /// Handle a `Pop`.
    fn on_pop(&mut self, _cursor: &mut Cursor<'_>) {}

    /// Handle an unlifted `LowLevel` instruction.
    fn on_low_level(&mut self, _cursor: &mut Cursor<'_>) {}

    /// Handle any other instruction kind.
    fn on_other(&mut self, _cursor: &mut Cursor<'_>) {}
}

/// The walk position of a running pass, with its rewrite helpers.
pub struct Cursor<'a> {
    pool: ErasePool<'a>,
    position: usize,
    node: Option<NodeId>,
    live_out: RegisterSet,
    pass: &'static str,
    context: PassContext<'a>,
}

impl<'a> Cursor<'a> {
    fn new(
        list: &'a mut InstructionList,
        node: Option<NodeId>,
        live_out: RegisterSet,
        pass: &'static str,
        context: PassContext<'a>,
    ) -> Self {
        Cursor {
            pool: ErasePool::new(list),
            position: 0,
            node,
            live_out,
            pass,
            context,
        }
    }

    /// Returns the position of the current instruction.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the node being walked, `None` for a flat list.
    #[must_use]
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Returns the LiveOut set of the node being walked.
    #[must_use]
    pub fn live_out(&self) -> RegisterSet {
        self.live_out
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &'a AnalysisConfig {
        self.context.config
    }

    /// Returns the register file.
    #[must_use]
    pub fn registers(&self) -> &'a dyn RegisterFile {
        self.context.registers
    }

    /// Returns the event log.
    #[must_use]
    pub fn events(&self) -> &'a EventLog {
        self.context.events
    }

    /// Starts an event attributed to this pass, node and the current instruction.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'a> {
        let mut builder = self.context.events.record(kind).pass(self.pass);
        if let Some(node) = self.node {
            builder = builder.node(node);
        }
        if let Some(current) = self.current() {
            builder = builder.at(current.address());
        }
        builder
    }

    /// Returns the current instruction.
    #[must_use]
    pub fn current(&self) -> Option<&Instruction> {
        self.pool.get(self.position)
    }

    /// Returns the current instruction mutably.
    pub fn current_mut(&mut self) -> Option<&mut Instruction> {
        self.pool.get_mut(self.position)
    }

    /// Returns the instruction at `index` in the node.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.pool.get(index)
    }

    /// Returns the instruction at `index` in the node mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.pool.get_mut(index)
    }

    /// Returns the number of instructions in the node, including pending ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Returns `true` if the node holds no instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Returns the current position of the instruction with the given id.
    #[must_use]
    pub fn position_of(&self, id: InstrId) -> Option<usize> {
        self.pool.list().position_of(id)
    }

    /// Finds the first live instruction at `address` after the current one.
    #[must_use]
    pub fn find_following(&self, address: Address) -> Option<usize> {
        self.pool.list().find_address(address, self.position + 1)
    }

    /// Returns the position of the next live instruction after the current one.
    #[must_use]
    pub fn next_live(&self) -> Option<usize> {
        (self.position + 1..self.pool.len())
            .find(|&index| self.pool.get(index).is_some_and(|i| !i.is_pending_deletion()))
    }

    /// Inserts an instruction before the current one.
    ///
    /// The cursor keeps pointing at the same instruction.
    pub fn insert_before(&mut self, instruction: Instruction) -> InstrId {
        let id = self.pool.insert(self.position, instruction);
        self.position += 1;
        id
    }

    /// Inserts an instruction before position `index`.
    ///
    /// Inserting at or before the current instruction keeps the cursor on it.
    pub fn insert_at(&mut self, index: usize, instruction: Instruction) -> InstrId {
        let id = self.pool.insert(index, instruction);
        if index <= self.position {
            self.position += 1;
        }
        id
    }

    /// Replaces the current instruction: inserts `instruction` before it and
    /// marks the current one for deletion.
    pub fn replace(&mut self, instruction: Instruction) -> InstrId {
        let id = self.insert_before(instruction);
        self.erase_current();
        id
    }

    /// Marks the current instruction for deletion.
    pub fn erase_current(&mut self) -> bool {
        self.pool.mark(self.position)
    }

    /// Marks the instruction at `index` for deletion.
    pub fn erase_at(&mut self, index: usize) -> bool {
        self.pool.mark(index)
    }

    /// Marks the instruction with the given id for deletion.
    pub fn erase_id(&mut self, id: InstrId) -> bool {
        self.pool.mark_id(id)
    }

    /// Marks the next `count` live instructions after the current one.
    ///
    /// Returns how many were marked; fewer if the node ends first.
    pub fn erase_following(&mut self, count: usize) -> usize {
        let mut erased = 0;
        let mut index = self.position + 1;
        while erased < count && index < self.pool.len() {
            if self.pool.mark(index) {
                erased += 1;
            }
            index += 1;
        }
        erased
    }

    fn finish(self) -> usize {
        self.pool.apply()
    }
}

/// Runs `pass` over every node of `cfg` in creation order.
///
/// Returns the number of instructions removed.
pub fn run_on_graph<P: InstructionAnalysis + ?Sized>(
    pass: &mut P,
    cfg: &mut ControlFlowGraph,
    context: PassContext<'_>,
) -> usize {
    let name = pass.name();
    let ids: Vec<NodeId> = cfg.node_ids().collect();
    let mut removed = 0;

    for id in ids {
        let Some(node) = cfg.node_mut(id) else {
            continue;
        };
        let live_out = node.live_out();
        let mut cursor = Cursor::new(node.instructions_mut(), Some(id), live_out, name, context);
        drive(pass, &mut cursor);
        removed += cursor.finish();
    }

    removed
}

/// Runs `pass` over a flat instruction list, with an empty LiveOut.
///
/// Returns the number of instructions removed.
pub fn run_on_list<P: InstructionAnalysis + ?Sized>(
    pass: &mut P,
    list: &mut InstructionList,
    context: PassContext<'_>,
) -> usize {
    let name = pass.name();
    let mut cursor = Cursor::new(list, None, RegisterSet::new(), name, context);
    drive(pass, &mut cursor);
    cursor.finish()
}

fn drive<P: InstructionAnalysis + ?Sized>(pass: &mut P, cursor: &mut Cursor<'_>) {
    while cursor.position < cursor.len() {
        let live = cursor.current().is_some_and(|i| !i.is_pending_deletion());
        if live && pass.on_instruction(cursor) == Flow::Continue {
            let tag = cursor
                .current()
                .filter(|i| !i.is_pending_deletion())
                .map(Instruction::tag);
            match tag {
                Some(InstructionType::Assignment) => pass.on_assignment(cursor),
                Some(InstructionType::Push) => pass.on_push(cursor),
                Some(InstructionType::Pop) => pass.on_pop(cursor),
                Some(InstructionType::LowLevel) => pass.on_low_level(cursor),
                Some(_) => pass.on_other(cursor),
                None => {}
            }
        }
        cursor.position += 1;
    }
}
