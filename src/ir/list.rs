//! Instruction lists and the scoped erase pool.
//!
//! Passes walk an [`InstructionList`] by position while rewriting it. To keep
//! that walk valid, deletion goes through an [`ErasePool`]: marking an
//! instruction only tombstones it, and the tombstoned entries are removed
//! when the pool goes out of scope. Insertion through the pool takes effect
//! immediately, so the rest of the walk sees new instructions.
//!
//! # Example
//!
//! ```rust,ignore
//! use decoflow::ir::{ErasePool, Expression, Instruction, InstructionList};
//!
//! let mut list = InstructionList::new();
//! list.push(Instruction::push(0x10, Expression::register(1)));
//! list.push(Instruction::pop(0x14, Expression::register(2)));
//!
//! {
//!     let mut pool = ErasePool::new(&mut list);
//!     pool.mark(0);
//!     pool.mark(0);
//!     assert_eq!(pool.len(), 2); // still there while the pool lives
//! }
//! assert_eq!(list.len(), 1);
//! ```

use crate::ir::{
    instruction::{InstrId, Instruction},
    Address,
};

/// An ordered instruction stream, the content of a function or of one node.
///
/// Every instruction placed in the list receives an [`InstrId`] unique
/// within the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionList {
    instructions: Vec<Instruction>,
    next_id: u32,
}

impl InstructionList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        InstructionList::default()
    }

    /// Builds a list from instructions that already carry ids, keeping them.
    pub(crate) fn from_placed(instructions: Vec<Instruction>) -> Self {
        let next_id = instructions
            .iter()
            .map(|i| i.id())
            .filter(|id| *id != InstrId::UNASSIGNED)
            .map(|id| id.value() + 1)
            .max()
            .unwrap_or(0);
        InstructionList {
            instructions,
            next_id,
        }
    }

    fn allocate(&mut self, instruction: &mut Instruction) -> InstrId {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        instruction.set_id(id);
        id
    }

    /// Appends an instruction and returns its id.
    pub fn push(&mut self, mut instruction: Instruction) -> InstrId {
        let id = self.allocate(&mut instruction);
        self.instructions.push(instruction);
        id
    }

    /// Inserts an instruction before position `index` and returns its id.
    ///
    /// An `index` past the end appends.
    pub fn insert(&mut self, index: usize, mut instruction: Instruction) -> InstrId {
        let id = self.allocate(&mut instruction);
        let index = index.min(self.instructions.len());
        self.instructions.insert(index, instruction);
        id
    }

    /// Returns the number of instructions, including tombstoned ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the list holds no instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Returns the instruction at `index` mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.instructions.get_mut(index)
    }

    /// Returns the first instruction.
    #[must_use]
    pub fn first(&self) -> Option<&Instruction> {
        self.instructions.first()
    }

    /// Returns the last instruction.
    #[must_use]
    pub fn last(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    /// Iterates the instructions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Iterates the instructions mutably in order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Instruction> {
        self.instructions.iter_mut()
    }

    /// Returns the instructions as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the current position of the instruction with the given id.
    #[must_use]
    pub fn position_of(&self, id: InstrId) -> Option<usize> {
        self.instructions.iter().position(|i| i.id() == id)
    }

    /// Finds the first live instruction at `address`, searching from position `from`.
    #[must_use]
    pub fn find_address(&self, address: Address, from: usize) -> Option<usize> {
        self.instructions
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, i)| i.address() == address && !i.is_pending_deletion())
            .map(|(index, _)| index)
    }

    /// Removes every tombstoned instruction. Returns how many were removed.
    pub(crate) fn sweep(&mut self) -> usize {
        let before = self.instructions.len();
        self.instructions.retain(|i| !i.is_pending_deletion());
        before - self.instructions.len()
    }

    /// Consumes the list, returning its instructions.
    #[must_use]
    pub fn into_vec(self) -> Vec<Instruction> {
        self.instructions
    }
}

impl From<Vec<Instruction>> for InstructionList {
    fn from(instructions: Vec<Instruction>) -> Self {
        instructions.into_iter().collect()
    }
}

impl FromIterator<Instruction> for InstructionList {
    fn from_iter<T: IntoIterator<Item = Instruction>>(iter: T) -> Self {
        let mut list = InstructionList::new();
        for instruction in iter {
            list.push(instruction);
        }
        list
    }
}

impl<'a> IntoIterator for &'a InstructionList {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

/// Deferred deletion scope over an [`InstructionList`].
///
/// Holds the list exclusively for the duration of one pass. Marked
/// instructions stay in place, flagged as pending deletion, until the pool
/// is dropped or [`apply`](ErasePool::apply)d; then all of them are removed
/// in one sweep.
pub struct ErasePool<'a> {
    list: &'a mut InstructionList,
    marked: usize,
}

impl<'a> ErasePool<'a> {
    /// Opens a pool over `list`.
    pub fn new(list: &'a mut InstructionList) -> Self {
        ErasePool { list, marked: 0 }
    }

    /// Marks the instruction at `index` for deletion.
    ///
    /// Returns `true` if it was newly marked; marking twice is a no-op.
    pub fn mark(&mut self, index: usize) -> bool {
        let newly = self
            .list
            .get_mut(index)
            .is_some_and(Instruction::mark_pending_deletion);
        if newly {
            self.marked += 1;
        }
        newly
    }

    /// Marks the instruction with the given id for deletion.
    pub fn mark_id(&mut self, id: InstrId) -> bool {
        match self.list.position_of(id) {
            Some(index) => self.mark(index),
            None => false,
        }
    }

    /// Inserts an instruction before `index`, visible immediately.
    pub fn insert(&mut self, index: usize, instruction: Instruction) -> InstrId {
        self.list.insert(index, instruction)
    }

    /// Returns the underlying list.
    #[must_use]
    pub fn list(&self) -> &InstructionList {
        &*self.list
    }

    /// Returns the instruction at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.list.get(index)
    }

    /// Returns the instruction at `index` mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.list.get_mut(index)
    }

    /// Returns the number of instructions, including marked ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Returns how many instructions were marked through this pool.
    #[must_use]
    pub fn marked(&self) -> usize {
        self.marked
    }

    /// Closes the pool now. Returns the number of instructions removed.
    pub fn apply(mut self) -> usize {
        self.marked = 0;
        self.list.sweep()
    }
}

impl Drop for ErasePool<'_> {
    fn drop(&mut self) {
        if self.marked > 0 {
            self.list.sweep();
        }
    }
}
