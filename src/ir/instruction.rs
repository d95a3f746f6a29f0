//! Instructions of the intermediate representation.
//!
//! An [`Instruction`] pairs a program address with an [`InstructionKind`]
//! and carries the per-instruction analysis state: the registers it defines
//! and uses, the registers it is the final definition of, and its
//! definition-use chain.
//!
//! # Operand roles
//!
//! | Kind | Operand | Role |
//! |------|---------|------|
//! | Assignment | 0 destination | Definition, or Use when it is a unary expression (`*R1 = ...`) |
//! | Assignment | 1 source | Use, plus Definition when it is a call |
//! | Pop | 0 | Definition |
//! | Push, Jump, Return, Switch, Throw | 0 | Use |
//! | ConditionalJump | 0 condition, 1 target | Use |
//! | Label, Case, LowLevel | none | |

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumIter};

use crate::ir::{
    expression::{ExprRef, Expression},
    register::{DuChain, RegisterFile, RegisterSet},
    Address,
};

bitflags! {
    /// How an instruction accesses the registers inside one operand.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OperandRole: u8 {
        /// Registers in the operand are read
        const USE = 0b01;
        /// Registers in the operand are written
        const DEFINITION = 0b10;
    }
}

/// Stable identity of an instruction within one [`InstructionList`](crate::ir::InstructionList).
///
/// Positions shift when instructions are inserted; ids do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstrId(pub(crate) u32);

impl InstrId {
    /// Id of an instruction that has not been placed in a list yet.
    pub const UNASSIGNED: InstrId = InstrId(u32::MAX);

    /// Returns the raw id value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

/// Discriminant of [`InstructionKind`], used for dispatch and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum InstructionType {
    /// See [`InstructionKind::Assignment`]
    Assignment,
    /// See [`InstructionKind::Push`]
    Push,
    /// See [`InstructionKind::Pop`]
    Pop,
    /// See [`InstructionKind::Jump`]
    Jump,
    /// See [`InstructionKind::ConditionalJump`]
    ConditionalJump,
    /// See [`InstructionKind::Return`]
    Return,
    /// See [`InstructionKind::Label`]
    Label,
    /// See [`InstructionKind::Case`]
    Case,
    /// See [`InstructionKind::Switch`]
    Switch,
    /// See [`InstructionKind::Throw`]
    Throw,
    /// See [`InstructionKind::LowLevel`]
    LowLevel,
}

/// A machine instruction the lifter could not express in the IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowLevel {
    /// Architecture specific instruction type
    pub opcode: u32,
    /// Disassembly text, kept for diagnostics
    pub text: String,
}

/// The operation an instruction performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionKind {
    /// `destination = source`
    Assignment {
        /// Written location
        destination: ExprRef,
        /// Value written
        source: ExprRef,
    },
    /// Push a value on the machine stack
    Push(ExprRef),
    /// Pop the machine stack into a location
    Pop(ExprRef),
    /// Unconditional transfer to a target
    Jump(ExprRef),
    /// Transfer to `target` when `condition` holds
    ConditionalJump {
        /// Branch condition
        condition: ExprRef,
        /// Branch target
        target: ExprRef,
    },
    /// Return, with [`Expression::Dummy`] for no value
    Return(ExprRef),
    /// Jump target
    Label(String),
    /// Switch case entry
    Case(u64),
    /// Multi-way dispatch on a value
    Switch(ExprRef),
    /// Raise an exception, or rethrow the current one when `exception` is `None`
    Throw {
        /// Thrown value
        exception: Option<ExprRef>,
        /// Name of the thrown type, when known
        data_type: Option<String>,
    },
    /// Opaque, not yet lifted instruction
    LowLevel(LowLevel),
}

impl InstructionKind {
    /// Returns the discriminant.
    #[must_use]
    pub fn tag(&self) -> InstructionType {
        match self {
            Self::Assignment { .. } => InstructionType::Assignment,
            Self::Push(_) => InstructionType::Push,
            Self::Pop(_) => InstructionType::Pop,
            Self::Jump(_) => InstructionType::Jump,
            Self::ConditionalJump { .. } => InstructionType::ConditionalJump,
            Self::Return(_) => InstructionType::Return,
            Self::Label(_) => InstructionType::Label,
            Self::Case(_) => InstructionType::Case,
            Self::Switch(_) => InstructionType::Switch,
            Self::Throw { .. } => InstructionType::Throw,
            Self::LowLevel(_) => InstructionType::LowLevel,
        }
    }
}

/// Result of [`Instruction::remove_definition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionRemoval {
    /// The instruction has no removable definition of the register
    NotRemovable,
    /// The definition was dropped, the instruction stays as a placeholder or for its side effects
    Degraded,
    /// Nothing is left of the instruction, it should be erased
    EraseInstruction,
}

/// One instruction with its analysis state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    id: InstrId,
    address: Address,
    kind: InstructionKind,
    pending_deletion: bool,
    definitions: RegisterSet,
    uses: RegisterSet,
    last_definitions: RegisterSet,
    du_chain: DuChain,
}

impl Instruction {
    /// Creates an instruction with empty analysis state.
    #[must_use]
    pub fn new(address: Address, kind: InstructionKind) -> Self {
        Instruction {
            id: InstrId::UNASSIGNED,
            address,
            kind,
            pending_deletion: false,
            definitions: RegisterSet::new(),
            uses: RegisterSet::new(),
            last_definitions: RegisterSet::new(),
            du_chain: DuChain::new(),
        }
    }

    /// `destination = source`
    #[must_use]
    pub fn assignment(address: Address, destination: ExprRef, source: ExprRef) -> Self {
        Self::new(
            address,
            InstructionKind::Assignment {
                destination,
                source,
            },
        )
    }

    /// `push value`
    #[must_use]
    pub fn push(address: Address, value: ExprRef) -> Self {
        Self::new(address, InstructionKind::Push(value))
    }

    /// `pop destination`
    #[must_use]
    pub fn pop(address: Address, destination: ExprRef) -> Self {
        Self::new(address, InstructionKind::Pop(destination))
    }

    /// `goto target`
    #[must_use]
    pub fn jump(address: Address, target: ExprRef) -> Self {
        Self::new(address, InstructionKind::Jump(target))
    }

    /// `if (condition) goto target`
    #[must_use]
    pub fn conditional_jump(address: Address, condition: ExprRef, target: ExprRef) -> Self {
        Self::new(address, InstructionKind::ConditionalJump { condition, target })
    }

    /// `return value`
    #[must_use]
    pub fn ret(address: Address, value: ExprRef) -> Self {
        Self::new(address, InstructionKind::Return(value))
    }

    /// `name:`
    #[must_use]
    pub fn label(address: Address, name: impl Into<String>) -> Self {
        Self::new(address, InstructionKind::Label(name.into()))
    }

    /// `case value:`
    #[must_use]
    pub fn case(address: Address, value: u64) -> Self {
        Self::new(address, InstructionKind::Case(value))
    }

    /// `switch (value)`
    #[must_use]
    pub fn switch(address: Address, value: ExprRef) -> Self {
        Self::new(address, InstructionKind::Switch(value))
    }

    /// `throw exception; // data_type`
    #[must_use]
    pub fn throw(address: Address, exception: ExprRef, data_type: Option<String>) -> Self {
        Self::new(
            address,
            InstructionKind::Throw {
                exception: Some(exception),
                data_type,
            },
        )
    }

    /// `throw;`
    #[must_use]
    pub fn rethrow(address: Address) -> Self {
        Self::new(
            address,
            InstructionKind::Throw {
                exception: None,
                data_type: None,
            },
        )
    }

    /// Opaque instruction.
    #[must_use]
    pub fn low_level(address: Address, opcode: u32, text: impl Into<String>) -> Self {
        Self::new(
            address,
            InstructionKind::LowLevel(LowLevel {
                opcode,
                text: text.into(),
            }),
        )
    }

    /// Returns the list-assigned id.
    #[must_use]
    pub fn id(&self) -> InstrId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: InstrId) {
        self.id = id;
    }

    /// Returns the program address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Returns the operation.
    #[must_use]
    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    /// Returns the discriminant of the operation.
    #[must_use]
    pub fn tag(&self) -> InstructionType {
        self.kind.tag()
    }

    /// Returns `true` once an erase pool has marked this instruction.
    #[must_use]
    pub fn is_pending_deletion(&self) -> bool {
        self.pending_deletion
    }

    /// Marks this instruction for deletion. Returns `false` if it already was.
    pub(crate) fn mark_pending_deletion(&mut self) -> bool {
        !std::mem::replace(&mut self.pending_deletion, true)
    }

    /// Returns `true` if the instruction is a label or case entry.
    #[must_use]
    pub fn is_label(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::Label(_) | InstructionKind::Case(_)
        )
    }

    /// Returns the registers this instruction writes.
    #[must_use]
    pub fn definitions(&self) -> RegisterSet {
        self.definitions
    }

    /// Returns the registers this instruction reads.
    #[must_use]
    pub fn uses(&self) -> RegisterSet {
        self.uses
    }

    /// Returns the registers this instruction is the last definition of in the function.
    #[must_use]
    pub fn last_definitions(&self) -> RegisterSet {
        self.last_definitions
    }

    /// Returns the definition-use chain.
    #[must_use]
    pub fn du_chain(&self) -> &DuChain {
        &self.du_chain
    }

    /// Replaces the register use and definition sets.
    pub fn set_registers(&mut self, definitions: RegisterSet, uses: RegisterSet) {
        self.definitions = definitions;
        self.uses = uses;
    }

    /// Mutable access to the use set.
    pub fn uses_mut(&mut self) -> &mut RegisterSet {
        &mut self.uses
    }

    /// Mutable access to the definition set.
    pub fn definitions_mut(&mut self) -> &mut RegisterSet {
        &mut self.definitions
    }

    /// Mutable access to the last-definition set.
    pub fn last_definitions_mut(&mut self) -> &mut RegisterSet {
        &mut self.last_definitions
    }

    /// Replaces the definition-use chain and last-definition set.
    pub fn set_du_chain(&mut self, du_chain: DuChain, last_definitions: RegisterSet) {
        self.du_chain = du_chain;
        self.last_definitions = last_definitions;
    }

    /// Returns the number of expression operands.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        match &self.kind {
            InstructionKind::Assignment { .. } | InstructionKind::ConditionalJump { .. } => 2,
            InstructionKind::Push(_)
            | InstructionKind::Pop(_)
            | InstructionKind::Jump(_)
            | InstructionKind::Return(_)
            | InstructionKind::Switch(_) => 1,
            InstructionKind::Throw { exception, .. } => usize::from(exception.is_some()),
            InstructionKind::Label(_) | InstructionKind::Case(_) | InstructionKind::LowLevel(_) => 0,
        }
    }

    /// Returns the operand at `index`.
    #[must_use]
    pub fn operand(&self, index: usize) -> Option<&ExprRef> {
        match (&self.kind, index) {
            (InstructionKind::Assignment { destination, .. }, 0) => Some(destination),
            (InstructionKind::Assignment { source, .. }, 1) => Some(source),
            (InstructionKind::ConditionalJump { condition, .. }, 0) => Some(condition),
            (InstructionKind::ConditionalJump { target, .. }, 1) => Some(target),
            (
                InstructionKind::Push(e)
                | InstructionKind::Pop(e)
                | InstructionKind::Jump(e)
                | InstructionKind::Return(e)
                | InstructionKind::Switch(e),
                0,
            ) => Some(e),
            (InstructionKind::Throw { exception, .. }, 0) => exception.as_ref(),
            _ => None,
        }
    }

    /// Returns the operand at `index` for replacement.
    pub fn operand_mut(&mut self, index: usize) -> Option<&mut ExprRef> {
        match (&mut self.kind, index) {
            (InstructionKind::Assignment { destination, .. }, 0) => Some(destination),
            (InstructionKind::Assignment { source, .. }, 1) => Some(source),
            (InstructionKind::ConditionalJump { condition, .. }, 0) => Some(condition),
            (InstructionKind::ConditionalJump { target, .. }, 1) => Some(target),
            (
                InstructionKind::Push(e)
                | InstructionKind::Pop(e)
                | InstructionKind::Jump(e)
                | InstructionKind::Return(e)
                | InstructionKind::Switch(e),
                0,
            ) => Some(e),
            (InstructionKind::Throw { exception, .. }, 0) => exception.as_mut(),
            _ => None,
        }
    }

    /// Returns the role of the operand at `index`.
    #[must_use]
    pub fn operand_role(&self, index: usize) -> OperandRole {
        match (&self.kind, index) {
            (InstructionKind::Assignment { destination, .. }, 0) => {
                if matches!(destination.as_ref(), Expression::Unary { .. }) {
                    OperandRole::USE
                } else {
                    OperandRole::DEFINITION
                }
            }
            (InstructionKind::Assignment { source, .. }, 1) => {
                if matches!(source.as_ref(), Expression::Call(_)) {
                    OperandRole::USE | OperandRole::DEFINITION
                } else {
                    OperandRole::USE
                }
            }
            (InstructionKind::Pop(_), 0) => OperandRole::DEFINITION,
            _ if index < self.operand_count() => OperandRole::USE,
            _ => OperandRole::empty(),
        }
    }

    /// Iterates `(index, role, operand)` triples.
    pub fn operands(&self) -> impl Iterator<Item = (usize, OperandRole, &ExprRef)> + '_ {
        (0..self.operand_count())
            .filter_map(move |i| self.operand(i).map(|e| (i, self.operand_role(i), e)))
    }

    /// Returns the call carried by this instruction, if its source or operand is one.
    #[must_use]
    pub fn call(&self) -> Option<&crate::ir::CallExpression> {
        match &self.kind {
            InstructionKind::Assignment { source, .. } => source.as_call(),
            _ => None,
        }
    }

    /// Replaces the operation, keeping address and analysis state.
    pub fn set_kind(&mut self, kind: InstructionKind) {
        self.kind = kind;
    }

    /// Drops the definition of canonical register `reg`.
    ///
    /// A `Pop` degrades its destination to a placeholder. An `Assignment`
    /// does the same, and reports that it can be erased entirely unless its
    /// source contains a call, which is kept for its side effects.
    pub fn remove_definition(&mut self, reg: u16, registers: &dyn RegisterFile) -> DefinitionRemoval {
        let defines = match &self.kind {
            InstructionKind::Pop(destination)
            | InstructionKind::Assignment { destination, .. } => destination
                .as_register()
                .is_some_and(|r| registers.canonical(r) == reg),
            _ => false,
        };
        if !defines {
            return DefinitionRemoval::NotRemovable;
        }

        let outcome = match &mut self.kind {
            InstructionKind::Assignment {
                destination,
                source,
            } => {
                *destination = Expression::dummy();
                if source.contains_call() {
                    DefinitionRemoval::Degraded
                } else {
                    DefinitionRemoval::EraseInstruction
                }
            }
            InstructionKind::Pop(destination) => {
                *destination = Expression::dummy();
                DefinitionRemoval::Degraded
            }
            _ => return DefinitionRemoval::NotRemovable,
        };
        self.definitions.remove(reg);
        outcome
    }

    /// Renders the instruction with its analysis state for diagnostics.
    #[must_use]
    pub fn dump<'a>(&'a self, registers: &'a dyn RegisterFile) -> InstructionDump<'a> {
        InstructionDump {
            instruction: self,
            registers,
        }
    }
}

/// Diagnostic rendering of an [`Instruction`], see [`Instruction::dump`].
pub struct InstructionDump<'a> {
    instruction: &'a Instruction,
    registers: &'a dyn RegisterFile,
}

impl fmt::Display for InstructionDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instr = self.instruction;
        let names = self.registers;
        write!(f, "{:08x} {}", instr.address, instr.tag())?;
        for (_, _, operand) in instr.operands() {
            write!(f, " [{operand}]")?;
        }
        match &instr.kind {
            InstructionKind::Label(name) => write!(f, " {name}")?,
            InstructionKind::Case(value) => write!(f, " {value}")?,
            InstructionKind::LowLevel(low) => write!(f, " {} '{}'", low.opcode, low.text)?,
            _ => {}
        }
        write!(
            f,
            " uses={} defs={} last={}",
            instr.uses.display(names),
            instr.definitions.display(names),
            instr.last_definitions.display(names)
        )?;
        if !instr.du_chain.is_empty() {
            write!(f, " du={{")?;
            for (i, (reg, address)) in instr.du_chain.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}@{address:08x}", names.name(reg))?;
            }
            write!(f, "}}")?;
        }
        if instr.pending_deletion {
            write!(f, " (deleted)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        expression::BinaryOperator,
        register::{GenericRegisters, X86Registers},
    };

    fn r(reg: u16) -> ExprRef {
        Expression::register(reg)
    }

    #[test]
    fn test_assignment_roles() {
        let plain = Instruction::assignment(0, r(1), r(2));
        assert_eq!(plain.operand_role(0), OperandRole::DEFINITION);
        assert_eq!(plain.operand_role(1), OperandRole::USE);

        let store = Instruction::assignment(0, Expression::deref(r(1)), r(2));
        assert_eq!(store.operand_role(0), OperandRole::USE);

        let call = Instruction::assignment(0, r(0), Expression::call(Expression::global("f")));
        assert_eq!(call.operand_role(1), OperandRole::USE | OperandRole::DEFINITION);
        assert!(call.call().is_some());
    }

    #[test]
    fn test_single_operand_roles() {
        assert_eq!(Instruction::pop(0, r(1)).operand_role(0), OperandRole::DEFINITION);
        for instr in [
            Instruction::push(0, r(1)),
            Instruction::jump(0, r(1)),
            Instruction::ret(0, r(1)),
            Instruction::switch(0, r(1)),
            Instruction::throw(0, r(1), None),
        ] {
            assert_eq!(instr.operand_count(), 1);
            assert_eq!(instr.operand_role(0), OperandRole::USE);
            assert_eq!(instr.operand_role(1), OperandRole::empty());
        }

        let branch = Instruction::conditional_jump(0, r(1), Expression::global_at("L1", 0x20));
        assert_eq!(branch.operand_count(), 2);
        assert_eq!(branch.operand_role(1), OperandRole::USE);

        for instr in [
            Instruction::label(0, "L1"),
            Instruction::case(0, 3),
            Instruction::low_level(0, 7, "cpuid"),
            Instruction::rethrow(0),
        ] {
            assert_eq!(instr.operand_count(), 0);
            assert_eq!(instr.operands().count(), 0);
        }
    }

    #[test]
    fn test_operand_replace() {
        let mut instr = Instruction::assignment(0, r(1), r(2));
        if let Some(source) = instr.operand_mut(1) {
            *source = Expression::binary(BinaryOperator::Add, r(3), r(4));
        }
        assert_eq!(instr.operand(1).map(|e| e.to_string()).as_deref(), Some("R3 + R4"));
        assert!(instr.operand_mut(2).is_none());
    }

    #[test]
    fn test_remove_definition_assignment() {
        let names = GenericRegisters::default();
        let mut instr = Instruction::assignment(0, r(1), Expression::number(5));
        instr.set_registers(RegisterSet::from_indices(&[1]), RegisterSet::new());

        assert_eq!(instr.remove_definition(2, &names), DefinitionRemoval::NotRemovable);
        assert_eq!(instr.remove_definition(1, &names), DefinitionRemoval::EraseInstruction);
        assert!(instr.definitions().is_empty());
        assert!(instr.operand(0).is_some_and(|e| e.is_dummy()));
    }

    #[test]
    fn test_remove_definition_keeps_call() {
        let names = GenericRegisters::default();
        let mut instr =
            Instruction::assignment(0, r(0), Expression::call(Expression::global("rand")));
        instr.set_registers(RegisterSet::from_indices(&[0]), RegisterSet::new());

        assert_eq!(instr.remove_definition(0, &names), DefinitionRemoval::Degraded);
        assert!(instr.operand(0).is_some_and(|e| e.is_dummy()));
        assert!(instr.call().is_some());
    }

    #[test]
    fn test_remove_definition_keeps_nested_call() {
        let names = GenericRegisters::default();
        let source = Expression::binary(
            BinaryOperator::Add,
            Expression::call(Expression::global("rand")),
            Expression::number(1),
        );
        let mut instr = Instruction::assignment(0, r(1), source);
        instr.set_registers(RegisterSet::from_indices(&[1]), RegisterSet::new());

        assert_eq!(instr.remove_definition(1, &names), DefinitionRemoval::Degraded);
        assert!(instr.operand(0).is_some_and(|e| e.is_dummy()));
        assert_eq!(instr.operand(1).map(|e| e.to_string()), Some("rand() + 1".to_string()));
    }

    #[test]
    fn test_remove_definition_pop_and_subregister() {
        let mut pop = Instruction::pop(0, r(X86Registers::AL));
        pop.set_registers(RegisterSet::from_indices(&[0]), RegisterSet::new());
        assert_eq!(pop.remove_definition(0, &X86Registers), DefinitionRemoval::Degraded);
        assert!(pop.definitions().is_empty());

        let mut jump = Instruction::jump(0, r(1));
        assert_eq!(jump.remove_definition(1, &X86Registers), DefinitionRemoval::NotRemovable);
    }

    #[test]
    fn test_pending_deletion_marks_once() {
        let mut instr = Instruction::push(0, r(1));
        assert!(instr.mark_pending_deletion());
        assert!(!instr.mark_pending_deletion());
        assert!(instr.is_pending_deletion());
    }

    #[test]
    fn test_dump() {
        let mut instr = Instruction::assignment(0x64, r(1), Expression::number(5));
        let mut chain = DuChain::new();
        chain.add(1, 0x68);
        instr.set_registers(RegisterSet::from_indices(&[1]), RegisterSet::new());
        instr.set_du_chain(chain, RegisterSet::new());

        let text = instr.dump(&GenericRegisters::default()).to_string();
        assert_eq!(
            text,
            "00000064 Assignment [R1] [5] uses={} defs={R1} last={} du={R1@00000068}"
        );
    }
}
