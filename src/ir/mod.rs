//! Processor-neutral intermediate representation.
//!
//! A lifter translates machine code into an [`InstructionList`] of
//! [`Instruction`]s whose operands are [`Expression`] trees. The analysis
//! stages annotate the instructions with register use/definition sets and
//! definition-use chains, and the rewrite passes simplify them in place.
//!
//! # Key Components
//!
//! - [`Expression`] / [`ExprRef`] - immutable, shareable expression trees
//! - [`Instruction`] / [`InstructionKind`] - one lifted operation plus its analysis state
//! - [`InstructionList`] / [`ErasePool`] - instruction storage with deferred deletion
//! - [`RegisterFile`] / [`RegisterSet`] - register naming, canonicalization and sets

pub mod expression;
pub mod instruction;
pub mod list;
pub mod register;

pub use expression::{
    AddressWidth, BinaryOperator, CallExpression, CallingConvention, ExprRef, Expression,
    ExpressionRenderer, GlobalVariable, Precedence, StackVariable, StringLiteral, UnaryOperator,
    MAX_PARAMETERS,
};
pub use instruction::{
    DefinitionRemoval, InstrId, Instruction, InstructionKind, InstructionType, LowLevel,
    OperandRole,
};
pub use list::{ErasePool, InstructionList};
pub use register::{
    ArmRegisters, DuChain, GenericRegisters, RegisterFile, RegisterSet, X86Registers,
    REGISTER_LIMIT,
};

/// A program address, unique per instruction within a function.
pub type Address = u64;
