//! # decoflow Prelude
//!
//! Re-exports the types most programs need to build a function's IR, run
//! the pipeline and read the results.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all decoflow operations
pub use crate::Error;

/// The result type used throughout decoflow
pub use crate::Result;

// ================================================================================================
// Pipeline
// ================================================================================================

/// Configuration and the pipeline entry points
pub use crate::compiler::{
    AnalysisConfig, DecompiledFunction, Decompiler, ParameterPassing, ThrowHelper,
    ThrowHelperKind,
};

/// Event tracking
pub use crate::compiler::{Event, EventKind, EventLog};

/// Writing custom passes
pub use crate::compiler::{
    run_on_graph, run_on_list, Cursor, Flow, InstructionAnalysis, PassContext,
};

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Expressions
pub use crate::ir::{
    AddressWidth, BinaryOperator, CallExpression, CallingConvention, ExprRef, Expression,
    UnaryOperator,
};

/// Instructions
pub use crate::ir::{Address, Instruction, InstructionKind, InstructionList, InstructionType};

/// Registers
pub use crate::ir::{ArmRegisters, GenericRegisters, RegisterFile, RegisterSet, X86Registers};

// ================================================================================================
// Analysis and Output
// ================================================================================================

/// Control flow graph and analyses
pub use crate::analysis::{
    CfgBuilder, ControlFlowGraph, DefUseBuilder, LiveVariables, Node, NodeKind, UseDefComputer,
};

/// Code generation
pub use crate::codegen::{CodeGenerator, CodeStyle, LineSink};
