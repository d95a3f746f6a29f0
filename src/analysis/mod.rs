//! Program analysis over the lifted instruction stream.
//!
//! The analyses run in a fixed order, each one feeding the next:
//!
//! 1. [`CfgBuilder`] splits the stream into basic blocks and links them
//! 2. [`UseDefComputer`] fills in register Uses/Definitions
//! 3. [`LiveVariables`] computes LiveIn/LiveOut of every node
//! 4. [`DefUseBuilder`] records definition-use chains and last definitions
//!
//! None of them rewrites instructions; that is left to the passes in
//! [`crate::compiler`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use decoflow::analysis::{CfgBuilder, DefUseBuilder, LiveVariables, UseDefComputer};
//!
//! let mut cfg = CfgBuilder::new(&events).build(instructions)?;
//! UseDefComputer::new(registers, &config).compute(&mut cfg);
//! LiveVariables::new(&events).solve(&mut cfg);
//! DefUseBuilder::build(&mut cfg);
//! ```

pub mod cfg;
pub mod dataflow;
mod defuse;

pub use cfg::{CfgBuilder, CfgEdgeKind, ControlFlowGraph, Node, NodeKind};
pub use dataflow::{LiveVariables, LivenessResult, UseDefComputer};
pub use defuse::DefUseBuilder;
