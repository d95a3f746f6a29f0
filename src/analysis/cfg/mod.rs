//! Control Flow Graph (CFG) construction.
//!
//! This module splits a function's flat instruction stream into basic blocks
//! and links them by their successor addresses.
//!
//! # Architecture
//!
//! The CFG builds upon the generic [`crate::utils::graph::DirectedGraph`],
//! with [`Node`] as node data and [`CfgEdgeKind`] as edge data.
//!
//! # Key Components
//!
//! - [`CfgBuilder`] - Splits a stream into nodes and resolves their edges
//! - [`ControlFlowGraph`] - The graph of one function
//! - [`Node`] / [`NodeKind`] - A basic block and how control leaves it
//! - [`CfgEdgeKind`] - Unconditional, branch-taken or fall-through edge
//!
//! # Examples
//!
//! ```rust,ignore
//! use decoflow::analysis::CfgBuilder;
//! use decoflow::compiler::EventLog;
//!
//! let events = EventLog::new();
//! let cfg = CfgBuilder::new(&events).build(instructions)?;
//!
//! for (id, node) in cfg.nodes() {
//!     println!("{id}: {} at {:08x}", node.kind(), node.address());
//! }
//! ```

mod builder;
mod edge;
mod graph;
mod node;

pub use builder::CfgBuilder;
pub use edge::CfgEdgeKind;
pub use graph::{ControlFlowGraph, GraphDump};
pub use node::{Node, NodeDump, NodeKind};
