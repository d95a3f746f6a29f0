//! IR rewriting and the analysis pipeline.
//!
//! This module sits between the analyses and code generation:
//!
//! - [`crate::analysis`]: CFG, Uses/Definitions, liveness, def-use chains
//! - [`compiler`](self): rewrite passes and the pipeline driving them
//! - [`crate::codegen`]: text rendering
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       Analysis Pipeline                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  Decompiler                  One function, one thread            │
//! │    ├─ AnalysisConfig          explicit settings, no globals      │
//! │    ├─ RegisterFile            names and canonical indices        │
//! │    └─ decompile_all()         functions in parallel (rayon)      │
//! │                                                                  │
//! │  InstructionAnalysis trait   Single forward walk per node        │
//! │    ├─ on_instruction()        generic hook, may remove           │
//! │    ├─ on_assignment/push/pop  typed handlers                     │
//! │    └─ Cursor                  insert, replace, erase helpers     │
//! │                                                                  │
//! │  Passes                                                          │
//! │    ├─ DataflowPass            dead defs, copies, virtual stack   │
//! │    ├─ IdiomPass               runtime helper calls to Throw      │
//! │    └─ CleanupPass             placeholder pops                   │
//! │                                                                  │
//! │  EventLog                    Change tracking and diagnostics     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod events;
pub mod pass;
pub mod passes;
mod pipeline;

pub use config::{AnalysisConfig, ParameterPassing, ThrowHelper, ThrowHelperKind};
pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::{run_on_graph, run_on_list, Cursor, Flow, InstructionAnalysis, PassContext};
pub use passes::{CleanupPass, DataflowPass, IdiomFolder, IdiomPass, ThrowCallFolder};
pub use pipeline::{DecompiledFunction, Decompiler};
