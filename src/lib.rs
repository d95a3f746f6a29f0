// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # decoflow
//!
//! The dataflow core of a machine-code decompiler. Given one function's
//! instructions, already lifted into a small processor-neutral IR, `decoflow`
//! builds a control flow graph, computes register uses and definitions,
//! solves live variables to a fixed point, links definitions to their uses,
//! rewrites the instruction stream, and renders the result as pseudocode.
//!
//! ## Features
//!
//! - **Shared expression trees** - `Arc`-based expressions, substituted by reference and unshared on write
//! - **Safe in-place rewriting** - deletions are deferred to an erase pool, insertions are immediate
//! - **Liveness and def-use chains** - fixed-point LiveIn/LiveOut per node, per-instruction chains
//! - **Dataflow rewrites** - dead definitions, copy propagation, a virtual stack, call parameters
//! - **Precedence-aware output** - parentheses exactly where operator precedence needs them
//! - **Batch execution** - independent functions analysed in parallel with `rayon`
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use decoflow::prelude::*;
//!
//! let puts = CallExpression::new(Expression::global("puts")).with_parameter_count(1);
//! let eax = Expression::register(X86Registers::EAX);
//! let instructions = InstructionList::from(vec![
//!     Instruction::push(0x1000, Expression::string("hello")),
//!     Instruction::assignment(0x1005, eax.clone(), Expression::from_call(puts)),
//!     Instruction::ret(0x100a, eax),
//! ]);
//!
//! let decompiler = Decompiler::new(AnalysisConfig::default(), Arc::new(X86Registers));
//! let function = decompiler.decompile(instructions)?;
//!
//! assert_eq!(function.lines[0], "  return puts(\"hello\");");
//! # Ok::<(), decoflow::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - expressions, instructions, the erase pool, register files
//! - [`analysis`] - CFG construction, Uses/Definitions, liveness, def-use chains
//! - [`compiler`] - the pass framework, rewrite passes and the [`Decompiler`] pipeline
//! - [`codegen`] - pseudocode and listing output
//! - [`prelude`] - convenient re-exports
//! - [`Error`] and [`Result`] - error handling
//!
//! Nothing below the configuration is fatal: malformed operands, unresolved
//! successors and broken chains are recorded in the function's
//! [`EventLog`](compiler::EventLog) and the affected rewrite is skipped.

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use decoflow::prelude::*;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.code_style, CodeStyle::Pseudocode);
/// ```
pub mod prelude;

/// Program analysis: control flow graph, Uses/Definitions, liveness and def-use chains.
pub mod analysis;

/// Text rendering of the analysed IR.
pub mod codegen;

/// Rewrite passes, their framework, configuration, events and the pipeline.
pub mod compiler;

/// The intermediate representation: expressions, instructions and registers.
pub mod ir;

/// Graph container and other shared utilities.
pub mod utils;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use decoflow::{AnalysisConfig, Result};
///
/// fn checked(config: AnalysisConfig) -> Result<AnalysisConfig> {
///     config.validate()?;
///     Ok(config)
/// }
///
/// assert!(checked(AnalysisConfig::default()).is_ok());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `decoflow` Error type
///
/// Only configuration validation and graph construction fail with an
/// [`Error`]; analysis problems are recorded as events instead.
pub use error::Error;

/// Configuration threaded through every stage.
pub use compiler::AnalysisConfig;

/// Runs the full pipeline on one function, or many in parallel.
pub use compiler::{DecompiledFunction, Decompiler};
