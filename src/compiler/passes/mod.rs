//! Rewrite passes, in the order the pipeline runs them.
//!
//! - [`DataflowPass`]: dead definitions, copy propagation, stack
//!   virtualization and call parameter collection
//! - [`IdiomPass`]: folds runtime helper calls into higher-level instructions
//! - [`CleanupPass`]: removes placeholders the rewrites left behind

mod cleanup;
mod dataflow;
mod idioms;

pub use cleanup::CleanupPass;
pub use dataflow::DataflowPass;
pub use idioms::{IdiomFolder, IdiomPass, ThrowCallFolder};
