//! Register data flow over the control flow graph.
//!
//! Two stages run back to back before any rewrite:
//!
//! - [`UseDefComputer`]: per-instruction Uses/Definitions and per-node
//!   USE/DEF aggregates
//! - [`LiveVariables`]: backward fixed point for LiveIn/LiveOut of every node
//!
//! # Example
//!
//! ```rust,ignore
//! use decoflow::analysis::{LiveVariables, UseDefComputer};
//!
//! UseDefComputer::new(registers, &config).compute(&mut cfg);
//! let result = LiveVariables::new(&events).solve(&mut cfg);
//! println!("liveness converged after {} sweeps", result.iterations);
//! ```
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`.

mod liveness;
mod usedef;

pub use liveness::{LiveVariables, LivenessResult};
pub use usedef::UseDefComputer;
