//! Shared infrastructure used by the analysis and rewriting stages.

pub mod graph;

pub use graph::{DirectedGraph, EdgeId, NodeId};
