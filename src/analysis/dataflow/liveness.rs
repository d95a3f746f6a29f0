//! Live variable analysis.
//!
//! A register is *live* at a program point if some path from that point
//! reads it before writing it.
//!
//! # Algorithm
//!
//! This is a backward data flow analysis over the node aggregates computed
//! by [`UseDefComputer`](super::UseDefComputer):
//!
//! - `OUT[B]` = ∪{IN[S] | S is a successor of B}
//! - `IN[B]` = USE[B] ∪ (OUT[B] - DEF[B])
//!
//! All nodes start empty and are swept round-robin in reverse creation
//! order, which roughly follows the backward direction of flow in program
//! order, until a full sweep changes nothing. Iteration order only affects
//! how many sweeps that takes.

use crate::{
    analysis::cfg::ControlFlowGraph,
    compiler::{EventKind, EventLog},
    ir::RegisterSet,
    utils::graph::NodeId,
};

/// Outcome of a liveness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessResult {
    /// Number of sweeps over all nodes, including the final unchanged one
    pub iterations: usize,
}

/// Live variable analysis over a [`ControlFlowGraph`].
///
/// # Example
///
/// ```rust,ignore
/// use decoflow::analysis::LiveVariables;
///
/// let result = LiveVariables::new(&events).solve(&mut cfg);
/// for (id, node) in cfg.nodes() {
///     println!("{id}: live out {:?}", node.live_out());
/// }
/// ```
pub struct LiveVariables<'a> {
    events: &'a EventLog,
}

impl<'a> LiveVariables<'a> {
    /// Creates a solver that records convergence into `events`.
    #[must_use]
    pub fn new(events: &'a EventLog) -> Self {
        LiveVariables { events }
    }

    /// Computes LiveIn and LiveOut of every node to a fixed point.
    pub fn solve(&self, cfg: &mut ControlFlowGraph) -> LivenessResult {
        let order: Vec<NodeId> = cfg.node_ids().rev().collect();
        for (_, node) in cfg.nodes_mut() {
            node.set_live(RegisterSet::new(), RegisterSet::new());
        }

        let mut iterations = 0;
        loop {
            iterations += 1;
            let mut changed = false;

            for &id in &order {
                let mut live_out = RegisterSet::new();
                for successor in cfg.successors(id) {
                    if let Some(node) = cfg.node(successor) {
                        live_out |= node.live_in();
                    }
                }

                let Some(node) = cfg.node_mut(id) else {
                    continue;
                };
                let live_in = node.uses() | (live_out - node.definitions());
                changed |= node.set_live(live_in, live_out);
            }

            if !changed {
                break;
            }
        }

        self.events
            .record(EventKind::LivenessConverged)
            .message(format!("converged after {iterations} iterations"));
        LivenessResult { iterations }
    }
}
