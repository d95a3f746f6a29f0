//! Definition-use chains.
//!
//! For every register an instruction defines, the remainder of the whole
//! function (not just the node) is scanned forward:
//!
//! - each later instruction that uses the register adds `(register, address)`
//!   to the defining instruction's chain
//! - the scan stops at the first later redefinition; an instruction that both
//!   uses and redefines the register counts as a use first
//! - a scan that reaches the end of the function marks the instruction as the
//!   last definition of the register
//!
//! Chains are computed over a read-only view first and written back in a
//! second phase.

use crate::{
    analysis::cfg::ControlFlowGraph,
    ir::{DuChain, Instruction, InstructionList, RegisterSet},
};

/// Builds definition-use chains and last-definition sets.
///
/// # Example
///
/// ```rust,ignore
/// use decoflow::analysis::DefUseBuilder;
///
/// DefUseBuilder::build(&mut cfg);
/// for (_, instruction) in cfg.instructions() {
///     println!("{:08x}: {} uses downstream", instruction.address(), instruction.du_chain().len());
/// }
/// ```
pub struct DefUseBuilder;

impl DefUseBuilder {
    /// Computes chains for every instruction of the graph, in node order.
    pub fn build(cfg: &mut ControlFlowGraph) {
        let results = {
            let view: Vec<&Instruction> = cfg
                .instructions()
                .map(|(_, instruction)| instruction)
                .filter(|instruction| !instruction.is_pending_deletion())
                .collect();
            Self::chains(&view)
        };

        let mut results = results.into_iter();
        for (_, node) in cfg.nodes_mut() {
            for instruction in node.instructions_mut().iter_mut() {
                if instruction.is_pending_deletion() {
                    continue;
                }
                if let Some((chain, last)) = results.next() {
                    instruction.set_du_chain(chain, last);
                }
            }
        }
    }

    /// Computes chains for a flat instruction list.
    pub fn build_list(list: &mut InstructionList) {
        let results = {
            let view: Vec<&Instruction> = list
                .iter()
                .filter(|instruction| !instruction.is_pending_deletion())
                .collect();
            Self::chains(&view)
        };

        let mut results = results.into_iter();
        for instruction in list.iter_mut() {
            if instruction.is_pending_deletion() {
                continue;
            }
            if let Some((chain, last)) = results.next() {
                instruction.set_du_chain(chain, last);
            }
        }
    }

    fn chains(stream: &[&Instruction]) -> Vec<(DuChain, RegisterSet)> {
        stream
            .iter()
            .enumerate()
            .map(|(index, definition)| {
                let mut chain = DuChain::new();
                let mut last = RegisterSet::new();

                for reg in definition.definitions().iter() {
                    let mut redefined = false;
                    for later in &stream[index + 1..] {
                        if later.uses().contains(reg) {
                            chain.add(reg, later.address());
                        }
                        if later.definitions().contains(reg) {
                            redefined = true;
                            break;
                        }
                    }
                    if !redefined {
                        last.insert(reg);
                    }
                }

                (chain, last)
            })
            .collect()
    }
}
