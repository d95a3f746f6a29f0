//! Dataflow rewrite pass.
//!
//! One forward walk over the nodes that simplifies the stream using the
//! liveness and def-use information computed beforehand:
//!
//! - **Dead definitions**: a register definition nobody reads is dropped,
//!   unless it is the function's last definition and live out of its node.
//!   An assignment left without destination is erased; a pop, or an
//!   assignment from a call, survives with a placeholder destination.
//! - **Copy propagation**: `R = E` with exactly one reader is folded into
//!   that reader and erased.
//! - **Stack virtualization**: pushes are tracked on a virtual stack that
//!   pops consume. Optionally a push/pop pair becomes an assignment.
//! - **Parameter collection**: calls take their stack arguments from the
//!   virtual stack and the pushes are erased.
//!
//! Every rewrite checks its preconditions first and is skipped, leaving the
//! IR as it was, when one does not hold.

use std::sync::Arc;

use crate::{
    compiler::{
        pass::{Cursor, Flow, InstructionAnalysis},
        AnalysisConfig, EventKind, ParameterPassing,
    },
    ir::{
        CallExpression, DefinitionRemoval, ExprRef, Expression, InstrId, Instruction,
        InstructionKind, OperandRole, RegisterSet, MAX_PARAMETERS,
    },
    utils::graph::NodeId,
};

/// A pending push on the virtual stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StackEntry {
    node: Option<NodeId>,
    id: InstrId,
}

/// Dead-definition elimination, copy propagation, stack virtualization and
/// call parameter collection.
///
/// The virtual stack lives for the whole run and carries over from one node
/// to the next in creation order. Rewrites that erase a push only use
/// entries pushed in the node being walked.
#[derive(Debug, Default)]
pub struct DataflowPass {
    stack: Vec<StackEntry>,
}

impl DataflowPass {
    /// Creates the pass with an empty virtual stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pushes not consumed yet.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Number of entries on top of the stack that were pushed in `node`.
    fn local_depth(&self, node: Option<NodeId>) -> usize {
        self.stack
            .iter()
            .rev()
            .take_while(|entry| entry.node == node)
            .count()
    }

    /// Collects stack arguments for every unfinished call in the current instruction.
    fn collect_parameters(&mut self, cursor: &mut Cursor<'_>) {
        let Some(instruction) = cursor.current() else {
            return;
        };
        let mut operands: Vec<(usize, ExprRef)> = instruction
            .operands()
            .filter(|(_, _, operand)| operand.contains_call())
            .map(|(index, _, operand)| (index, Arc::clone(operand)))
            .collect();
        if operands.is_empty() {
            return;
        }

        let mut merged = RegisterSet::new();
        let mut changed = false;
        for (_, operand) in &mut operands {
            Expression::for_each_call_mut(operand, &mut |call| {
                if !call.is_finished() {
                    changed |= self.take_parameters(call, cursor, &mut merged);
                }
            });
        }
        if !changed {
            return;
        }

        if let Some(instruction) = cursor.current_mut() {
            for (index, operand) in operands {
                if let Some(slot) = instruction.operand_mut(index) {
                    *slot = operand;
                }
            }
            *instruction.uses_mut() |= merged;
        }
    }

    /// Pops the arguments of one call off the virtual stack.
    ///
    /// Returns `true` if the call was changed.
    fn take_parameters(
        &mut self,
        call: &mut CallExpression,
        cursor: &mut Cursor<'_>,
        merged: &mut RegisterSet,
    ) -> bool {
        let callee = call.callee_name().unwrap_or("call").to_string();
        let available = self.local_depth(cursor.node());
        let wanted = match call.parameter_count() {
            Some(count) => count,
            None => {
                let guess = available.min(MAX_PARAMETERS);
                cursor
                    .record(EventKind::Info)
                    .message(format!("guessing that {callee} takes {guess} parameters"));
                call.parameter_count_from_stack(guess);
                guess
            }
        };

        if wanted > available {
            cursor.record(EventKind::Warning).message(format!(
                "{callee} wants {wanted} parameters but only {available} were pushed in this node"
            ));
            return false;
        }

        for _ in 0..wanted {
            let Some(entry) = self.stack.pop() else {
                break;
            };
            let Some(index) = cursor.position_of(entry.id) else {
                cursor
                    .record(EventKind::Error)
                    .message(format!("pushed parameter of {callee} is gone"));
                continue;
            };
            let Some(push) = cursor.get(index) else {
                continue;
            };
            let InstructionKind::Push(value) = push.kind() else {
                continue;
            };
            let value = Arc::clone(value);
            *merged |= push.uses();
            call.add_parameter(value);
            cursor.erase_at(index);
        }
        call.finish_adding_parameters();

        cursor
            .record(EventKind::ParametersCollected)
            .message(format!("{wanted} parameters for {callee}"));
        true
    }

    /// Turns the push on top of the stack and the current pop into an assignment.
    fn fold_push_pop(cursor: &mut Cursor<'_>, entry: StackEntry) {
        let registers = cursor.registers();
        let Some(push_index) = cursor.position_of(entry.id) else {
            return;
        };
        let (Some(push), Some(pop)) = (cursor.get(push_index), cursor.current()) else {
            return;
        };
        let (InstructionKind::Push(pushed), InstructionKind::Pop(popped)) = (push.kind(), pop.kind())
        else {
            return;
        };
        let Some(popped_reg) = popped.as_register() else {
            if !popped.is_dummy() {
                cursor
                    .record(EventKind::Warning)
                    .message(format!("popped value '{popped}' is not a register"));
            }
            return;
        };
        let target = registers.canonical(popped_reg);
        let pushed_registers = push.uses();

        // The popped register now changes at the push, so nothing in between
        // may touch it; nor may the pushed value change.
        let clobbered = (push_index + 1..cursor.position())
            .filter_map(|index| cursor.get(index))
            .filter(|i| !i.is_pending_deletion())
            .any(|i| {
                i.uses().contains(target)
                    || i.definitions().contains(target)
                    || !(i.definitions() & pushed_registers).is_empty()
            });
        if clobbered {
            return;
        }

        let mut assignment =
            Instruction::assignment(push.address(), Arc::clone(popped), Arc::clone(pushed));
        assignment.set_registers(pop.definitions(), push.uses());
        assignment.set_du_chain(pop.du_chain().clone(), pop.last_definitions());
        let address = push.address();
        let message = format!("{} = {}", registers.name(popped_reg), pushed);

        cursor.insert_at(push_index, assignment);
        cursor.erase_id(entry.id);
        cursor.erase_current();
        cursor
            .record(EventKind::PushPopFolded)
            .at(address)
            .message(message);
    }
}

impl InstructionAnalysis for DataflowPass {
    fn name(&self) -> &'static str {
        "dataflow"
    }

    fn should_run(&self, config: &AnalysisConfig) -> bool {
        config.any_rewrite_enabled()
    }

    fn on_instruction(&mut self, cursor: &mut Cursor<'_>) -> Flow {
        let config = cursor.config();
        if config.enable_dead_definition_elimination && remove_unused_definitions(cursor) {
            return Flow::InstructionRemoved;
        }
        if config.enable_parameter_collection && config.parameter_passing == ParameterPassing::Stack
        {
            self.collect_parameters(cursor);
        }
        Flow::Continue
    }

    fn on_assignment(&mut self, cursor: &mut Cursor<'_>) {
        if cursor.config().enable_copy_propagation {
            propagate_copy(cursor);
        }
    }

    fn on_push(&mut self, cursor: &mut Cursor<'_>) {
        if let Some(push) = cursor.current() {
            self.stack.push(StackEntry {
                node: cursor.node(),
                id: push.id(),
            });
        }
    }

    fn on_pop(&mut self, cursor: &mut Cursor<'_>) {
        let Some(&entry) = self.stack.last() else {
            cursor
                .record(EventKind::Error)
                .message("pop from an empty virtual stack");
            return;
        };
        if cursor.config().fold_push_pop && entry.node == cursor.node() {
            Self::fold_push_pop(cursor, entry);
        }
        self.stack.pop();
    }

    fn on_low_level(&mut self, cursor: &mut Cursor<'_>) {
        let registers = cursor.registers();
        if let Some(instruction) = cursor.current() {
            cursor
                .record(EventKind::Warning)
                .message(format!("unlifted instruction: {}", instruction.dump(registers)));
        }
    }
}

/// Drops definitions of the current instruction that are never read.
///
/// Returns `true` if the whole instruction was erased.
fn remove_unused_definitions(cursor: &mut Cursor<'_>) -> bool {
    let registers = cursor.registers();
    let live_out = cursor.live_out();
    let Some(instruction) = cursor.current() else {
        return false;
    };
    let dead: Vec<u16> = instruction
        .definitions()
        .iter()
        .filter(|&reg| instruction.du_chain().count(reg) == 0)
        .filter(|&reg| !(instruction.last_definitions().contains(reg) && live_out.contains(reg)))
        .collect();

    for reg in dead {
        let Some(instruction) = cursor.current_mut() else {
            break;
        };
        match instruction.remove_definition(reg, registers) {
            DefinitionRemoval::NotRemovable => {}
            DefinitionRemoval::Degraded => {
                cursor
                    .record(EventKind::DefinitionRemoved)
                    .message(format!("{} is never read", registers.name(reg)));
            }
            DefinitionRemoval::EraseInstruction => {
                cursor
                    .record(EventKind::DefinitionRemoved)
                    .message(format!("{} is never read", registers.name(reg)));
                cursor.erase_current();
                cursor.record(EventKind::InstructionRemoved);
                return true;
            }
        }
    }
    false
}

/// Folds `R = E` into the only instruction that reads `R`.
fn propagate_copy(cursor: &mut Cursor<'_>) {
    let registers = cursor.registers();
    let Some(assignment) = cursor.current() else {
        return;
    };
    let InstructionKind::Assignment {
        destination,
        source,
    } = assignment.kind()
    else {
        return;
    };
    let Some((reg, use_address)) = assignment.du_chain().single() else {
        return;
    };
    let Some(raw) = destination.as_register() else {
        return;
    };
    if registers.canonical(raw) != reg {
        return;
    }
    if assignment.last_definitions().contains(reg) && cursor.live_out().contains(reg) {
        return;
    }

    let source = Arc::clone(source);
    let source_registers = assignment.uses();
    let last_definitions = assignment.last_definitions();

    let Some(target_index) = cursor.find_following(use_address) else {
        return;
    };
    // a call is only moved across nothing
    if source.contains_call() && cursor.next_live() != Some(target_index) {
        return;
    }
    let source_changes = (cursor.position() + 1..target_index)
        .filter_map(|index| cursor.get(index))
        .filter(|i| !i.is_pending_deletion())
        .any(|i| !(i.definitions() & source_registers).is_empty());
    if source_changes {
        return;
    }

    let Some(target) = cursor.get(target_index) else {
        return;
    };
    // R read through a sub-register cannot be replaced by E
    let aliased = target.operands().any(|(_, role, operand)| {
        role.contains(OperandRole::USE)
            && operand.any_register(|r| r != raw && registers.canonical(r) == reg)
    });
    if aliased {
        return;
    }

    let mut rewritten: Vec<(usize, ExprRef)> = Vec::new();
    for (index, role, operand) in target.operands() {
        if !role.contains(OperandRole::USE) {
            continue;
        }
        if let Some(replaced) = Expression::substitute_register(operand, raw, &source) {
            rewritten.push((index, replaced));
        }
    }
    if rewritten.is_empty() {
        return;
    }

    let Some(target) = cursor.get_mut(target_index) else {
        return;
    };
    for (index, replaced) in rewritten {
        if let Some(slot) = target.operand_mut(index) {
            *slot = replaced;
        }
    }
    let uses = target.uses_mut();
    uses.remove(reg);
    *uses |= source_registers;
    *target.last_definitions_mut() |= last_definitions;

    cursor.erase_current();
    cursor
        .record(EventKind::CopyPropagated)
        .message(format!("{} -> {use_address:08x}", registers.name(reg)));
}
