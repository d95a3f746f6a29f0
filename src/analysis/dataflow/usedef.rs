//! Register use and definition sets.
//!
//! Every operand of an instruction is walked depth first and each register
//! leaf is added, as its canonical index, to the instruction's Uses and/or
//! Definitions according to the operand's role (see
//! [`Instruction::operand_role`]).
//!
//! Node aggregates follow the usual USE/DEF construction:
//!
//! - `DEF[B]` = union of the instructions' definitions
//! - `USE[B]` = instruction uses not already defined earlier in `B`
//!
//! On targets that pass arguments in registers, calls receive their
//! argument registers here, before any set is computed.

use crate::{
    analysis::cfg::ControlFlowGraph,
    compiler::{AnalysisConfig, ParameterPassing},
    ir::{
        CallExpression, ExprRef, Expression, Instruction, InstructionKind, InstructionList,
        OperandRole, RegisterFile, RegisterSet,
    },
};

/// Computes register use and definition sets.
pub struct UseDefComputer<'a> {
    registers: &'a dyn RegisterFile,
    parameter_passing: ParameterPassing,
}

impl<'a> UseDefComputer<'a> {
    /// Creates a computer for the given register file and configuration.
    #[must_use]
    pub fn new(registers: &'a dyn RegisterFile, config: &AnalysisConfig) -> Self {
        UseDefComputer {
            registers,
            parameter_passing: config.parameter_passing,
        }
    }

    /// Recomputes the sets of one instruction.
    pub fn compute_instruction(&self, instruction: &mut Instruction) {
        if let ParameterPassing::Registers { count } = self.parameter_passing {
            if let InstructionKind::Assignment { source, .. } = instruction.kind() {
                if source.as_call().is_some_and(|call| !call.is_finished()) {
                    let mut source = source.clone();
                    Expression::for_each_call_mut(&mut source, &mut |call| {
                        attach_register_arguments(call, count);
                    });
                    if let Some(slot) = instruction.operand_mut(1) {
                        *slot = source;
                    }
                }
            }
        }

        let mut definitions = RegisterSet::new();
        let mut uses = RegisterSet::new();
        for (_, role, operand) in instruction.operands() {
            if role.contains(OperandRole::USE) {
                self.collect(operand, &mut uses);
            }
            if role.contains(OperandRole::DEFINITION) {
                self.collect(operand, &mut definitions);
            }
        }
        instruction.set_registers(definitions, uses);
    }

    /// Recomputes the sets of every instruction in a flat list.
    pub fn compute_list(&self, list: &mut InstructionList) {
        for instruction in list.iter_mut() {
            self.compute_instruction(instruction);
        }
    }

    /// Recomputes instruction sets and node aggregates over the whole graph.
    pub fn compute(&self, cfg: &mut ControlFlowGraph) {
        for (_, node) in cfg.nodes_mut() {
            let mut definitions = RegisterSet::new();
            let mut uses = RegisterSet::new();
            for instruction in node.instructions_mut().iter_mut() {
                if instruction.is_pending_deletion() {
                    continue;
                }
                self.compute_instruction(instruction);
                uses |= instruction.uses() - definitions;
                definitions |= instruction.definitions();
            }
            node.set_registers(definitions, uses);
        }
    }

    fn collect(&self, operand: &ExprRef, set: &mut RegisterSet) {
        operand.walk(&mut |e| {
            if let Expression::Register(reg) = e {
                set.insert(self.registers.canonical(*reg));
            }
        });
    }
}

/// Attaches `R0..R(count-1)` to a call and closes its parameter list.
fn attach_register_arguments(call: &mut CallExpression, count: usize) {
    if call.is_finished() {
        return;
    }
    let wanted = call.parameter_count().unwrap_or(count).min(count);
    for reg in call.parameters().len()..wanted {
        let Ok(reg) = u16::try_from(reg) else {
            break;
        };
        call.add_parameter(Expression::register(reg));
    }
    call.finish_adding_parameters();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::cfg::CfgBuilder,
        compiler::EventLog,
        ir::{BinaryOperator, GenericRegisters, X86Registers},
        utils::graph::NodeId,
    };

    fn r(reg: u16) -> ExprRef {
        Expression::register(reg)
    }

    fn set(indices: &[u16]) -> RegisterSet {
        RegisterSet::from_indices(indices)
    }

    #[test]
    fn test_role_table() {
        let names = GenericRegisters::default();
        let computer = UseDefComputer::new(&names, &AnalysisConfig::default());
        let cases = vec![
            (
                Instruction::assignment(0, r(1), Expression::binary(BinaryOperator::Add, r(2), r(3))),
                set(&[1]),
                set(&[2, 3]),
            ),
            (
                Instruction::assignment(0, Expression::deref(r(1)), r(2)),
                set(&[]),
                set(&[1, 2]),
            ),
            (
                Instruction::assignment(0, r(0), Expression::call(r(5))),
                set(&[0, 5]),
                set(&[5]),
            ),
            (Instruction::pop(0, r(4)), set(&[4]), set(&[])),
            (Instruction::push(0, r(4)), set(&[]), set(&[4])),
            (Instruction::jump(0, r(4)), set(&[]), set(&[4])),
            (Instruction::ret(0, r(4)), set(&[]), set(&[4])),
            (Instruction::switch(0, r(4)), set(&[]), set(&[4])),
            (Instruction::throw(0, r(4), None), set(&[]), set(&[4])),
            (
                Instruction::conditional_jump(0, r(1), Expression::global_at("L", 8)),
                set(&[]),
                set(&[1]),
            ),
            (Instruction::label(0, "L"), set(&[]), set(&[])),
            (Instruction::low_level(0, 3, "hlt"), set(&[]), set(&[])),
        ];

        for (mut instruction, definitions, uses) in cases {
            computer.compute_instruction(&mut instruction);
            assert_eq!(instruction.definitions(), definitions, "{:?}", instruction.kind());
            assert_eq!(instruction.uses(), uses, "{:?}", instruction.kind());
        }
    }

    #[test]
    fn test_canonical_subregisters() {
        let computer = UseDefComputer::new(&X86Registers, &AnalysisConfig::default());
        let mut instruction = Instruction::assignment(0, r(X86Registers::AH), r(X86Registers::ECX));
        computer.compute_instruction(&mut instruction);
        assert_eq!(instruction.definitions(), set(&[X86Registers::EAX]));
        assert_eq!(instruction.uses(), set(&[X86Registers::ECX]));
    }

    #[test]
    fn test_register_arguments_attached_once() {
        let names = GenericRegisters::default();
        let computer = UseDefComputer::new(&names, &AnalysisConfig::register_arguments(4));
        let call = CallExpression::new(Expression::global("memcpy")).with_parameter_count(3);
        let mut instruction = Instruction::assignment(0, r(0), Expression::from_call(call));

        computer.compute_instruction(&mut instruction);
        computer.compute_instruction(&mut instruction);

        let call = instruction.call().unwrap();
        assert!(call.is_finished());
        assert_eq!(call.parameters().len(), 3);
        assert_eq!(instruction.uses(), set(&[0, 1, 2]));
        assert_eq!(instruction.definitions(), set(&[0, 1, 2]));
    }

    #[test]
    fn test_node_aggregates_skip_shadowed_uses() {
        let events = EventLog::new();
        let mut cfg = CfgBuilder::new(&events)
            .build(InstructionList::from(vec![
                Instruction::assignment(0, r(1), r(2)),
                Instruction::assignment(4, r(3), r(1)),
                Instruction::ret(8, r(3)),
            ]))
            .unwrap();

        let names = GenericRegisters::default();
        UseDefComputer::new(&names, &AnalysisConfig::default()).compute(&mut cfg);

        let node = cfg.node(NodeId::new(0)).unwrap();
        assert_eq!(node.definitions(), set(&[1, 3]));
        assert_eq!(node.uses(), set(&[2]));
    }
}
