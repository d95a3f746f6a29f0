//! Placeholder cleanup.
//!
//! Dead-definition elimination degrades a `pop R` whose value nobody reads
//! to `pop <dummy>`. The pop must stay while the virtual stack is being
//! tracked, but once the dataflow pass is done it only adjusts the stack
//! pointer and is dropped here.

use crate::compiler::{
    pass::{Cursor, InstructionAnalysis},
    AnalysisConfig, EventKind,
};
use crate::ir::InstructionKind;

/// Removes `Pop` instructions left with a placeholder operand.
#[derive(Debug, Default)]
pub struct CleanupPass;

impl InstructionAnalysis for CleanupPass {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn should_run(&self, config: &AnalysisConfig) -> bool {
        config.enable_cleanup
    }

    fn on_pop(&mut self, cursor: &mut Cursor<'_>) {
        let placeholder = cursor
            .current()
            .is_some_and(|i| matches!(i.kind(), InstructionKind::Pop(operand) if operand.is_dummy()));
        if placeholder && cursor.erase_current() {
            cursor.record(EventKind::NoOpPruned).message("pop <dummy>");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::{
            pass::{run_on_list, PassContext},
            EventLog,
        },
        ir::{Expression, GenericRegisters, Instruction, InstructionList},
    };

    #[test]
    fn test_dummy_pops_removed() {
        let config = AnalysisConfig::default();
        let registers = GenericRegisters::default();
        let events = EventLog::new();
        let mut list = InstructionList::from(vec![
            Instruction::pop(0, Expression::dummy()),
            Instruction::pop(1, Expression::register(3)),
            Instruction::assignment(2, Expression::dummy(), Expression::number(0)),
        ]);
        let context = PassContext {
            config: &config,
            registers: &registers,
            events: &events,
        };

        let removed = run_on_list(&mut CleanupPass, &mut list, context);
        assert_eq!(removed, 1);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(0).unwrap().address(), 1);
        assert_eq!(events.count_kind(EventKind::NoOpPruned), 1);
    }
}
