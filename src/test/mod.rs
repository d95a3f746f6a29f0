//! Shared builders for unit tests.
//!
//! [`FunctionBuilder`] lays out a function at increasing addresses and
//! resolves jumps to named labels, so tests can be written the way the code
//! reads:
//!
//! ```rust,ignore
//! let list = FunctionBuilder::new(0x1000)
//!     .assign(r(1), Expression::number(0))
//!     .label("loop")
//!     .branch(r(2), "loop")
//!     .ret(r(1))
//!     .build();
//! ```

use std::collections::HashMap;

use crate::{
    analysis::{CfgBuilder, ControlFlowGraph, DefUseBuilder, LiveVariables, UseDefComputer},
    compiler::{AnalysisConfig, EventLog},
    ir::{Address, CallExpression, ExprRef, Expression, Instruction, InstructionList, RegisterFile},
};

/// Shorthand for a register expression.
pub(crate) fn r(reg: u16) -> ExprRef {
    Expression::register(reg)
}

/// A call to a named global with a known parameter count.
pub(crate) fn call(callee: &str, parameter_count: usize) -> ExprRef {
    Expression::from_call(
        CallExpression::new(Expression::global(callee)).with_parameter_count(parameter_count),
    )
}

enum Item {
    Ready(Instruction),
    Jump {
        address: Address,
        condition: Option<ExprRef>,
        label: String,
    },
}

/// Builds an instruction list with addresses `base`, `base + 4`, ...
pub(crate) struct FunctionBuilder {
    address: Address,
    items: Vec<Item>,
    labels: HashMap<String, Address>,
}

impl FunctionBuilder {
    pub(crate) fn new(base: Address) -> Self {
        FunctionBuilder {
            address: base,
            items: Vec::new(),
            labels: HashMap::new(),
        }
    }

    fn next(&mut self) -> Address {
        let address = self.address;
        self.address += 4;
        address
    }

    fn add(mut self, make: impl FnOnce(Address) -> Instruction) -> Self {
        let address = self.next();
        self.items.push(Item::Ready(make(address)));
        self
    }

    pub(crate) fn assign(self, destination: ExprRef, source: ExprRef) -> Self {
        self.add(|a| Instruction::assignment(a, destination, source))
    }

    pub(crate) fn push(self, value: ExprRef) -> Self {
        self.add(|a| Instruction::push(a, value))
    }

    pub(crate) fn pop(self, destination: ExprRef) -> Self {
        self.add(|a| Instruction::pop(a, destination))
    }

    pub(crate) fn ret(self, value: ExprRef) -> Self {
        self.add(|a| Instruction::ret(a, value))
    }

    pub(crate) fn label(mut self, name: &str) -> Self {
        let address = self.next();
        self.labels.insert(name.to_string(), address);
        self.items.push(Item::Ready(Instruction::label(address, name)));
        self
    }

    pub(crate) fn jump(mut self, label: &str) -> Self {
        let address = self.next();
        self.items.push(Item::Jump {
            address,
            condition: None,
            label: label.to_string(),
        });
        self
    }

    pub(crate) fn branch(mut self, condition: ExprRef, label: &str) -> Self {
        let address = self.next();
        self.items.push(Item::Jump {
            address,
            condition: Some(condition),
            label: label.to_string(),
        });
        self
    }

    /// Resolves labels and returns the list. Unknown labels become unresolved globals.
    pub(crate) fn build(self) -> InstructionList {
        let labels = self.labels;
        self.items
            .into_iter()
            .map(|item| match item {
                Item::Ready(instruction) => instruction,
                Item::Jump {
                    address,
                    condition,
                    label,
                } => {
                    let target = match labels.get(&label) {
                        Some(&target) => Expression::global_at(label, target),
                        None => Expression::global(label),
                    };
                    match condition {
                        Some(condition) => Instruction::conditional_jump(address, condition, target),
                        None => Instruction::jump(address, target),
                    }
                }
            })
            .collect()
    }
}

/// Builds the graph and runs every analysis up to the def-use chains.
pub(crate) fn analysed(
    instructions: InstructionList,
    registers: &dyn RegisterFile,
    config: &AnalysisConfig,
) -> (ControlFlowGraph, EventLog) {
    let events = EventLog::new();
    let mut cfg = CfgBuilder::new(&events)
        .build(instructions)
        .unwrap_or_default();
    UseDefComputer::new(registers, config).compute(&mut cfg);
    LiveVariables::new(&events).solve(&mut cfg);
    DefUseBuilder::build(&mut cfg);
    (cfg, events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InstructionType;

    #[test]
    fn test_builder_resolves_labels() {
        let list = FunctionBuilder::new(0x100)
            .jump("end")
            .assign(r(1), Expression::number(1))
            .label("end")
            .branch(r(1), "missing")
            .build();

        let tags: Vec<_> = list.iter().map(|i| i.tag()).collect();
        assert_eq!(
            tags,
            vec![
                InstructionType::Jump,
                InstructionType::Assignment,
                InstructionType::Label,
                InstructionType::ConditionalJump,
            ]
        );
        let jump = list.get(0).unwrap();
        assert_eq!(jump.operand(0).and_then(|t| t.global_address()), Some(0x108));
        let branch = list.get(3).unwrap();
        assert_eq!(branch.operand(1).and_then(|t| t.global_address()), None);
    }
}
