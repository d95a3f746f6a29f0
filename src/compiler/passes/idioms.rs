//! Idiom folding.
//!
//! Compilers express some source constructs as calls into their runtime.
//! An [`IdiomFolder`] recognises one such call and returns the higher-level
//! instruction it stands for; [`IdiomPass`] applies the folders to every
//! assignment and replaces the matches.
//!
//! The pass runs after the dataflow pass, so calls already carry their
//! collected parameters and propagated arguments. Once a call is folded,
//! the data instructions that follow it in the same node only served the
//! runtime helper and are removed with it.
//!
//! # Example
//!
//! Before:
//! ```text
//! @_ThrowExceptionLDTC$qpvt1t1t1uiuiuipuct1(__rtti_Error, &exc, 0, 0, 0, 0, 0, 0, 0);
//! esp = esp + 0x24;
//! ```
//!
//! After:
//! ```text
//! throw exc; // __rtti_Error
//! ```

use crate::{
    analysis::UseDefComputer,
    compiler::{
        pass::{Cursor, InstructionAnalysis},
        AnalysisConfig, EventKind, ThrowHelper, ThrowHelperKind,
    },
    ir::{Expression, Instruction, InstructionType, RegisterFile, UnaryOperator},
};

/// Recognises a runtime call and produces the instruction it stands for.
pub trait IdiomFolder: Send + Sync {
    /// Name used in events.
    fn name(&self) -> &'static str;

    /// Returns the replacement for `instruction`, or `None` if it does not match.
    fn fold(&self, instruction: &Instruction, registers: &dyn RegisterFile) -> Option<Instruction>;
}

/// Folds calls to exception helpers into `Throw` instructions.
#[derive(Debug, Clone)]
pub struct ThrowCallFolder {
    helpers: Vec<ThrowHelper>,
}

impl ThrowCallFolder {
    /// Creates a folder recognising `helpers`.
    #[must_use]
    pub fn new(helpers: Vec<ThrowHelper>) -> Self {
        ThrowCallFolder { helpers }
    }
}

impl IdiomFolder for ThrowCallFolder {
    fn name(&self) -> &'static str {
        "throw"
    }

    fn fold(&self, instruction: &Instruction, _registers: &dyn RegisterFile) -> Option<Instruction> {
        let call = instruction.call()?;
        let callee = call.callee_name()?;
        let helper = self.helpers.iter().find(|helper| helper.name == callee)?;
        let address = instruction.address();

        match helper.kind {
            ThrowHelperKind::Rethrow => Some(Instruction::rethrow(address)),
            ThrowHelperKind::Throw {
                exception_parameter,
                type_parameter,
            } => {
                let exception = call.parameters().get(exception_parameter)?;
                match exception.as_ref() {
                    Expression::NumericLiteral(0) => Some(Instruction::rethrow(address)),
                    Expression::Unary {
                        op: UnaryOperator::AddressOf,
                        operand,
                    } => {
                        let data_type = call
                            .parameters()
                            .get(type_parameter)
                            .and_then(|parameter| match parameter.as_ref() {
                                Expression::GlobalVariable(global) => Some(global.name.clone()),
                                _ => None,
                            });
                        Some(Instruction::throw(address, operand.clone(), data_type))
                    }
                    _ => None,
                }
            }
        }
    }
}

/// Applies idiom folders to every assignment.
pub struct IdiomPass {
    folders: Vec<Box<dyn IdiomFolder>>,
}

impl IdiomPass {
    /// Creates a pass with the given folders, tried in order.
    #[must_use]
    pub fn new(folders: Vec<Box<dyn IdiomFolder>>) -> Self {
        IdiomPass { folders }
    }

    /// Creates a pass with the built-in folders for `config`.
    #[must_use]
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(vec![Box::new(ThrowCallFolder::new(
            config.throw_helpers.clone(),
        ))])
    }
}

impl InstructionAnalysis for IdiomPass {
    fn name(&self) -> &'static str {
        "idioms"
    }

    fn should_run(&self, config: &AnalysisConfig) -> bool {
        config.enable_idiom_folding && !self.folders.is_empty()
    }

    fn on_assignment(&mut self, cursor: &mut Cursor<'_>) {
        let registers = cursor.registers();
        let Some(current) = cursor.current() else {
            return;
        };
        let Some((folder, mut replacement)) = self
            .folders
            .iter()
            .find_map(|folder| Some((folder.name(), folder.fold(current, registers)?)))
        else {
            return;
        };
        UseDefComputer::new(registers, cursor.config()).compute_instruction(&mut replacement);
        let message = format!("{folder}: {}", replacement.tag());

        cursor.replace(replacement);

        let trailing = (cursor.position() + 1..cursor.len())
            .filter_map(|index| cursor.get(index))
            .filter(|i| !i.is_pending_deletion())
            .take_while(|i| {
                matches!(
                    i.tag(),
                    InstructionType::Assignment | InstructionType::Push | InstructionType::Pop
                )
            })
            .count();
        let erased = cursor.erase_following(trailing);

        cursor
            .record(EventKind::IdiomFolded)
            .message(format!("{message}, {erased} trailing instructions removed"));
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
        ir::{CallExpression, ExprRef, GenericRegisters, InstructionKind, InstructionList},
    };

    fn throw_call(helper: &str, parameters: Vec<ExprRef>) -> Instruction {
        let mut call = CallExpression::new(Expression::global(helper));
        for parameter in parameters {
            call.add_parameter(parameter);
        }
        call.finish_adding_parameters();
        Instruction::assignment(0x20, Expression::dummy(), Expression::from_call(call))
    }

    fn fold(instructions: Vec<Instruction>) -> (InstructionList, EventLog) {
        let config = AnalysisConfig::default();
        let registers = GenericRegisters::default();
        let events = EventLog::new();
        let mut list = InstructionList::from(instructions);
        let context = PassContext {
            config: &config,
            registers: &registers,
            events: &events,
        };
        run_on_list(&mut IdiomPass::from_config(&config), &mut list, context);
        (list, events)
    }

    #[test]
    fn test_borland_throw() {
        let (list, events) = fold(vec![
            throw_call(
                "@_ThrowExceptionLDTC$qpvt1t1t1uiuiuipuct1",
                vec![
                    Expression::global("__rtti_Error"),
                    Expression::address_of(Expression::stack("exc", -8)),
                    Expression::number(0),
                ],
            ),
            Instruction::assignment(0x25, Expression::register(4), Expression::number(0x24)),
            Instruction::push(0x28, Expression::register(0)),
            Instruction::ret(0x2c, Expression::dummy()),
        ]);

        assert_eq!(list.len(), 2);
        let InstructionKind::Throw {
            exception,
            data_type,
        } = list.get(0).unwrap().kind()
        else {
            panic!("expected a throw");
        };
        assert_eq!(exception.as_ref().unwrap().to_string(), "exc");
        assert_eq!(data_type.as_deref(), Some("__rtti_Error"));
        assert_eq!(list.get(1).unwrap().tag(), InstructionType::Return);
        assert!(events.has(EventKind::IdiomFolded));
    }

    #[test]
    fn test_msvc_throw_and_rethrow() {
        let (list, _) = fold(vec![
            throw_call(
                "_CxxThrowException",
                vec![
                    Expression::address_of(Expression::global("error")),
                    Expression::global("__TI1?AVError"),
                ],
            ),
            throw_call("_CxxThrowException", vec![Expression::number(0), Expression::number(0)]),
            throw_call("@_ReThrowException$quipuc", vec![Expression::number(1)]),
        ]);

        let kinds: Vec<_> = list.iter().map(|i| i.kind().clone()).collect();
        assert_eq!(
            kinds,
            vec![
                InstructionKind::Throw {
                    exception: Some(Expression::global("error")),
                    data_type: Some("__TI1?AVError".to_string()),
                },
                InstructionKind::Throw {
                    exception: None,
                    data_type: None,
                },
                InstructionKind::Throw {
                    exception: None,
                    data_type: None,
                },
            ]
        );
    }

    #[test]
    fn test_unknown_shape_is_left_alone() {
        let (list, events) = fold(vec![
            throw_call("_CxxThrowException", vec![Expression::register(1)]),
            throw_call("printf", vec![Expression::string("hi")]),
        ]);
        assert!(list.iter().all(|i| i.tag() == InstructionType::Assignment));
        assert!(!events.has(EventKind::IdiomFolded));
    }

    #[test]
    fn test_disabled() {
        let config = AnalysisConfig {
            enable_idiom_folding: false,
            ..AnalysisConfig::default()
        };
        assert!(!IdiomPass::from_config(&config).should_run(&config));
        assert!(!IdiomPass::new(Vec::new()).should_run(&AnalysisConfig::default()));
    }
}
