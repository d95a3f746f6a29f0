//! End-to-end pipeline tests.
//!
//! Each test lifts a small function by hand, runs it through
//! [`Decompiler::decompile`] and checks the generated text together with the
//! events the rewrites recorded.

use std::sync::Arc;

use decoflow::prelude::*;

fn x86(reg: u16) -> ExprRef {
    Expression::register(reg)
}

fn decompiler(config: AnalysisConfig) -> Decompiler {
    Decompiler::new(config, Arc::new(X86Registers))
}

/// `if (printf("%d\n", arg_0) == 0) return -1; return eax;`, compiled cdecl.
fn printf_function() -> InstructionList {
    let printf = CallExpression::new(Expression::global("printf")).with_parameter_count(2);
    InstructionList::from(vec![
        Instruction::assignment(0x1000, x86(X86Registers::ECX), Expression::stack("arg_0", 8)),
        Instruction::push(0x1003, x86(X86Registers::ECX)),
        Instruction::push(0x1004, Expression::string("%d\n")),
        Instruction::assignment(0x1009, x86(X86Registers::EAX), Expression::from_call(printf)),
        Instruction::assignment(
            0x100e,
            x86(X86Registers::ESP),
            Expression::binary(BinaryOperator::Add, x86(X86Registers::ESP), Expression::number(8)),
        ),
        Instruction::conditional_jump(
            0x1011,
            Expression::binary(BinaryOperator::Equal, x86(X86Registers::EAX), Expression::number(0)),
            Expression::global_at("fail", 0x1020),
        ),
        Instruction::ret(0x1013, x86(X86Registers::EAX)),
        Instruction::label(0x1020, "fail"),
        Instruction::assignment(0x1020, x86(X86Registers::EAX), Expression::number(0xffff_ffff)),
        Instruction::ret(0x1025, x86(X86Registers::EAX)),
    ])
}

#[test]
fn test_stack_call_pipeline() -> Result<()> {
    let function = decompiler(AnalysisConfig::default()).decompile(printf_function())?;

    assert_eq!(
        function.lines,
        vec![
            "  eax = printf(\"%d\\n\", arg_0);",
            "  if (eax == 0) goto fail;",
            "",
            "  return eax;",
            "",
            "fail:",
            "  return -1;",
            "",
        ]
    );

    let events = &function.events;
    assert_eq!(events.count_kind(EventKind::ParametersCollected), 1);
    assert_eq!(events.count_kind(EventKind::CopyPropagated), 2);
    assert_eq!(events.count_kind(EventKind::InstructionRemoved), 1);
    assert!(!events.has(EventKind::Error));
    Ok(())
}

#[test]
fn test_call_result_is_not_moved_across_instructions() -> Result<()> {
    let function = decompiler(AnalysisConfig::default()).decompile(printf_function())?;

    // eax is read twice, and the call must stay where it is
    let call = function.cfg.instruction_at(0x1009).unwrap();
    assert!(call.call().is_some_and(|c| c.is_finished()));
    assert_eq!(call.call().map(|c| c.parameters().len()), Some(2));
    Ok(())
}

#[test]
fn test_analysis_only_keeps_everything() -> Result<()> {
    let config = AnalysisConfig {
        code_style: CodeStyle::Listing,
        ..AnalysisConfig::analysis_only()
    };
    let function = decompiler(config).decompile(printf_function())?;

    assert_eq!(function.cfg.instruction_count(), 10);
    assert_eq!(function.lines[0], "00001000   ecx = arg_0;");
    assert_eq!(function.lines[1], "00001003   /* push ecx */");
    assert_eq!(function.events.transformation_count(), 0);

    // analyses still ran
    let entry = function.cfg.entry().unwrap();
    assert_eq!(function.cfg.node(entry).unwrap().definitions().count(), 3);
    Ok(())
}

#[test]
fn test_dead_definitions_respect_liveness() -> Result<()> {
    let config = AnalysisConfig {
        enable_copy_propagation: false,
        ..AnalysisConfig::default()
    };
    let registers = GenericRegisters::default();
    let function = Decompiler::new(config, Arc::new(registers)).decompile(InstructionList::from(vec![
        Instruction::assignment(0x00, Expression::register(3), Expression::number(1)),
        Instruction::jump(0x04, Expression::global_at("body", 0x10)),
        Instruction::label(0x08, "exit"),
        Instruction::ret(0x0c, Expression::register(1)),
        Instruction::label(0x10, "body"),
        Instruction::assignment(0x14, Expression::register(1), Expression::number(5)),
        Instruction::assignment(0x18, Expression::register(2), Expression::number(6)),
        Instruction::jump(0x1c, Expression::global_at("exit", 0x08)),
    ]))?;

    // nobody reads R3 or R2; R1 only through the back edge
    assert!(function.cfg.instruction_at(0x00).is_none());
    assert!(function.cfg.instruction_at(0x14).is_some());
    assert!(function.cfg.instruction_at(0x18).is_none());
    Ok(())
}

fn increment_then_use(reader: ExprRef, split: bool) -> InstructionList {
    let r = Expression::register;
    let mut instructions = vec![Instruction::assignment(
        0x00,
        r(1),
        Expression::binary(BinaryOperator::Add, r(4), Expression::number(1)),
    )];
    if split {
        instructions.push(Instruction::label(0x04, "next"));
    }
    instructions.push(Instruction::ret(0x08, reader));
    InstructionList::from(instructions)
}

#[test]
fn test_copy_propagation_replaces_every_use() -> Result<()> {
    let r = Expression::register;
    let reader = Expression::binary(BinaryOperator::Multiply, r(1), r(1));
    let function = Decompiler::new(AnalysisConfig::default(), Arc::new(GenericRegisters::default()))
        .decompile(increment_then_use(reader, false))?;

    assert!(function.cfg.instruction_at(0x00).is_none());
    assert_eq!(function.lines, vec!["  return (R4 + 1) * (R4 + 1);", ""]);
    Ok(())
}

#[test]
fn test_copy_propagation_keeps_live_out_last_definitions() -> Result<()> {
    let r = Expression::register;
    let reader = Expression::binary(BinaryOperator::Multiply, r(1), r(5));
    let function = Decompiler::new(AnalysisConfig::default(), Arc::new(GenericRegisters::default()))
        .decompile(increment_then_use(reader, true))?;

    // R1 leaves its node, so the assignment stays
    assert!(function.cfg.instruction_at(0x00).is_some());
    assert_eq!(
        function.lines,
        vec!["  R1 = R4 + 1;", "", "next:", "  return R1 * R5;", ""]
    );
    Ok(())
}

#[test]
fn test_increment_then_return() -> Result<()> {
    let r = Expression::register;
    let function = Decompiler::new(AnalysisConfig::default(), Arc::new(GenericRegisters::default()))
        .decompile(InstructionList::from(vec![
            Instruction::assignment(
                0x00,
                r(1),
                Expression::binary(BinaryOperator::Add, r(1), Expression::number(1)),
            ),
            Instruction::ret(0x04, r(1)),
        ]))?;

    assert!(function.cfg.instruction_at(0x00).is_none());
    assert_eq!(function.lines, vec!["  return R1 + 1;", ""]);
    Ok(())
}

#[test]
fn test_dead_definition_keeps_nested_call() -> Result<()> {
    let r = Expression::register;
    let function = Decompiler::new(AnalysisConfig::default(), Arc::new(GenericRegisters::default()))
        .decompile(InstructionList::from(vec![
            Instruction::assignment(
                0x00,
                r(1),
                Expression::binary(
                    BinaryOperator::Add,
                    Expression::call(Expression::global("rand")),
                    Expression::number(1),
                ),
            ),
            Instruction::ret(0x04, Expression::dummy()),
        ]))?;

    // the result is dead, the call is not
    assert!(function.cfg.instruction_at(0x00).is_some());
    assert_eq!(function.lines, vec!["  rand() + 1;", "  return;", ""]);
    Ok(())
}

#[test]
fn test_throw_helper_folded() -> Result<()> {
    let mut instructions = Vec::new();
    let mut address = 0x2000;
    for _ in 0..7 {
        instructions.push(Instruction::push(address, Expression::number(0)));
        address += 2;
    }
    instructions.push(Instruction::push(
        address,
        Expression::address_of(Expression::stack("exc", -0x10)),
    ));
    instructions.push(Instruction::push(address + 3, Expression::global("__rtti_Error")));
    let helper = CallExpression::new(Expression::global("@_ThrowExceptionLDTC$qpvt1t1t1uiuiuipuct1"))
        .with_parameter_count(9);
    instructions.push(Instruction::assignment(
        address + 8,
        Expression::dummy(),
        Expression::from_call(helper),
    ));
    instructions.push(Instruction::push(address + 13, x86(X86Registers::EBX)));
    instructions.push(Instruction::ret(address + 14, Expression::dummy()));

    let function = decompiler(AnalysisConfig::default()).decompile(InstructionList::from(instructions))?;

    assert_eq!(function.lines, vec!["  throw exc; // __rtti_Error", "  return;", ""]);
    assert_eq!(function.events.count_kind(EventKind::IdiomFolded), 1);
    Ok(())
}

#[test]
fn test_register_arguments() -> Result<()> {
    let r = Expression::register;
    let config = AnalysisConfig::register_arguments(2);
    let function = Decompiler::new(config, Arc::new(ArmRegisters)).decompile(InstructionList::from(vec![
        Instruction::assignment(0x00, r(0), Expression::number(5)),
        Instruction::assignment(0x04, r(1), r(2)),
        Instruction::assignment(0x08, r(0), Expression::call(Expression::global("f"))),
        Instruction::ret(0x0c, r(0)),
    ]))?;

    assert_eq!(function.lines, vec!["  return f(5, R2);", ""]);
    Ok(())
}

#[test]
fn test_unlifted_instructions_survive() -> Result<()> {
    let function = decompiler(AnalysisConfig::default()).decompile(InstructionList::from(vec![
        Instruction::low_level(0x10, 0x0fa2, "cpuid"),
        Instruction::ret(0x12, Expression::dummy()),
    ]))?;

    assert_eq!(function.lines[0], "  /* Low-level instruction of type 4002 */");
    assert!(function.events.has(EventKind::Warning));
    Ok(())
}

#[test]
fn test_decompile_all() -> Result<()> {
    let functions = vec![printf_function(), InstructionList::new(), printf_function()];
    let results = decompiler(AnalysisConfig::default()).decompile_all(functions);

    assert_eq!(results.len(), 3);
    let texts = results
        .into_iter()
        .map(|result| result.map(|function| function.text()))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(texts[0], texts[2]);
    assert!(texts[1].is_empty());
    Ok(())
}
