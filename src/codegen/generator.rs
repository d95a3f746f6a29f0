//! Instruction rendering and line chunking.

use std::fmt::Write;

use crate::{
    analysis::ControlFlowGraph,
    codegen::{CodeStyle, LineSink},
    compiler::AnalysisConfig,
    ir::{AddressWidth, ExpressionRenderer, Instruction, InstructionKind, RegisterFile},
    Result,
};

const INDENT: &str = "  ";

/// Renders instructions as C-like text.
///
/// The generator only reads the IR; it can run at any point of the
/// pipeline, including before any rewrite.
///
/// # Example
///
/// ```rust,ignore
/// use decoflow::codegen::CodeGenerator;
///
/// let mut lines: Vec<String> = Vec::new();
/// CodeGenerator::new(&registers, &config).generate(&cfg, &mut lines)?;
/// for line in &lines {
///     println!("{line}");
/// }
/// ```
pub struct CodeGenerator<'a> {
    renderer: ExpressionRenderer<'a>,
    style: CodeStyle,
    line_width: usize,
}

impl<'a> CodeGenerator<'a> {
    /// Creates a generator using the style, address width and line width of `config`.
    #[must_use]
    pub fn new(registers: &'a dyn RegisterFile, config: &AnalysisConfig) -> Self {
        Self::with_style(registers, config.address_width, config.code_style, config.line_width)
    }

    /// Creates a generator with explicit settings.
    ///
    /// A `line_width` of zero disables chunking.
    #[must_use]
    pub fn with_style(
        registers: &'a dyn RegisterFile,
        width: AddressWidth,
        style: CodeStyle,
        line_width: usize,
    ) -> Self {
        CodeGenerator {
            renderer: ExpressionRenderer::new(registers, width),
            style,
            line_width,
        }
    }

    /// Renders every node in creation order, each followed by an empty line.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Format`] if formatting fails.
    pub fn generate<S: LineSink + ?Sized>(&self, cfg: &ControlFlowGraph, sink: &mut S) -> Result<()> {
        for (_, node) in cfg.nodes() {
            for instruction in node.instructions() {
                self.emit_instruction(instruction, sink)?;
            }
            sink.emit("");
        }
        Ok(())
    }

    /// Renders a flat instruction list, without node separators.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Format`] if formatting fails.
    pub fn generate_list<'i, I, S>(&self, instructions: I, sink: &mut S) -> Result<()>
    where
        I: IntoIterator<Item = &'i Instruction>,
        S: LineSink + ?Sized,
    {
        for instruction in instructions {
            self.emit_instruction(instruction, sink)?;
        }
        Ok(())
    }

    /// Renders one instruction, without address prefix or indentation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Format`] if formatting fails.
    pub fn render(&self, instruction: &Instruction) -> Result<String> {
        let mut out = String::new();
        let r = &self.renderer;

        match instruction.kind() {
            InstructionKind::Assignment {
                destination,
                source,
            } => {
                if !destination.is_dummy() {
                    r.write(&mut out, destination)?;
                    out.write_str(" = ")?;
                }
                r.write(&mut out, source)?;
                out.write_char(';')?;
            }
            InstructionKind::Push(value) => {
                out.write_str("/* push ")?;
                r.write(&mut out, value)?;
                out.write_str(" */")?;
            }
            InstructionKind::Pop(value) => {
                out.write_str("/* pop ")?;
                r.write(&mut out, value)?;
                out.write_str(" */")?;
            }
            InstructionKind::Jump(target) => {
                out.write_str("goto ")?;
                r.write(&mut out, target)?;
                out.write_char(';')?;
            }
            InstructionKind::ConditionalJump { condition, target } => {
                out.write_str("if (")?;
                r.write(&mut out, condition)?;
                out.write_str(") goto ")?;
                r.write(&mut out, target)?;
                out.write_char(';')?;
            }
            InstructionKind::Return(value) => {
                out.write_str("return")?;
                if !value.is_dummy() {
                    out.write_char(' ')?;
                    r.write(&mut out, value)?;
                }
                out.write_char(';')?;
            }
            InstructionKind::Label(name) => write!(out, "{name}:")?,
            InstructionKind::Case(value) => write!(out, "case {value}:")?,
            InstructionKind::Switch(value) => {
                out.write_str("switch (")?;
                r.write(&mut out, value)?;
                out.write_char(')')?;
            }
            InstructionKind::Throw {
                exception,
                data_type,
            } => {
                out.write_str("throw")?;
                if let Some(exception) = exception {
                    out.write_char(' ')?;
                    r.write(&mut out, exception)?;
                }
                out.write_char(';')?;
                if let Some(data_type) = data_type {
                    write!(out, " // {data_type}")?;
                }
            }
            InstructionKind::LowLevel(low) => {
                write!(out, "/* Low-level instruction of type {} */", low.opcode)?;
            }
        }

        Ok(out)
    }

    fn emit_instruction<S: LineSink + ?Sized>(&self, instruction: &Instruction, sink: &mut S) -> Result<()> {
        if instruction.is_pending_deletion() {
            return Ok(());
        }

        let mut line = String::new();
        if self.style == CodeStyle::Listing {
            write!(line, "{:08x} ", instruction.address())?;
        }
        if !matches!(
            instruction.kind(),
            InstructionKind::Label(_) | InstructionKind::Case(_)
        ) {
            line.push_str(INDENT);
        }
        line.push_str(&self.render(instruction)?);

        self.emit_chunked(&line, sink);
        Ok(())
    }

    /// Splits `line` into segments of at most `line_width` characters.
    fn emit_chunked<S: LineSink + ?Sized>(&self, line: &str, sink: &mut S) {
        if self.line_width == 0 || line.chars().count() <= self.line_width {
            sink.emit(line);
            return;
        }

        let mut start = 0;
        let mut count = 0;
        for (index, _) in line.char_indices() {
            if count == self.line_width {
                sink.emit(&line[start..index]);
                start = index;
                count = 0;
            }
            count += 1;
        }
        sink.emit(&line[start..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::CfgBuilder,
        compiler::EventLog,
        ir::{
            BinaryOperator, CallExpression, Expression, GenericRegisters, InstructionList,
            X86Registers,
        },
    };

    fn generator(registers: &dyn RegisterFile, style: CodeStyle) -> CodeGenerator<'_> {
        CodeGenerator::with_style(registers, AddressWidth::Bits32, style, 80)
    }

    #[test]
    fn test_instruction_forms() {
        let names = X86Registers;
        let g = generator(&names, CodeStyle::Pseudocode);
        let eax = Expression::register(X86Registers::EAX);

        let cases = vec![
            (Instruction::assignment(0, eax.clone(), Expression::number(0x40)), "eax = 0x40;"),
            (
                Instruction::assignment(
                    0,
                    Expression::dummy(),
                    Expression::call(Expression::global("abort")),
                ),
                "abort();",
            ),
            (Instruction::push(0, eax.clone()), "/* push eax */"),
            (Instruction::pop(0, eax.clone()), "/* pop eax */"),
            (Instruction::jump(0, Expression::global("loop")), "goto loop;"),
            (
                Instruction::conditional_jump(
                    0,
                    Expression::binary(BinaryOperator::Equal, eax.clone(), Expression::number(0)),
                    Expression::global("done"),
                ),
                "if (eax == 0) goto done;",
            ),
            (Instruction::ret(0, eax.clone()), "return eax;"),
            (Instruction::ret(0, Expression::dummy()), "return;"),
            (Instruction::label(0, "done"), "done:"),
            (Instruction::case(0, 3), "case 3:"),
            (Instruction::switch(0, eax.clone()), "switch (eax)"),
            (Instruction::rethrow(0), "throw;"),
            (
                Instruction::throw(0, Expression::global("err"), Some("Error".to_string())),
                "throw err; // Error",
            ),
            (Instruction::low_level(0, 77, "cpuid"), "/* Low-level instruction of type 77 */"),
        ];

        for (instruction, expected) in cases {
            assert_eq!(g.render(&instruction).unwrap(), expected);
        }
    }

    #[test]
    fn test_styles_and_node_separation() {
        let events = EventLog::new();
        let cfg = CfgBuilder::new(&events)
            .build(InstructionList::from(vec![
                Instruction::assignment(0x401000, Expression::register(1), Expression::number(2)),
                Instruction::jump(0x401004, Expression::global_at("next", 0x401008)),
                Instruction::label(0x401008, "next"),
                Instruction::ret(0x401008, Expression::register(1)),
            ]))
            .unwrap();
        let names = GenericRegisters::default();

        let mut lines: Vec<String> = Vec::new();
        generator(&names, CodeStyle::Pseudocode)
            .generate(&cfg, &mut lines)
            .unwrap();
        assert_eq!(
            lines,
            vec!["  R1 = 2;", "  goto next;", "", "next:", "  return R1;", ""]
        );

        let mut lines: Vec<String> = Vec::new();
        generator(&names, CodeStyle::Listing)
            .generate_list(cfg.instructions().map(|(_, i)| i), &mut lines)
            .unwrap();
        assert_eq!(lines[0], "00401000   R1 = 2;");
        assert_eq!(lines[2], "00401008 next:");
    }

    #[test]
    fn test_long_lines_are_chunked() {
        let names = GenericRegisters::default();
        let mut call = CallExpression::new(Expression::global("format_message"));
        for _ in 0..8 {
            call.add_parameter(Expression::string("parameter text"));
        }
        call.finish_adding_parameters();
        let instruction = Instruction::assignment(0, Expression::dummy(), Expression::from_call(call));

        let g = CodeGenerator::with_style(&names, AddressWidth::Bits32, CodeStyle::Pseudocode, 80);
        let full = format!("  {}", g.render(&instruction).unwrap());
        let mut lines: Vec<String> = Vec::new();
        g.generate_list([&instruction], &mut lines).unwrap();

        assert!(lines.len() > 1);
        assert!(lines.iter().all(|line| line.chars().count() <= 80));
        assert_eq!(lines.concat(), full);
    }

    #[test]
    fn test_chunking_respects_char_boundaries() {
        let names = GenericRegisters::default();
        let g = CodeGenerator::with_style(&names, AddressWidth::Bits32, CodeStyle::Pseudocode, 4);
        let mut lines: Vec<String> = Vec::new();
        g.emit_chunked("äöüßéèêëa", &mut lines);
        assert_eq!(lines, vec!["äöüß", "éèêë", "a"]);
    }
}
