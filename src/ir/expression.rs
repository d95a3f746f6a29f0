//! Expression trees of the intermediate representation.
//!
//! Expressions are immutable trees of [`Expression`] nodes held through
//! [`ExprRef`] (`Arc<Expression>`). Copy propagation substitutes the very
//! same subtree into its use site, so one subtree can be reachable from
//! several instructions. Nothing mutates a shared subtree in place: a
//! rewrite rebuilds the path from the root down to the changed node
//! ([`Expression::substitute_register`]) or goes through
//! [`Arc::make_mut`], which copies a node only while it is still shared.
//!
//! # Precedence
//!
//! Every node has a [`Precedence`] used only when rendering. A child is
//! wrapped in parentheses exactly when its precedence is strictly lower than
//! its parent's, so `(R1 + R2) * R3` keeps its parentheses and `R1 + R2 * R3`
//! gets none.
//!
//! # Traversal order
//!
//! [`Expression::walk`] is post-order, except for calls: the parameters are
//! visited first and the callee last, so a visitor sees argument registers
//! before the call target.

use std::{fmt, sync::Arc};

use strum::{Display, EnumIter, EnumString};

use crate::ir::{
    register::{GenericRegisters, RegisterFile},
    Address,
};

/// Shared handle to an immutable expression tree.
pub type ExprRef = Arc<Expression>;

/// Maximum number of parameters a call expression accepts.
pub const MAX_PARAMETERS: usize = 15;

/// Rendering precedence, lowest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum Precedence {
    /// `c ? a : b`
    Ternary,
    /// `||`
    LogicalOr,
    /// `&&`
    LogicalAnd,
    /// `|`
    BitwiseOr,
    /// `^`
    BitwiseXor,
    /// `&`
    BitwiseAnd,
    /// `==`, `!=`
    Equality,
    /// `<`, `<=`, `>`, `>=`
    Relational,
    /// `<<`, `>>`
    Shift,
    /// `+`, `-`
    Additive,
    /// `*`, `/`, `%`
    Multiplicative,
    /// Prefix operators
    Unary,
    /// Calls, literals and variable references
    Atom,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum BinaryOperator {
    /// Logical or
    #[strum(to_string = "||")]
    LogicalOr,
    /// Logical and
    #[strum(to_string = "&&")]
    LogicalAnd,
    /// Bitwise or
    #[strum(to_string = "|")]
    BitwiseOr,
    /// Bitwise exclusive or
    #[strum(to_string = "^")]
    BitwiseXor,
    /// Bitwise and
    #[strum(to_string = "&")]
    BitwiseAnd,
    /// Equality comparison
    #[strum(to_string = "==")]
    Equal,
    /// Inequality comparison
    #[strum(to_string = "!=")]
    NotEqual,
    /// Less than
    #[strum(to_string = "<")]
    Less,
    /// Less than or equal
    #[strum(to_string = "<=")]
    LessEqual,
    /// Greater than
    #[strum(to_string = ">")]
    Greater,
    /// Greater than or equal
    #[strum(to_string = ">=")]
    GreaterEqual,
    /// Left shift
    #[strum(to_string = "<<")]
    ShiftLeft,
    /// Right shift
    #[strum(to_string = ">>")]
    ShiftRight,
    /// Addition
    #[strum(to_string = "+")]
    Add,
    /// Subtraction
    #[strum(to_string = "-")]
    Subtract,
    /// Multiplication
    #[strum(to_string = "*")]
    Multiply,
    /// Division
    #[strum(to_string = "/")]
    Divide,
    /// Remainder
    #[strum(to_string = "%")]
    Remainder,
}

impl BinaryOperator {
    /// Returns the rendering precedence of this operator.
    #[must_use]
    pub const fn precedence(self) -> Precedence {
        match self {
            Self::LogicalOr => Precedence::LogicalOr,
            Self::LogicalAnd => Precedence::LogicalAnd,
            Self::BitwiseOr => Precedence::BitwiseOr,
            Self::BitwiseXor => Precedence::BitwiseXor,
            Self::BitwiseAnd => Precedence::BitwiseAnd,
            Self::Equal | Self::NotEqual => Precedence::Equality,
            Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual => {
                Precedence::Relational
            }
            Self::ShiftLeft | Self::ShiftRight => Precedence::Shift,
            Self::Add | Self::Subtract => Precedence::Additive,
            Self::Multiply | Self::Divide | Self::Remainder => Precedence::Multiplicative,
        }
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum UnaryOperator {
    /// Pointer dereference
    #[strum(to_string = "*")]
    Dereference,
    /// Address-of
    #[strum(to_string = "&")]
    AddressOf,
    /// Arithmetic negation
    #[strum(to_string = "-")]
    Negate,
    /// Logical not
    #[strum(to_string = "!")]
    LogicalNot,
    /// Bitwise complement
    #[strum(to_string = "~")]
    BitwiseNot,
}

/// Calling convention of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
pub enum CallingConvention {
    /// Nothing known yet; treated like cdecl
    #[default]
    #[strum(to_string = "unknown")]
    Unknown,
    /// Caller cleans the stack
    #[strum(to_string = "cdecl")]
    Cdecl,
    /// Callee cleans the stack
    #[strum(to_string = "stdcall")]
    Stdcall,
    /// Caller cleans the stack, variable argument count
    #[strum(to_string = "cdecl...")]
    CdeclEllipsis,
}

impl CallingConvention {
    /// Returns `true` when the caller cleans up the arguments.
    #[must_use]
    pub const fn is_cdecl(self) -> bool {
        matches!(self, Self::Unknown | Self::Cdecl | Self::CdeclEllipsis)
    }
}

/// Width of addresses and machine words, used when rendering numeric literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressWidth {
    /// 16-bit code
    Bits16,
    /// 32-bit code
    #[default]
    Bits32,
    /// 64-bit code
    Bits64,
}

impl AddressWidth {
    /// Returns the all-ones value of this width.
    #[must_use]
    pub const fn mask(self) -> u64 {
        match self {
            Self::Bits16 => 0xffff,
            Self::Bits32 => 0xffff_ffff,
            Self::Bits64 => u64::MAX,
        }
    }
}

/// A call with its ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpression {
    function: ExprRef,
    parameters: Vec<ExprRef>,
    parameter_count: Option<usize>,
    convention: CallingConvention,
    finished: bool,
}

impl CallExpression {
    /// Creates a call to `function` with no parameters and an unknown parameter count.
    #[must_use]
    pub fn new(function: ExprRef) -> Self {
        CallExpression {
            function,
            parameters: Vec::new(),
            parameter_count: None,
            convention: CallingConvention::Unknown,
            finished: false,
        }
    }

    /// Sets a parameter count known ahead of analysis, e.g. from a prototype.
    #[must_use]
    pub fn with_parameter_count(mut self, count: usize) -> Self {
        self.parameter_count = Some(count.min(MAX_PARAMETERS));
        self
    }

    /// Sets the calling convention.
    #[must_use]
    pub fn with_convention(mut self, convention: CallingConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Returns the callee expression.
    #[must_use]
    pub fn function(&self) -> &ExprRef {
        &self.function
    }

    /// Returns the callee name when the callee is a named global.
    #[must_use]
    pub fn callee_name(&self) -> Option<&str> {
        match self.function.as_ref() {
            Expression::GlobalVariable(global) => Some(&global.name),
            _ => None,
        }
    }

    /// Returns the parameters collected so far.
    #[must_use]
    pub fn parameters(&self) -> &[ExprRef] {
        &self.parameters
    }

    /// Returns the known parameter count.
    #[must_use]
    pub fn parameter_count(&self) -> Option<usize> {
        self.parameter_count
    }

    /// Returns the calling convention.
    #[must_use]
    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    /// Returns `true` once no more parameters are expected.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Marks the parameter list as complete.
    pub fn finish_adding_parameters(&mut self) {
        self.finished = true;
    }

    /// Appends a parameter.
    ///
    /// Adding to a finished call, past the known parameter count or past
    /// [`MAX_PARAMETERS`] is logged and ignored. Returns `true` if the
    /// parameter was added.
    pub fn add_parameter(&mut self, parameter: ExprRef) -> bool {
        if self.finished {
            log::warn!("adding a parameter to a call that was already finished");
            return false;
        }
        let limit = self.parameter_count.unwrap_or(MAX_PARAMETERS);
        if self.parameters.len() >= limit {
            log::warn!(
                "adding more parameters than the parameter count ({} >= {limit})",
                self.parameters.len()
            );
            return false;
        }
        self.parameters.push(parameter);
        true
    }

    /// Records a parameter count inferred from stack cleanup at the call site.
    ///
    /// Only takes effect when nothing was known, and marks the call stdcall.
    pub fn parameter_count_from_stack(&mut self, count: usize) {
        match self.parameter_count {
            None => {
                self.parameter_count = Some(count.min(MAX_PARAMETERS));
                self.convention = CallingConvention::Stdcall;
            }
            Some(previous) if previous != count => {
                log::warn!(
                    "ignoring parameter count from stack (previous={previous}, suggestion={count})"
                );
            }
            Some(_) => {}
        }
    }

    /// Records a parameter count observed at a caller-cleans call site.
    ///
    /// Marks the call cdecl when nothing was known. A variadic call may grow
    /// its count but never shrink it.
    pub fn parameter_count_from_call(&mut self, count: usize) {
        let count = count.min(MAX_PARAMETERS);
        match self.parameter_count {
            None => {
                self.parameter_count = Some(count);
                self.convention = CallingConvention::Cdecl;
            }
            Some(previous) if previous == count => {}
            Some(previous) if self.convention == CallingConvention::CdeclEllipsis => {
                if previous > count {
                    log::warn!(
                        "will not decrease parameter count of variadic call (previous={previous}, suggestion={count})"
                    );
                } else {
                    self.parameter_count = Some(count);
                }
            }
            Some(previous) => {
                log::warn!(
                    "ignoring parameter count from call (previous={previous}, suggestion={count})"
                );
            }
        }
    }
}

/// A string constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    /// The decoded text
    pub value: String,
    /// Rendered with an `L` prefix
    pub wide: bool,
}

/// A named global, usually a code or data symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalVariable {
    /// Symbol name
    pub name: String,
    /// Element index, rendered as `name[index]` when non-zero
    pub index: i64,
    /// Address of the symbol, when it refers to code or data
    pub address: Option<Address>,
}

/// A named slot in the current stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackVariable {
    /// Display name
    pub name: String,
    /// Frame offset
    pub offset: i64,
}

/// A node of an expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// `left op right`
    Binary {
        /// Operator
        op: BinaryOperator,
        /// Left operand
        left: ExprRef,
        /// Right operand
        right: ExprRef,
    },
    /// `op operand`
    Unary {
        /// Operator
        op: UnaryOperator,
        /// Operand
        operand: ExprRef,
    },
    /// `condition ? if_true : if_false`
    Ternary {
        /// Condition
        condition: ExprRef,
        /// Value when the condition holds
        if_true: ExprRef,
        /// Value otherwise
        if_false: ExprRef,
    },
    /// Function call
    Call(CallExpression),
    /// Integer constant
    NumericLiteral(u64),
    /// String constant
    StringLiteral(StringLiteral),
    /// Machine register, by raw index
    Register(u16),
    /// Global symbol
    GlobalVariable(GlobalVariable),
    /// Stack frame slot
    StackVariable(StackVariable),
    /// Placeholder for an operand that was removed or could not be resolved
    Dummy,
}

impl Expression {
    /// Creates a register reference.
    #[must_use]
    pub fn register(reg: u16) -> ExprRef {
        Arc::new(Expression::Register(reg))
    }

    /// Creates an integer constant.
    #[must_use]
    pub fn number(value: u64) -> ExprRef {
        Arc::new(Expression::NumericLiteral(value))
    }

    /// Creates a narrow string constant.
    #[must_use]
    pub fn string(value: impl Into<String>) -> ExprRef {
        Arc::new(Expression::StringLiteral(StringLiteral {
            value: value.into(),
            wide: false,
        }))
    }

    /// Creates a wide string constant.
    #[must_use]
    pub fn wide_string(value: impl Into<String>) -> ExprRef {
        Arc::new(Expression::StringLiteral(StringLiteral {
            value: value.into(),
            wide: true,
        }))
    }

    /// Creates a global without an address.
    #[must_use]
    pub fn global(name: impl Into<String>) -> ExprRef {
        Arc::new(Expression::GlobalVariable(GlobalVariable {
            name: name.into(),
            index: 0,
            address: None,
        }))
    }

    /// Creates a global referring to code or data at `address`.
    #[must_use]
    pub fn global_at(name: impl Into<String>, address: Address) -> ExprRef {
        Arc::new(Expression::GlobalVariable(GlobalVariable {
            name: name.into(),
            index: 0,
            address: Some(address),
        }))
    }

    /// Creates a stack frame slot.
    #[must_use]
    pub fn stack(name: impl Into<String>, offset: i64) -> ExprRef {
        Arc::new(Expression::StackVariable(StackVariable {
            name: name.into(),
            offset,
        }))
    }

    /// Creates a binary expression.
    #[must_use]
    pub fn binary(op: BinaryOperator, left: ExprRef, right: ExprRef) -> ExprRef {
        Arc::new(Expression::Binary { op, left, right })
    }

    /// Creates a unary expression.
    #[must_use]
    pub fn unary(op: UnaryOperator, operand: ExprRef) -> ExprRef {
        Arc::new(Expression::Unary { op, operand })
    }

    /// Creates `*operand`.
    #[must_use]
    pub fn deref(operand: ExprRef) -> ExprRef {
        Expression::unary(UnaryOperator::Dereference, operand)
    }

    /// Creates `&operand`.
    #[must_use]
    pub fn address_of(operand: ExprRef) -> ExprRef {
        Expression::unary(UnaryOperator::AddressOf, operand)
    }

    /// Creates a ternary expression.
    #[must_use]
    pub fn ternary(condition: ExprRef, if_true: ExprRef, if_false: ExprRef) -> ExprRef {
        Arc::new(Expression::Ternary {
            condition,
            if_true,
            if_false,
        })
    }

    /// Creates a call without parameters.
    #[must_use]
    pub fn call(function: ExprRef) -> ExprRef {
        Arc::new(Expression::Call(CallExpression::new(function)))
    }

    /// Wraps a prepared call.
    #[must_use]
    pub fn from_call(call: CallExpression) -> ExprRef {
        Arc::new(Expression::Call(call))
    }

    /// Creates the placeholder expression.
    #[must_use]
    pub fn dummy() -> ExprRef {
        Arc::new(Expression::Dummy)
    }

    /// Returns the rendering precedence of this node.
    #[must_use]
    pub fn precedence(&self) -> Precedence {
        match self {
            Expression::Binary { op, .. } => op.precedence(),
            Expression::Unary { .. } => Precedence::Unary,
            Expression::Ternary { .. } => Precedence::Ternary,
            _ => Precedence::Atom,
        }
    }

    /// Returns the number of direct children.
    ///
    /// A call's children are its callee followed by its parameters.
    #[must_use]
    pub fn child_count(&self) -> usize {
        match self {
            Expression::Binary { .. } => 2,
            Expression::Unary { .. } => 1,
            Expression::Ternary { .. } => 3,
            Expression::Call(call) => 1 + call.parameters.len(),
            _ => 0,
        }
    }

    /// Returns the child at `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<&ExprRef> {
        match (self, index) {
            (Expression::Binary { left, .. }, 0) => Some(left),
            (Expression::Binary { right, .. }, 1) => Some(right),
            (Expression::Unary { operand, .. }, 0) => Some(operand),
            (Expression::Ternary { condition, .. }, 0) => Some(condition),
            (Expression::Ternary { if_true, .. }, 1) => Some(if_true),
            (Expression::Ternary { if_false, .. }, 2) => Some(if_false),
            (Expression::Call(call), 0) => Some(&call.function),
            (Expression::Call(call), i) => call.parameters.get(i - 1),
            _ => None,
        }
    }

    /// Returns the child at `index` for replacement in place.
    pub fn child_mut(&mut self, index: usize) -> Option<&mut ExprRef> {
        match (self, index) {
            (Expression::Binary { left, .. }, 0) => Some(left),
            (Expression::Binary { right, .. }, 1) => Some(right),
            (Expression::Unary { operand, .. }, 0) => Some(operand),
            (Expression::Ternary { condition, .. }, 0) => Some(condition),
            (Expression::Ternary { if_true, .. }, 1) => Some(if_true),
            (Expression::Ternary { if_false, .. }, 2) => Some(if_false),
            (Expression::Call(call), 0) => Some(&mut call.function),
            (Expression::Call(call), i) => call.parameters.get_mut(i - 1),
            _ => None,
        }
    }

    /// Iterates the direct children in index order.
    pub fn children(&self) -> impl Iterator<Item = &ExprRef> + '_ {
        (0..self.child_count()).filter_map(move |i| self.child(i))
    }

    /// Returns `true` for the placeholder.
    #[must_use]
    pub fn is_dummy(&self) -> bool {
        matches!(self, Expression::Dummy)
    }

    /// Returns the register index if this is a register reference.
    #[must_use]
    pub fn as_register(&self) -> Option<u16> {
        match self {
            Expression::Register(reg) => Some(*reg),
            _ => None,
        }
    }

    /// Returns the call if this is a call expression.
    #[must_use]
    pub fn as_call(&self) -> Option<&CallExpression> {
        match self {
            Expression::Call(call) => Some(call),
            _ => None,
        }
    }

    /// Returns the code or data address of a global reference.
    #[must_use]
    pub fn global_address(&self) -> Option<Address> {
        match self {
            Expression::GlobalVariable(global) => global.address,
            _ => None,
        }
    }

    /// Visits every node in depth-first order.
    ///
    /// Children are visited before their parent. A call visits its
    /// parameters, then its callee, then itself.
    pub fn walk<F: FnMut(&Expression)>(&self, visitor: &mut F) {
        match self {
            Expression::Call(call) => {
                for parameter in &call.parameters {
                    parameter.walk(visitor);
                }
                call.function.walk(visitor);
            }
            _ => {
                for child in self.children() {
                    child.walk(visitor);
                }
            }
        }
        visitor(self);
    }

    /// Collects the raw indices of every register leaf in traversal order.
    #[must_use]
    pub fn registers(&self) -> Vec<u16> {
        let mut registers = Vec::new();
        self.walk(&mut |e| {
            if let Expression::Register(reg) = e {
                registers.push(*reg);
            }
        });
        registers
    }

    /// Returns `true` if any register leaf satisfies `predicate`.
    pub fn any_register<P: FnMut(u16) -> bool>(&self, mut predicate: P) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if let Expression::Register(reg) = e {
                found |= predicate(*reg);
            }
        });
        found
    }

    /// Returns `true` if the tree contains a call.
    #[must_use]
    pub fn contains_call(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| found |= matches!(e, Expression::Call(_)));
        found
    }

    /// Replaces every `Register(reg)` leaf with `replacement`.
    ///
    /// Returns the rewritten tree, or `None` if `reg` does not occur.
    /// Subtrees that do not contain `reg` are shared with the original.
    #[must_use]
    pub fn substitute_register(this: &ExprRef, reg: u16, replacement: &ExprRef) -> Option<ExprRef> {
        if let Expression::Register(r) = this.as_ref() {
            return (*r == reg).then(|| Arc::clone(replacement));
        }

        let mut rewritten: Option<Expression> = None;
        for index in 0..this.child_count() {
            let Some(child) = this.child(index) else {
                continue;
            };
            if let Some(new_child) = Expression::substitute_register(child, reg, replacement) {
                let node = rewritten.get_or_insert_with(|| this.as_ref().clone());
                if let Some(slot) = node.child_mut(index) {
                    *slot = new_child;
                }
            }
        }
        rewritten.map(Arc::new)
    }

    /// Calls `f` for every call expression in the tree, innermost first.
    ///
    /// Nodes on the path to a call are unshared with [`Arc::make_mut`]
    /// before `f` runs, other subtrees are left untouched.
    pub fn for_each_call_mut<F: FnMut(&mut CallExpression)>(this: &mut ExprRef, f: &mut F) {
        if !this.contains_call() {
            return;
        }
        let node = Arc::make_mut(this);
        if let Expression::Call(call) = &mut *node {
            for parameter in &mut call.parameters {
                Expression::for_each_call_mut(parameter, f);
            }
            Expression::for_each_call_mut(&mut call.function, f);
            f(call);
            return;
        }
        for index in 0..node.child_count() {
            if let Some(child) = node.child_mut(index) {
                Expression::for_each_call_mut(child, f);
            }
        }
    }
}

/// Renders expressions as C-like text.
///
/// Register names come from a [`RegisterFile`], numeric literals are
/// formatted for the configured [`AddressWidth`].
#[derive(Clone, Copy)]
pub struct ExpressionRenderer<'a> {
    registers: &'a dyn RegisterFile,
    width: AddressWidth,
}

impl<'a> ExpressionRenderer<'a> {
    /// Creates a renderer.
    #[must_use]
    pub fn new(registers: &'a dyn RegisterFile, width: AddressWidth) -> Self {
        ExpressionRenderer { registers, width }
    }

    /// Renders an expression into a new string.
    #[must_use]
    pub fn render(&self, expression: &Expression) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write(&mut out, expression);
        out
    }

    /// Renders an expression into `out`.
    ///
    /// # Errors
    ///
    /// Returns an error only if `out` fails to accept text.
    pub fn write<W: fmt::Write>(&self, out: &mut W, expression: &Expression) -> fmt::Result {
        match expression {
            Expression::Binary { op, left, right } => {
                let precedence = op.precedence();
                self.write_operand(out, left, precedence)?;
                write!(out, " {op} ")?;
                self.write_operand(out, right, precedence)
            }
            Expression::Unary { op, operand } => {
                let mut inner = String::new();
                self.write_operand(&mut inner, operand, Precedence::Unary)?;
                // "--" and "&&" would lex as different operators
                let doubled = match op {
                    UnaryOperator::Negate => inner.starts_with('-'),
                    UnaryOperator::AddressOf => inner.starts_with('&'),
                    _ => false,
                };
                let separator = if doubled { " " } else { "" };
                write!(out, "{op}{separator}{inner}")
            }
            Expression::Ternary {
                condition,
                if_true,
                if_false,
            } => {
                self.write_operand(out, condition, Precedence::Ternary)?;
                out.write_str(" ? ")?;
                self.write_operand(out, if_true, Precedence::Ternary)?;
                out.write_str(" : ")?;
                self.write_operand(out, if_false, Precedence::Ternary)
            }
            Expression::Call(call) => {
                self.write_operand(out, &call.function, Precedence::Atom)?;
                out.write_char('(')?;
                for (i, parameter) in call.parameters.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    self.write(out, parameter)?;
                }
                out.write_char(')')
            }
            Expression::NumericLiteral(value) => self.write_number(out, *value),
            Expression::StringLiteral(literal) => write_string_literal(out, literal),
            Expression::Register(reg) => out.write_str(&self.registers.name(*reg)),
            Expression::GlobalVariable(global) => {
                out.write_str(&global.name)?;
                if global.index != 0 {
                    write!(out, "[{}]", global.index)?;
                }
                Ok(())
            }
            Expression::StackVariable(variable) => out.write_str(&variable.name),
            Expression::Dummy => Ok(()),
        }
    }

    fn write_operand<W: fmt::Write>(
        &self,
        out: &mut W,
        child: &Expression,
        parent: Precedence,
    ) -> fmt::Result {
        if child.precedence() < parent {
            out.write_char('(')?;
            self.write(out, child)?;
            out.write_char(')')
        } else {
            self.write(out, child)
        }
    }

    fn write_number<W: fmt::Write>(&self, out: &mut W, value: u64) -> fmt::Result {
        let mask = self.width.mask();
        if value <= mask && value >= mask - 15 {
            // two's complement small negative
            write!(out, "-{}", (mask - value) + 1)
        } else if value < 0x10 {
            write!(out, "{value}")
        } else {
            write!(out, "{value:#x}")
        }
    }
}

fn write_string_literal<W: fmt::Write>(out: &mut W, literal: &StringLiteral) -> fmt::Result {
    if literal.wide {
        out.write_char('L')?;
    }
    out.write_char('"')?;
    for byte in literal.value.bytes() {
        match byte {
            b'\n' => out.write_str("\\n")?,
            b'\r' => out.write_str("\\r")?,
            b'\t' => out.write_str("\\t")?,
            b'\\' => out.write_str("\\\\")?,
            0x0b => out.write_str("\\v")?,
            0x08 => out.write_str("\\b")?,
            0x0c => out.write_str("\\f")?,
            0x07 => out.write_str("\\a")?,
            b'"' => out.write_str("\\\"")?,
            0x20..=0x7e => out.write_char(char::from(byte))?,
            _ => write!(out, "\\x{byte:02x}")?,
        }
    }
    out.write_char('"')
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ExpressionRenderer::new(&GenericRegisters::default(), AddressWidth::Bits32).write(f, self)
    }
}
