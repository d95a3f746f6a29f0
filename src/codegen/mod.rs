//! Text rendering of the analysed IR.
//!
//! [`CodeGenerator`] walks the nodes of a [`ControlFlowGraph`](crate::analysis::ControlFlowGraph)
//! (or a flat instruction list) and writes one line per instruction into a
//! [`LineSink`]. Expressions are rendered by [`ExpressionRenderer`](crate::ir::ExpressionRenderer),
//! so parentheses appear exactly where operator precedence needs them.
//!
//! # Output styles
//!
//! ```text
//! Pseudocode                      Listing
//! ----------                      -------
//!   eax = strlen(esi);            00401004   eax = strlen(esi);
//!   if (eax == 0) goto done;      00401009   if (eax == 0) goto done;
//! done:                           00401010 done:
//!   return eax;                   00401010   return eax;
//! ```
//!
//! Lines longer than the configured width are split into several sink lines.

mod generator;

use strum::{Display, EnumIter, EnumString};

pub use generator::CodeGenerator;

/// Output style of the [`CodeGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CodeStyle {
    /// Every line starts with the instruction address.
    Listing,
    /// Address-free C-like text.
    #[default]
    Pseudocode,
}

/// A line-oriented consumer of generated text.
pub trait LineSink {
    /// Receives one line, without a trailing newline.
    fn emit(&mut self, line: &str);
}

impl LineSink for Vec<String> {
    fn emit(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

impl LineSink for String {
    fn emit(&mut self, line: &str) {
        self.push_str(line);
        self.push('\n');
    }
}
