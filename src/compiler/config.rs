//! Configuration for the analysis pipeline.
//!
//! All settings are carried in an [`AnalysisConfig`] that is passed
//! explicitly to every stage; nothing in the crate reads global state.

use crate::{
    codegen::CodeStyle,
    ir::{AddressWidth, REGISTER_LIMIT},
    Error, Result,
};

/// How call arguments reach the callee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterPassing {
    /// Arguments are pushed on the machine stack and collected by the dataflow pass.
    Stack,
    /// The first `count` registers carry the arguments.
    Registers {
        /// Number of argument registers, starting at register 0
        count: usize,
    },
}

impl Default for ParameterPassing {
    fn default() -> Self {
        ParameterPassing::Stack
    }
}

/// Signature of a runtime helper that raises an exception.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrowHelperKind {
    /// Throws a new exception.
    Throw {
        /// Parameter holding the address of the thrown value
        exception_parameter: usize,
        /// Parameter naming the thrown type
        type_parameter: usize,
    },
    /// Rethrows the exception currently being handled.
    Rethrow,
}

/// A runtime helper recognised by the throw idiom folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowHelper {
    /// Symbol name of the helper
    pub name: String,
    /// How its parameters map onto the thrown exception
    pub kind: ThrowHelperKind,
}

impl ThrowHelper {
    /// Borland C++ `throw` helper: `(rtti, &exception, ...)`.
    #[must_use]
    pub fn borland_throw() -> Self {
        ThrowHelper {
            name: "@_ThrowExceptionLDTC$qpvt1t1t1uiuiuipuct1".to_string(),
            kind: ThrowHelperKind::Throw {
                exception_parameter: 1,
                type_parameter: 0,
            },
        }
    }

    /// Borland C++ `throw;` helper.
    #[must_use]
    pub fn borland_rethrow() -> Self {
        ThrowHelper {
            name: "@_ReThrowException$quipuc".to_string(),
            kind: ThrowHelperKind::Rethrow,
        }
    }

    /// Microsoft C++ `_CxxThrowException(&exception, throw_info)`.
    #[must_use]
    pub fn msvc_throw() -> Self {
        ThrowHelper {
            name: "_CxxThrowException".to_string(),
            kind: ThrowHelperKind::Throw {
                exception_parameter: 0,
                type_parameter: 1,
            },
        }
    }
}

/// Configuration for the analysis pipeline.
///
/// Controls parameter passing, which rewrites run, and how the result is
/// rendered.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Word size used for rendering numeric literals (default: 32 bit).
    pub address_width: AddressWidth,

    /// How call arguments are passed (default: on the stack).
    pub parameter_passing: ParameterPassing,

    /// Drop register definitions nobody reads.
    pub enable_dead_definition_elimination: bool,

    /// Fold single-use assignments into their reader.
    pub enable_copy_propagation: bool,

    /// Attach pushed values to calls as parameters.
    pub enable_parameter_collection: bool,

    /// Turn push/pop pairs into assignments (default: off).
    pub fold_push_pop: bool,

    /// Run the idiom folding pass after the dataflow pass.
    pub enable_idiom_folding: bool,

    /// Runtime helpers recognised as exception throws.
    pub throw_helpers: Vec<ThrowHelper>,

    /// Prune placeholder instructions left behind by the rewrites.
    pub enable_cleanup: bool,

    /// Output style of the code generator (default: pseudocode).
    pub code_style: CodeStyle,

    /// Maximum length of an emitted line segment (default: 80).
    pub line_width: usize,

    /// Dump the IR through `log::debug!` after every stage.
    pub trace_stages: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            address_width: AddressWidth::Bits32,
            parameter_passing: ParameterPassing::Stack,
            enable_dead_definition_elimination: true,
            enable_copy_propagation: true,
            enable_parameter_collection: true,
            fold_push_pop: false,
            enable_idiom_folding: true,
            throw_helpers: vec![
                ThrowHelper::borland_throw(),
                ThrowHelper::borland_rethrow(),
                ThrowHelper::msvc_throw(),
            ],
            enable_cleanup: true,
            code_style: CodeStyle::Pseudocode,
            line_width: 80,
            trace_stages: false,
        }
    }
}

impl AnalysisConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that analyses but never rewrites the IR.
    #[must_use]
    pub fn analysis_only() -> Self {
        Self {
            enable_dead_definition_elimination: false,
            enable_copy_propagation: false,
            enable_parameter_collection: false,
            fold_push_pop: false,
            enable_idiom_folding: false,
            enable_cleanup: false,
            ..Self::default()
        }
    }

    /// Creates a configuration for register-argument targets such as ARM.
    #[must_use]
    pub fn register_arguments(count: usize) -> Self {
        Self {
            parameter_passing: ParameterPassing::Registers { count },
            ..Self::default()
        }
    }

    /// Returns true if the dataflow pass has anything to do.
    #[must_use]
    pub fn any_rewrite_enabled(&self) -> bool {
        self.enable_dead_definition_elimination
            || self.enable_copy_propagation
            || self.enable_parameter_collection
            || self.fold_push_pop
    }

    /// Checks the configuration for inconsistent values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero line width or more
    /// argument registers than a register set can hold.
    pub fn validate(&self) -> Result<()> {
        if self.line_width == 0 {
            return Err(Error::InvalidConfig("line_width must be positive".into()));
        }
        if let ParameterPassing::Registers { count } = self.parameter_passing {
            if count > REGISTER_LIMIT {
                return Err(Error::InvalidConfig(format!(
                    "{count} argument registers exceed the register limit of {REGISTER_LIMIT}"
                )));
            }
        }
        Ok(())
    }
}
