use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Very little in the analysis core is fatal: malformed operands, unresolved successors and
/// broken def-use links are logged and skipped rather than returned. The variants below cover
/// the remaining cases, configuration problems and structural errors while building graphs.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - Lifted input that violates a structural invariant
/// - [`Error::Empty`] - Empty input where content was required
/// - [`Error::NotSupported`] - A feature that is not handled
///
/// ## Analysis Errors
/// - [`Error::GraphError`] - Control flow graph construction error
/// - [`Error::InvalidConfig`] - Rejected [`crate::AnalysisConfig`]
///
/// # Examples
///
/// ```rust
/// use decoflow::{AnalysisConfig, Error};
///
/// let config = AnalysisConfig {
///     line_width: 0,
///     ..AnalysisConfig::default()
/// };
///
/// match config.validate() {
///     Err(Error::InvalidConfig(reason)) => eprintln!("bad config: {reason}"),
///     Err(e) => eprintln!("other error: {e}"),
///     Ok(()) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The lifted input is damaged and could not be processed.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// This feature is not supported.
    #[error("This feature is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// The analysis configuration was rejected by validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error during graph construction or traversal.
    ///
    /// Raised when an edge references a node that does not exist.
    #[error("{0}")]
    GraphError(String),

    /// Writing rendered output failed.
    #[error("{0}")]
    Format(#[from] std::fmt::Error),
}
