//! Control flow edge types for the CFG.

use strum::Display;

/// The kind of control flow represented by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CfgEdgeKind {
    /// Fall-through into the next node, or the target of an unconditional jump.
    Unconditional,

    /// Taken when the branch condition holds.
    ConditionalTrue,

    /// Fall-through after a conditional branch.
    ConditionalFalse,
}

impl CfgEdgeKind {
    /// Returns `true` if this is a conditional branch edge.
    ///
    /// ```rust
    /// use decoflow::analysis::CfgEdgeKind;
    ///
    /// assert!(CfgEdgeKind::ConditionalTrue.is_conditional());
    /// assert!(!CfgEdgeKind::Unconditional.is_conditional());
    /// ```
    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self, Self::ConditionalTrue | Self::ConditionalFalse)
    }
}
