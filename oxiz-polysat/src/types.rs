//! Shared identifier types and the crate error.

use thiserror::Error;

/// Variable identifier, shared with the polynomial layer.
pub type PVar = oxiz_modpoly::Var;

/// Index of a registered constraint in the [`crate::Core`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(pub u32);

impl ConstraintId {
    /// The raw index.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque justification handle supplied by the enclosing solver when a
/// constraint is registered; returned untouched in explanations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dependency(pub u64);

/// Errors for API misuse. Algorithmic failure ("no pattern matched") is
/// never an error; it is reported through `Option`/`bool` returns.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolysatError {
    /// A variable was declared with bit width zero.
    #[error("bit width must be positive")]
    ZeroWidth,
    /// Two operands of different bit widths were combined.
    #[error("bit width mismatch: expected {expected}, got {got}")]
    WidthMismatch {
        /// Width required by the context.
        expected: u32,
        /// Width actually supplied.
        got: u32,
    },
    /// An operation referred to a variable that was never declared.
    #[error("unknown variable v{0}")]
    UnknownVar(PVar),
}
