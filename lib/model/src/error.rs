use oxrdf::{Term, Variable};
use thiserror::Error;

/// Indicates that a triple cannot be reconciled with a set of [Bindings](crate::Bindings).
///
/// These errors are expected while joining. Callers drop the offending triple and continue.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BindingConflictError {
    /// The variable is already bound to a different term.
    #[error("Cannot bind {variable} to {value} because it was already bound to {bound}.")]
    Conflict {
        variable: Variable,
        value: Term,
        bound: Term,
    },
    /// A constant of the pattern differs from the term at the same position of the triple.
    #[error("Cannot bind {expected} to {actual}")]
    Mismatch { expected: Term, actual: Term },
}
