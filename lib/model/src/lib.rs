mod bindings;
mod error;
mod pattern;
pub mod query;
mod skolem;
pub mod vocab;

pub use bindings::Bindings;
pub use error::*;
pub use pattern::{find_connected_patterns, PatternTerm, TriplePattern};
pub use skolem::{deskolemize, deskolemize_term};

// Re-export some oxrdf types.
pub use oxrdf::{
    BlankNode, BlankNodeRef, GraphName, IriParseError, Literal, LiteralRef, NamedNode, NamedNodeRef,
    Quad, Subject, SubjectRef, Term, TermRef, Triple, TripleRef, Variable, VariableNameParseError,
    VariableRef,
};
