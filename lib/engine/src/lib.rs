//! Streaming evaluation of SPARQL queries over triple pattern fragments.
//!
//! A query is compiled into a pipeline of [SendableAsyncIterator](ldf_common::iterator::SendableAsyncIterator)s.
//! Basic graph patterns are evaluated by a [ReorderingGraphPatternIterator] that decides the join
//! order per incoming solution, based on the number of matches that the fragments report.

mod options;
mod planner;
pub mod results;
pub mod sparql;
mod triple_pattern;

pub use options::{ExecutionOptions, JoinOrder};
pub use planner::{GraphPatternIterator, ReorderingGraphPatternIterator};
pub use triple_pattern::TriplePatternIterator;
