//! [SPARQL](https://www.w3.org/TR/sparql11-overview/) evaluation.

mod error;
mod eval;
mod expression;
mod groups;
mod modifiers;

pub use error::{QueryError, QueryEvaluationError};
pub use eval::evaluate_query;
pub use expression::{EvaluationError, ExpressionEvaluator};
pub use ldf_model::query::{Query, QueryForm, QueryParseError, QueryType};
pub use sparesults::QueryResultsFormat;
