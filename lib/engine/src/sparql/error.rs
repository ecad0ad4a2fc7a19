use ldf_common::ExecutionError;
use ldf_model::query::{QueryParseError, SparqlSyntaxError};
use ldf_model::IriParseError;
use std::io;

/// An error that prevents a query from being executed at all.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryError {
    /// The query text is not valid SPARQL.
    #[error(transparent)]
    Syntax(#[from] SparqlSyntaxError),
    #[error("Invalid prefix IRI: {0}")]
    InvalidPrefix(#[from] IriParseError),
    /// The query is valid SPARQL but uses a feature that cannot be evaluated.
    #[error("The query is not supported: {0}")]
    Unsupported(String),
    #[error("Invalid regular expression: {0}")]
    InvalidRegex(String),
}

impl From<QueryParseError> for QueryError {
    fn from(error: QueryParseError) -> Self {
        match error {
            QueryParseError::Syntax(error) => Self::Syntax(error),
            QueryParseError::InvalidPrefix(error) => Self::InvalidPrefix(error),
            QueryParseError::Unsupported(feature) => Self::Unsupported(feature),
            error => Self::Unsupported(error.to_string()),
        }
    }
}

/// A SPARQL evaluation error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryEvaluationError {
    #[error(transparent)]
    Query(#[from] QueryError),
    /// An error item of the pipeline.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// An error returned during results serialization.
    #[error(transparent)]
    ResultsSerialization(io::Error),
    /// The results are not a RDF graph
    #[error("The query results are not a RDF graph")]
    NotAGraph,
}
