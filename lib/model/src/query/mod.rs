//! The query representation that is executed by the engine.
//!
//! Queries are parsed with [spargebra] and then converted into a flat structure of [Group]s. Only
//! the subset of SPARQL that can be evaluated over triple pattern fragments is accepted, everything
//! else is rejected with [QueryParseError::Unsupported].

mod algebra;

use crate::{PatternTerm, TriplePattern};
use oxrdf::{BlankNode, IriParseError, Term, Variable};
pub use spargebra::algebra::{Expression, Function};
pub use spargebra::SparqlSyntaxError;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// A query ready to be compiled into an iterator pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub form: QueryForm,
    /// The groups of the `WHERE` clause. They are evaluated one after the other.
    pub groups: Vec<Group>,
    pub order: Vec<OrderCondition>,
    pub distinct: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Query {
    /// Parses `query` with the given prefix mappings.
    ///
    /// Syntax errors and valid queries that use unsupported features result in different errors.
    pub fn parse(
        query: &str,
        prefixes: &BTreeMap<String, String>,
    ) -> Result<Self, QueryParseError> {
        let mut parser = spargebra::SparqlParser::new();
        for (prefix, iri) in prefixes {
            parser = parser.with_prefix(prefix.as_str(), iri.as_str())?;
        }
        let query = parser.parse_query(query)?;
        Self::try_from(&query)
    }

    /// Returns the kind of this query.
    pub fn query_type(&self) -> QueryType {
        match &self.form {
            QueryForm::Select { .. } => QueryType::Select,
            QueryForm::Construct { .. } => QueryType::Construct,
            QueryForm::Describe { .. } => QueryType::Describe,
            QueryForm::Ask => QueryType::Ask,
        }
    }
}

impl TryFrom<&spargebra::Query> for Query {
    type Error = QueryParseError;

    fn try_from(query: &spargebra::Query) -> Result<Self, Self::Error> {
        algebra::convert_query(query)
    }
}

/// The query form together with what it produces.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryForm {
    Select { variables: Vec<Variable> },
    Construct { template: Vec<TemplatePattern> },
    Describe { resources: Vec<PatternTerm> },
    Ask,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryType {
    Select,
    Construct,
    Describe,
    Ask,
}

impl Display for QueryType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            QueryType::Select => "SELECT",
            QueryType::Construct => "CONSTRUCT",
            QueryType::Describe => "DESCRIBE",
            QueryType::Ask => "ASK",
        })
    }
}

/// A part of a `WHERE` clause.
#[derive(Clone, Debug, PartialEq)]
pub enum Group {
    /// A basic graph pattern: a conjunction of triple patterns.
    Bgp(Vec<TriplePattern>),
    /// A nested group that is evaluated in sequence.
    Group(Vec<Group>),
    /// Groups whose solutions extend the incoming bindings if there are any.
    Optional(Vec<Group>),
    /// Alternatives. Each branch is evaluated with the same incoming bindings.
    Union(Vec<Group>),
    /// Keeps only the bindings for which the expression is true.
    Filter(Expression),
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrderCondition {
    pub expression: Expression,
    pub descending: bool,
}

/// A position of a `CONSTRUCT` template triple.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TemplateTerm {
    Constant(Term),
    Variable(Variable),
    /// Replaced with a fresh blank node for every solution.
    BlankNode(BlankNode),
}

impl From<PatternTerm> for TemplateTerm {
    fn from(value: PatternTerm) -> Self {
        match value {
            PatternTerm::Constant(term) => TemplateTerm::Constant(term),
            PatternTerm::Variable(variable) => TemplateTerm::Variable(variable),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TemplatePattern {
    pub subject: TemplateTerm,
    pub predicate: TemplateTerm,
    pub object: TemplateTerm,
}

impl TemplatePattern {
    /// Returns true if the template contains neither variables nor blank nodes.
    pub fn is_ground(&self) -> bool {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .all(|term| matches!(term, TemplateTerm::Constant(_)))
    }
}

/// An error raised while turning query text into a [Query].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueryParseError {
    #[error(transparent)]
    Syntax(#[from] SparqlSyntaxError),
    #[error("Invalid prefix IRI: {0}")]
    InvalidPrefix(#[from] IriParseError),
    #[error("The query is not supported: {0}")]
    Unsupported(String),
}
