use crate::sparql::QueryEvaluationError;
use futures::StreamExt;
use ldf_model::{Term, VariableRef};
use oxrdfio::{RdfFormat, RdfSerializer};
use sparesults::{QueryResultsFormat, QueryResultsSerializer};
use std::io::Write;

mod query_solution;
mod triples;

pub use query_solution::{QuerySolution, QuerySolutionStream};
pub use triples::QueryTripleStream;

/// Results of a [SPARQL query](https://www.w3.org/TR/sparql11-query/).
pub enum QueryResults {
    /// Results of a [SELECT](https://www.w3.org/TR/sparql11-query/#select) query.
    Solutions(QuerySolutionStream),
    /// Result of a [ASK](https://www.w3.org/TR/sparql11-query/#ask) query.
    Boolean(bool),
    /// Results of a [CONSTRUCT](https://www.w3.org/TR/sparql11-query/#construct) or
    /// [DESCRIBE](https://www.w3.org/TR/sparql11-query/#describe) query.
    Graph(QueryTripleStream),
}

impl QueryResults {
    /// Writes the query results (solutions or boolean).
    ///
    /// Graph results are written as solutions over `?subject`, `?predicate` and `?object`.
    pub async fn write<W: Write>(
        self,
        writer: W,
        format: QueryResultsFormat,
    ) -> Result<W, QueryEvaluationError> {
        let serializer = QueryResultsSerializer::from_format(format);
        match self {
            Self::Boolean(value) => serializer.serialize_boolean_to_writer(writer, value),
            Self::Solutions(mut solutions) => {
                let mut serializer = serializer
                    .serialize_solutions_to_writer(writer, solutions.variables().to_vec())
                    .map_err(QueryEvaluationError::ResultsSerialization)?;
                while let Some(solution) = solutions.next().await {
                    serializer
                        .serialize(&solution?)
                        .map_err(QueryEvaluationError::ResultsSerialization)?;
                }
                serializer.finish()
            }
            Self::Graph(mut triples) => {
                let s = VariableRef::new_unchecked("subject");
                let p = VariableRef::new_unchecked("predicate");
                let o = VariableRef::new_unchecked("object");
                let mut serializer = serializer
                    .serialize_solutions_to_writer(
                        writer,
                        vec![s.into_owned(), p.into_owned(), o.into_owned()],
                    )
                    .map_err(QueryEvaluationError::ResultsSerialization)?;

                while let Some(triple) = triples.next().await {
                    let triple = triple?;
                    let subject = Term::from(triple.subject);
                    let predicate = Term::from(triple.predicate);
                    serializer
                        .serialize([
                            (s, subject.as_ref()),
                            (p, predicate.as_ref()),
                            (o, triple.object.as_ref()),
                        ])
                        .map_err(QueryEvaluationError::ResultsSerialization)?;
                }

                serializer.finish()
            }
        }
        .map_err(QueryEvaluationError::ResultsSerialization)
    }

    /// Writes the graph query results.
    ///
    /// This method fails if it is called on the `Solution` or `Boolean` results.
    pub async fn write_graph<W: Write>(
        self,
        writer: W,
        format: impl Into<RdfFormat>,
    ) -> Result<W, QueryEvaluationError> {
        if let Self::Graph(mut triples) = self {
            let mut serializer = RdfSerializer::from_format(format.into()).for_writer(writer);

            while let Some(triple) = triples.next().await {
                serializer
                    .serialize_triple(&triple?)
                    .map_err(QueryEvaluationError::ResultsSerialization)?;
            }

            serializer
                .finish()
                .map_err(QueryEvaluationError::ResultsSerialization)
        } else {
            Err(QueryEvaluationError::NotAGraph)
        }
    }
}

impl From<QuerySolutionStream> for QueryResults {
    #[inline]
    fn from(value: QuerySolutionStream) -> Self {
        Self::Solutions(value)
    }
}
