use crate::sparql::QueryEvaluationError;
use futures::{Stream, StreamExt};
use ldf_common::iterator::SendableAsyncIterator;
use ldf_model::{Bindings, Variable};
pub use sparesults::QuerySolution;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

/// A stream over [`QuerySolution`]s.
pub struct QuerySolutionStream {
    /// The variables used in the query solutions.
    variables: Arc<[Variable]>,
    inner: SendableAsyncIterator<Bindings>,
}

impl QuerySolutionStream {
    /// Creates a stream of solutions over the given variables from a pipeline of bindings.
    ///
    /// Variables that a binding leaves unbound are unbound in the solution.
    pub fn new(variables: Arc<[Variable]>, inner: SendableAsyncIterator<Bindings>) -> Self {
        Self { variables, inner }
    }

    /// The variables used in the solutions.
    #[inline]
    pub fn variables(&self) -> &[Variable] {
        self.variables.as_ref()
    }
}

impl Stream for QuerySolutionStream {
    type Item = Result<QuerySolution, QueryEvaluationError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let bindings = match ready!(self.inner.poll_next_unpin(cx)) {
            None => return Poll::Ready(None),
            Some(Err(error)) => return Poll::Ready(Some(Err(error.into()))),
            Some(Ok(bindings)) => bindings,
        };
        let values: Vec<_> = self
            .variables
            .iter()
            .map(|variable| bindings.get(variable).cloned())
            .collect();
        Poll::Ready(Some(Ok(QuerySolution::from((
            Arc::clone(&self.variables),
            values,
        )))))
    }
}
