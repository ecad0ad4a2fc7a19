use crate::sparql::QueryEvaluationError;
use futures::{Stream, StreamExt};
use ldf_common::iterator::SendableAsyncIterator;
use ldf_model::Triple;
use std::pin::Pin;
use std::task::{Context, Poll};

/// A stream over the triples that compose a graph solution.
pub struct QueryTripleStream {
    inner: SendableAsyncIterator<Triple>,
}

impl QueryTripleStream {
    pub fn new(inner: SendableAsyncIterator<Triple>) -> Self {
        Self { inner }
    }
}

impl Stream for QueryTripleStream {
    type Item = Result<Triple, QueryEvaluationError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner
            .poll_next_unpin(cx)
            .map(|item| item.map(|triple| triple.map_err(QueryEvaluationError::from)))
    }
}
