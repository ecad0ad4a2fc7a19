use crate::client::FragmentsClient;
use crate::fragment::{BoxFragment, Fragment, FragmentMetadata};
use futures::Stream;
use ldf_common::{ExecResult, ExecutionError};
use ldf_model::{Bindings, Triple, TriplePattern};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

/// A [FragmentsClient] that answers from triples in memory.
///
/// Every requested pattern is recorded. A client can be configured to fail all of its fragments
/// or to withhold the number of matches.
#[derive(Clone, Debug, Default)]
pub struct MemoryFragmentsClient {
    triples: Arc<Vec<Triple>>,
    failure: Option<ExecutionError>,
    unknown_totals: bool,
    requests: Arc<Mutex<Vec<TriplePattern>>>,
}

impl MemoryFragmentsClient {
    pub fn new(triples: impl IntoIterator<Item = Triple>) -> Self {
        Self {
            triples: Arc::new(triples.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Lets every fragment fail with `error`, both its metadata and its triples.
    #[must_use]
    pub fn failing(mut self, error: ExecutionError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Reports metadata without a total number of triples.
    #[must_use]
    pub fn with_unknown_totals(mut self) -> Self {
        self.unknown_totals = true;
        self
    }

    /// Returns the patterns of all fragments created so far.
    pub fn requests(&self) -> Vec<TriplePattern> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl FragmentsClient for MemoryFragmentsClient {
    fn fragment_by_pattern(&self, pattern: &TriplePattern) -> BoxFragment {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pattern.clone());

        if let Some(error) = &self.failure {
            return Box::new(MemoryFragment::failed(pattern.clone(), error.clone()));
        }
        let triples: Vec<_> = self
            .triples
            .iter()
            .filter(|triple| Bindings::new().extend(pattern, triple).is_ok())
            .cloned()
            .collect();
        let total_triples = (!self.unknown_totals).then_some(triples.len() as u64);
        Box::new(MemoryFragment::new(pattern.clone(), triples, total_triples))
    }
}

/// A fragment over triples that are already in memory.
#[derive(Debug)]
pub struct MemoryFragment {
    pattern: TriplePattern,
    triples: std::vec::IntoIter<Triple>,
    metadata: ExecResult<FragmentMetadata>,
    pending_error: Option<ExecutionError>,
}

impl MemoryFragment {
    pub fn new(pattern: TriplePattern, triples: Vec<Triple>, total_triples: Option<u64>) -> Self {
        Self {
            pattern,
            triples: triples.into_iter(),
            metadata: Ok(FragmentMetadata {
                total_triples,
                ..FragmentMetadata::default()
            }),
            pending_error: None,
        }
    }

    /// Creates a fragment whose metadata and triples fail with `error`.
    pub fn failed(pattern: TriplePattern, error: ExecutionError) -> Self {
        Self {
            pattern,
            triples: Vec::new().into_iter(),
            metadata: Err(error.clone()),
            pending_error: Some(error),
        }
    }
}

impl Stream for MemoryFragment {
    type Item = ExecResult<Triple>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(error) = self.pending_error.take() {
            return Poll::Ready(Some(Err(error)));
        }
        Poll::Ready(self.triples.next().map(Ok))
    }
}

impl Fragment for MemoryFragment {
    fn pattern(&self) -> &TriplePattern {
        &self.pattern
    }

    fn poll_metadata(&mut self, _cx: &mut Context<'_>) -> Poll<ExecResult<FragmentMetadata>> {
        Poll::Ready(self.metadata.clone())
    }

    fn close(&mut self) {
        self.triples = Vec::new().into_iter();
        self.pending_error = None;
    }
}
