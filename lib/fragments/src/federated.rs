use crate::client::FragmentsClient;
use crate::fragment::{BoxFragment, Fragment, FragmentMetadata};
use futures::{Stream, StreamExt};
use ldf_common::{ExecResult, ExecutionError};
use ldf_model::{Triple, TriplePattern};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// Remembers the patterns that have no matches at an endpoint.
///
/// A pattern is skipped if it is one of the remembered patterns with zero or more of its
/// variables bound. Clones share the same patterns.
#[derive(Clone, Debug, Default)]
pub struct EmptyPatternCache {
    patterns: Arc<Mutex<Vec<TriplePattern>>>,
}

impl EmptyPatternCache {
    /// Returns true if `pattern` is known to have no matches.
    pub fn is_empty_pattern(&self, pattern: &TriplePattern) -> bool {
        self.patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|empty| pattern.is_bound_pattern_of(empty))
    }

    pub fn insert(&self, pattern: TriplePattern) {
        let mut patterns = self.patterns.lock().unwrap_or_else(PoisonError::into_inner);
        if !patterns.iter().any(|empty| pattern.is_bound_pattern_of(empty)) {
            patterns.push(pattern);
        }
    }

    pub fn len(&self) -> usize {
        self.patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
struct FederatedSource {
    client: Arc<dyn FragmentsClient>,
    empty_patterns: EmptyPatternCache,
}

/// A [FragmentsClient] that asks several clients for every pattern.
///
/// The fragments of all sources are combined into a [CompoundFragment]. Sources that reported no
/// matches for a pattern are not asked again for that pattern or any bound version of it.
#[derive(Debug)]
pub struct FederatedFragmentsClient {
    sources: Vec<FederatedSource>,
    error_threshold: usize,
}

impl FederatedFragmentsClient {
    /// Creates a federation that tolerates all but one failing source per pattern.
    pub fn new(clients: Vec<Arc<dyn FragmentsClient>>) -> Self {
        let error_threshold = clients.len().saturating_sub(1);
        Self::with_error_threshold(clients, error_threshold)
    }

    /// Creates a federation that tolerates `error_threshold` failing sources per pattern.
    pub fn with_error_threshold(
        clients: Vec<Arc<dyn FragmentsClient>>,
        error_threshold: usize,
    ) -> Self {
        Self {
            sources: clients
                .into_iter()
                .map(|client| FederatedSource {
                    client,
                    empty_patterns: EmptyPatternCache::default(),
                })
                .collect(),
            error_threshold,
        }
    }

    pub fn error_threshold(&self) -> usize {
        self.error_threshold
    }

    /// Returns the cache of empty patterns of the source at `index`.
    pub fn empty_patterns(&self, index: usize) -> Option<&EmptyPatternCache> {
        self.sources.get(index).map(|source| &source.empty_patterns)
    }
}

impl FragmentsClient for FederatedFragmentsClient {
    fn fragment_by_pattern(&self, pattern: &TriplePattern) -> BoxFragment {
        let children = self
            .sources
            .iter()
            .enumerate()
            .filter_map(|(index, source)| {
                if source.empty_patterns.is_empty_pattern(pattern) {
                    debug!(%pattern, source = index, "Skipping source without matches");
                    return None;
                }
                Some((
                    source.client.fragment_by_pattern(pattern),
                    Some(source.empty_patterns.clone()),
                ))
            })
            .collect();
        Box::new(CompoundFragment::with_children(
            pattern.clone(),
            children,
            self.error_threshold,
        ))
    }

    fn abort_all(&self) {
        for source in &self.sources {
            source.client.abort_all();
        }
    }
}

#[derive(Debug)]
enum ChildMetadata {
    Pending,
    Known(Option<u64>),
    Failed,
}

struct Child {
    fragment: Option<BoxFragment>,
    metadata: ChildMetadata,
    ended: bool,
    empty_patterns: Option<EmptyPatternCache>,
}

impl Child {
    fn release(&mut self) {
        if let Some(mut fragment) = self.fragment.take() {
            fragment.close();
        }
        self.ended = true;
        if matches!(self.metadata, ChildMetadata::Pending) {
            self.metadata = ChildMetadata::Failed;
        }
    }
}

/// The union of the fragments of one pattern at several sources.
///
/// Triples are read round-robin from all children. The metadata is known once every child reported
/// its metadata or failed, and its total is the sum of the known totals.
///
/// A failing child is treated as an empty fragment as long as the error budget allows it. The
/// failure that exceeds the budget makes the whole fragment fail.
pub struct CompoundFragment {
    pattern: TriplePattern,
    children: Vec<Child>,
    cursor: usize,
    error_budget: usize,
    metadata: Option<FragmentMetadata>,
    failed: bool,
    pending_error: Option<ExecutionError>,
}

impl CompoundFragment {
    pub fn new(pattern: TriplePattern, children: Vec<BoxFragment>, error_threshold: usize) -> Self {
        let children = children.into_iter().map(|child| (child, None)).collect();
        Self::with_children(pattern, children, error_threshold)
    }

    fn with_children(
        pattern: TriplePattern,
        children: Vec<(BoxFragment, Option<EmptyPatternCache>)>,
        error_threshold: usize,
    ) -> Self {
        Self {
            pattern,
            children: children
                .into_iter()
                .map(|(fragment, empty_patterns)| Child {
                    fragment: Some(fragment),
                    metadata: ChildMetadata::Pending,
                    ended: false,
                    empty_patterns,
                })
                .collect(),
            cursor: 0,
            error_budget: error_threshold,
            metadata: None,
            failed: false,
            pending_error: None,
        }
    }

    /// Releases a failed child and spends the error budget on it.
    fn child_failed(&mut self, index: usize, error: ExecutionError) {
        self.children[index].release();
        if self.error_budget > 0 {
            self.error_budget -= 1;
            warn!(pattern = %self.pattern, child = index, %error, "Ignoring failed source");
            return;
        }

        warn!(pattern = %self.pattern, child = index, %error, "Too many sources failed");
        for child in &mut self.children {
            child.release();
        }
        self.failed = true;
        self.pending_error = Some(ExecutionError::Federation {
            pattern: self.pattern.to_string(),
            cause: Box::new(error),
        });
    }

    fn poll_children_metadata(&mut self, cx: &mut Context<'_>) {
        for index in 0..self.children.len() {
            let child = &mut self.children[index];
            if !matches!(child.metadata, ChildMetadata::Pending) {
                continue;
            }
            let Some(fragment) = child.fragment.as_mut() else {
                continue;
            };
            match fragment.poll_metadata(cx) {
                Poll::Ready(Ok(metadata)) if !metadata.had_error => {
                    if metadata.total_triples == Some(0) {
                        if let Some(empty_patterns) = &child.empty_patterns {
                            empty_patterns.insert(self.pattern.clone());
                        }
                    }
                    child.metadata = ChildMetadata::Known(metadata.total_triples);
                    if child.ended {
                        child.fragment = None;
                    }
                }
                Poll::Ready(Ok(_)) => self.child_failed(
                    index,
                    ExecutionError::internal("The source reported an incomplete fragment"),
                ),
                Poll::Ready(Err(error)) => self.child_failed(index, error),
                Poll::Pending => {}
            }
            if self.failed {
                return;
            }
        }
    }
}

impl Stream for CompoundFragment {
    type Item = ExecResult<Triple>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if let Some(error) = this.pending_error.take() {
            return Poll::Ready(Some(Err(error)));
        }
        if this.failed {
            return Poll::Ready(None);
        }
        // Children report their metadata while being read so empty sources are remembered.
        this.poll_children_metadata(cx);
        if let Some(error) = this.pending_error.take() {
            return Poll::Ready(Some(Err(error)));
        }

        let count = this.children.len();
        for _ in 0..count {
            let index = this.cursor % count;
            this.cursor = index + 1;
            let child = &mut this.children[index];
            if child.ended {
                continue;
            }
            let Some(fragment) = child.fragment.as_mut() else {
                continue;
            };
            match fragment.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(triple))) => return Poll::Ready(Some(Ok(triple))),
                Poll::Ready(Some(Err(error))) => {
                    this.child_failed(index, error);
                    if let Some(error) = this.pending_error.take() {
                        return Poll::Ready(Some(Err(error)));
                    }
                }
                Poll::Ready(None) => {
                    child.ended = true;
                    if !matches!(child.metadata, ChildMetadata::Pending) {
                        child.fragment = None;
                    }
                }
                Poll::Pending => {}
            }
        }

        if this.children.iter().all(|child| child.ended) {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}

impl Fragment for CompoundFragment {
    fn pattern(&self) -> &TriplePattern {
        &self.pattern
    }

    fn poll_metadata(&mut self, cx: &mut Context<'_>) -> Poll<ExecResult<FragmentMetadata>> {
        if let Some(metadata) = &self.metadata {
            return Poll::Ready(Ok(metadata.clone()));
        }
        if !self.failed {
            self.poll_children_metadata(cx);
        }
        if self
            .children
            .iter()
            .any(|child| matches!(child.metadata, ChildMetadata::Pending))
        {
            return Poll::Pending;
        }

        let total_triples = self
            .children
            .iter()
            .filter_map(|child| match child.metadata {
                ChildMetadata::Known(total) => total,
                ChildMetadata::Pending | ChildMetadata::Failed => None,
            })
            .sum();
        let metadata = FragmentMetadata {
            total_triples: Some(total_triples),
            had_error: self.failed,
            ..FragmentMetadata::default()
        };
        debug!(pattern = %self.pattern, total_triples, had_error = self.failed, "Combined metadata");
        self.metadata = Some(metadata.clone());
        Poll::Ready(Ok(metadata))
    }

    fn close(&mut self) {
        for child in &mut self.children {
            child.release();
        }
        self.pending_error = None;
    }
}
