use futures::future::poll_fn;
use futures::Stream;
use ldf_common::ExecResult;
use ldf_model::{Triple, TriplePattern};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Hypermedia controls of a fragment page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FragmentControls {
    /// The URL of the next page, if there is one.
    pub next_page: Option<String>,
    pub page_size: Option<u64>,
}

/// What a fragment knows about itself before its triples are read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FragmentMetadata {
    /// The estimated number of matching triples. `None` if the server did not tell.
    pub total_triples: Option<u64>,
    pub controls: FragmentControls,
    /// Set if a source of the fragment failed and the estimate may be incomplete.
    pub had_error: bool,
}

impl FragmentMetadata {
    pub fn with_total(total_triples: u64) -> Self {
        Self {
            total_triples: Some(total_triples),
            ..Self::default()
        }
    }
}

/// The triples matching one triple pattern.
///
/// A fragment is a stream of triples. Its [FragmentMetadata] is produced at most once and becomes
/// available through [Fragment::poll_metadata], usually before the first triple. If the fragment
/// fails before the metadata is known, the metadata resolves to that error.
pub trait Fragment: Stream<Item = ExecResult<Triple>> + Send + Unpin {
    /// The pattern that this fragment matches.
    fn pattern(&self) -> &TriplePattern;

    /// Polls the metadata. Once resolved, every call returns the same result.
    fn poll_metadata(&mut self, cx: &mut Context<'_>) -> Poll<ExecResult<FragmentMetadata>>;

    /// Stops reading and aborts pending requests. The stream ends afterward.
    fn close(&mut self);
}

pub type BoxFragment = Box<dyn Fragment>;

/// Waits for the metadata of `fragment`.
pub async fn fragment_metadata(fragment: &mut dyn Fragment) -> ExecResult<FragmentMetadata> {
    poll_fn(|cx| fragment.poll_metadata(cx)).await
}

/// A fragment without triples.
#[derive(Debug)]
pub struct EmptyFragment {
    pattern: TriplePattern,
}

impl EmptyFragment {
    pub fn new(pattern: TriplePattern) -> Self {
        Self { pattern }
    }
}

impl Stream for EmptyFragment {
    type Item = ExecResult<Triple>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(None)
    }
}

impl Fragment for EmptyFragment {
    fn pattern(&self) -> &TriplePattern {
        &self.pattern
    }

    fn poll_metadata(&mut self, _cx: &mut Context<'_>) -> Poll<ExecResult<FragmentMetadata>> {
        Poll::Ready(Ok(FragmentMetadata::with_total(0)))
    }

    fn close(&mut self) {}
}
