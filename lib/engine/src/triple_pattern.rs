use crate::options::ExecutionOptions;
use futures::{ready, Stream, StreamExt};
use ldf_common::iterator::{MultiTransform, MultiTransformIterator, SendableAsyncIterator};
use ldf_common::ExecResult;
use ldf_fragments::{BoxFragment, FragmentsClient};
use ldf_model::{Bindings, TriplePattern};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::{trace, warn};

/// Extends every incoming solution with the matches of a triple pattern.
///
/// For each solution, the pattern is bound with the solution and the matching fragment is read.
/// Every triple of the fragment that is compatible with the solution yields an extended solution.
/// A fragment that fails makes the iterator fail. Sources that a federation may lose are handled
/// by its error budget before their errors get here.
pub struct TriplePatternIterator {
    inner: MultiTransformIterator<BindingsExtender>,
}

impl TriplePatternIterator {
    pub fn new(
        source: SendableAsyncIterator<Bindings>,
        pattern: TriplePattern,
        options: &ExecutionOptions,
    ) -> Self {
        let extender = BindingsExtender {
            pattern,
            client: Arc::clone(&options.fragments_client),
            optional: options.optional,
        };
        Self {
            inner: MultiTransformIterator::with_max_transformers(
                source,
                extender,
                options.max_buffer_size,
            ),
        }
    }
}

impl Stream for TriplePatternIterator {
    type Item = ExecResult<Bindings>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

struct BindingsExtender {
    pattern: TriplePattern,
    client: Arc<dyn FragmentsClient>,
    optional: bool,
}

impl MultiTransform for BindingsExtender {
    type Input = Bindings;
    type Output = Bindings;

    fn create_transformer(&mut self, bindings: &Bindings) -> SendableAsyncIterator<Bindings> {
        let fragment = self
            .client
            .fragment_by_pattern(&self.pattern.bind(bindings));
        Box::pin(FragmentBindings {
            fragment,
            pattern: self.pattern.clone(),
            bindings: bindings.clone(),
            ended: false,
        })
    }

    fn on_empty(&mut self, bindings: Bindings) -> Option<Bindings> {
        self.optional.then_some(bindings)
    }
}

/// The extensions of one solution with the triples of a fragment.
struct FragmentBindings {
    fragment: BoxFragment,
    pattern: TriplePattern,
    bindings: Bindings,
    ended: bool,
}

impl Stream for FragmentBindings {
    type Item = ExecResult<Bindings>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        while !this.ended {
            match ready!(this.fragment.poll_next_unpin(cx)) {
                Some(Ok(triple)) => match this.bindings.extend(&this.pattern, &triple) {
                    Ok(extended) => return Poll::Ready(Some(Ok(extended))),
                    Err(error) => trace!(%error, "Skipping incompatible triple"),
                },
                Some(Err(error)) => {
                    warn!(pattern = %this.pattern, %error, "Could not read fragment");
                    this.fragment.close();
                    this.ended = true;
                    return Poll::Ready(Some(Err(error)));
                }
                None => this.ended = true,
            }
        }
        Poll::Ready(None)
    }
}
