use crate::iterator::{IteratorState, SendableAsyncIterator, DEFAULT_MAX_BUFFER_SIZE};
use crate::ExecResult;
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Creates an independent sub-iterator for every item of a source.
pub trait MultiTransform: Send {
    type Input: Send;
    type Output: Send;

    /// Creates the transformer for a single source item.
    fn create_transformer(&mut self, item: &Self::Input) -> SendableAsyncIterator<Self::Output>;

    /// Called with the source item of a transformer that ended without producing anything. A
    /// returned item is emitted in place of the transformer's output.
    fn on_empty(&mut self, _item: Self::Input) -> Option<Self::Output> {
        None
    }
}

/// An open transformer together with the source item it was created for.
struct Transformer<I, O> {
    item: Option<I>,
    iterator: SendableAsyncIterator<O>,
    produced: bool,
}

/// An iterator that runs a transformer per source item and interleaves their outputs.
///
/// Up to `max_transformers` transformers are open at the same time. They are read round-robin. When
/// a transformer ends, the next item is pulled from the source. An error of the source or of any
/// transformer ends the whole iterator.
pub struct MultiTransformIterator<M: MultiTransform> {
    source: Option<SendableAsyncIterator<M::Input>>,
    factory: M,
    transformers: VecDeque<Transformer<M::Input, M::Output>>,
    max_transformers: usize,
    cursor: usize,
    state: IteratorState,
}

impl<M: MultiTransform> MultiTransformIterator<M> {
    pub fn new(source: SendableAsyncIterator<M::Input>, factory: M) -> Self {
        Self::with_max_transformers(source, factory, DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_max_transformers(
        source: SendableAsyncIterator<M::Input>,
        factory: M,
        max_transformers: usize,
    ) -> Self {
        Self {
            source: Some(source),
            factory,
            transformers: VecDeque::new(),
            max_transformers: max_transformers.max(1),
            cursor: 0,
            state: IteratorState::Init,
        }
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Returns the number of transformers that are currently open.
    pub fn open_transformers(&self) -> usize {
        self.transformers.len()
    }

    /// Drops the source and all open transformers.
    ///
    /// Nothing is buffered by this iterator, so it ends right away. Closing is idempotent.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.source = None;
        self.transformers.clear();
        self.state.advance(IteratorState::Ended);
    }

    fn fail(&mut self) {
        self.source = None;
        self.transformers.clear();
        self.state.advance(IteratorState::Errored);
    }

    /// Opens transformers for new source items until the limit is reached or the source waits.
    fn open_transformers_from_source(&mut self, cx: &mut Context<'_>) -> ExecResult<()> {
        while self.transformers.len() < self.max_transformers {
            let Some(source) = self.source.as_mut() else {
                return Ok(());
            };
            match source.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(item))) => {
                    let iterator = self.factory.create_transformer(&item);
                    self.transformers.push_back(Transformer {
                        item: Some(item),
                        iterator,
                        produced: false,
                    });
                }
                Poll::Ready(Some(Err(error))) => return Err(error),
                Poll::Ready(None) => {
                    self.source = None;
                    self.state.advance(IteratorState::Closing);
                }
                Poll::Pending => return Ok(()),
            }
        }
        Ok(())
    }
}

impl<M: MultiTransform> Stream for MultiTransformIterator<M> {
    type Item = ExecResult<M::Output>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.state.is_terminal() {
            return Poll::Ready(None);
        }
        this.state.advance(IteratorState::Open);

        'poll: loop {
            if let Err(error) = this.open_transformers_from_source(cx) {
                this.fail();
                return Poll::Ready(Some(Err(error)));
            }
            if this.transformers.is_empty() {
                if this.source.is_none() {
                    this.state.advance(IteratorState::Ended);
                    return Poll::Ready(None);
                }
                return Poll::Pending;
            }

            let open = this.transformers.len();
            for _ in 0..open {
                let index = this.cursor % this.transformers.len();
                this.cursor = index + 1;
                let transformer = &mut this.transformers[index];
                match transformer.iterator.poll_next_unpin(cx) {
                    Poll::Ready(Some(Ok(item))) => {
                        transformer.produced = true;
                        return Poll::Ready(Some(Ok(item)));
                    }
                    Poll::Ready(Some(Err(error))) => {
                        this.fail();
                        return Poll::Ready(Some(Err(error)));
                    }
                    Poll::Ready(None) => {
                        let ended = this.transformers.remove(index);
                        this.cursor = index;
                        if let Some(Transformer {
                            item: Some(item),
                            produced: false,
                            ..
                        }) = ended
                        {
                            if let Some(output) = this.factory.on_empty(item) {
                                return Poll::Ready(Some(Ok(output)));
                            }
                        }
                        continue 'poll;
                    }
                    Poll::Pending => {}
                }
            }
            return Poll::Pending;
        }
    }
}

impl<M: MultiTransform> Unpin for MultiTransformIterator<M> {}
