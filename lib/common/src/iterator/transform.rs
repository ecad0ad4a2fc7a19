use crate::iterator::{IteratorState, SendableAsyncIterator};
use crate::ExecResult;
use futures::{ready, Stream, StreamExt};
use std::collections::VecDeque;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Tells a [TransformIterator] whether it should keep reading from its source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformFlow {
    Continue,
    /// Stop reading from the source. The transform is still flushed.
    Finish,
}

/// Maps every item of a source to zero or more output items.
pub trait Transform: Send {
    type Input: Send;
    type Output: Send;

    /// Transforms a single item and pushes the results to `output`.
    fn transform(
        &mut self,
        item: Self::Input,
        output: &mut VecDeque<Self::Output>,
    ) -> ExecResult<TransformFlow>;

    /// Called once after the last item of the source has been transformed.
    fn flush(&mut self, _output: &mut VecDeque<Self::Output>) -> ExecResult<()> {
        Ok(())
    }
}

/// An iterator that applies a [Transform] to each item of its source.
///
/// The output can be restricted to a window with [TransformIterator::with_range]. Once the window
/// is exhausted, the source is dropped and the iterator ends.
pub struct TransformIterator<X: Transform> {
    source: Option<SendableAsyncIterator<X::Input>>,
    transform: X,
    buffer: VecDeque<X::Output>,
    scratch: VecDeque<X::Output>,
    offset: usize,
    limit: Option<usize>,
    flushed: bool,
    state: IteratorState,
}

impl<X: Transform> TransformIterator<X> {
    pub fn new(source: SendableAsyncIterator<X::Input>, transform: X) -> Self {
        Self {
            source: Some(source),
            transform,
            buffer: VecDeque::new(),
            scratch: VecDeque::new(),
            offset: 0,
            limit: None,
            flushed: false,
            state: IteratorState::Init,
        }
    }

    /// Skips the first `offset` outputs and emits at most `limit` outputs after that.
    #[must_use]
    pub fn with_range(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = offset;
        self.limit = limit;
        if limit == Some(0) {
            self.source = None;
            self.flushed = true;
            self.state.advance(IteratorState::Ended);
        }
        self
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Stops reading from the source. Already transformed items are still delivered.
    ///
    /// The transform is not flushed after closing. Closing is idempotent.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.source = None;
        self.flushed = true;
        self.state.advance(IteratorState::Closing);
    }

    /// Moves the transformed items through the offset and limit window into the buffer.
    fn accept_outputs(&mut self) {
        while let Some(item) = self.scratch.pop_front() {
            if self.offset > 0 {
                self.offset -= 1;
                continue;
            }
            match self.limit.as_mut() {
                Some(0) => {
                    self.scratch.clear();
                    break;
                }
                Some(limit) => *limit -= 1,
                None => {}
            }
            self.buffer.push_back(item);
        }
        if self.limit == Some(0) {
            self.source = None;
            self.flushed = true;
        }
    }
}

impl<X: Transform> Stream for TransformIterator<X> {
    type Item = ExecResult<X::Output>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(item) = this.buffer.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }
            if this.state.is_terminal() {
                return Poll::Ready(None);
            }
            this.state.advance(IteratorState::Open);

            let Some(source) = this.source.as_mut() else {
                if this.flushed {
                    this.state.advance(IteratorState::Ended);
                    return Poll::Ready(None);
                }
                this.flushed = true;
                this.state.advance(IteratorState::Closing);
                if let Err(error) = this.transform.flush(&mut this.scratch) {
                    this.state.advance(IteratorState::Errored);
                    return Poll::Ready(Some(Err(error)));
                }
                this.accept_outputs();
                continue;
            };

            match ready!(source.poll_next_unpin(cx)) {
                Some(Ok(item)) => match this.transform.transform(item, &mut this.scratch) {
                    Ok(TransformFlow::Continue) => this.accept_outputs(),
                    Ok(TransformFlow::Finish) => {
                        this.source = None;
                        this.accept_outputs();
                    }
                    Err(error) => {
                        this.source = None;
                        this.state.advance(IteratorState::Errored);
                        return Poll::Ready(Some(Err(error)));
                    }
                },
                Some(Err(error)) => {
                    this.source = None;
                    this.state.advance(IteratorState::Errored);
                    return Poll::Ready(Some(Err(error)));
                }
                None => this.source = None,
            }
        }
    }
}

impl<X: Transform> Unpin for TransformIterator<X> {}

/// A transform that forwards all items.
struct Identity<T>(PhantomData<fn(T) -> T>);

impl<T: Send> Transform for Identity<T> {
    type Input = T;
    type Output = T;

    fn transform(&mut self, item: T, output: &mut VecDeque<T>) -> ExecResult<TransformFlow> {
        output.push_back(item);
        Ok(TransformFlow::Continue)
    }
}

/// Skips the first `offset` items of `source` and yields at most `limit` items after that.
pub fn limit<T: Send + 'static>(
    source: SendableAsyncIterator<T>,
    offset: usize,
    limit: Option<usize>,
) -> SendableAsyncIterator<T> {
    if offset == 0 && limit.is_none() {
        return source;
    }
    Box::pin(TransformIterator::new(source, Identity(PhantomData)).with_range(offset, limit))
}
