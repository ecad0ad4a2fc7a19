use crate::iterator::{IteratorState, SendableAsyncIterator, DEFAULT_MAX_BUFFER_SIZE};
use crate::{ExecResult, ExecutionError};
use futures::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Reads ahead from its source into a bounded buffer.
///
/// Whenever the iterator is polled it first tops up the buffer with everything the source can
/// deliver without waiting, up to `max_buffer_size` items. Items buffered before an error of the
/// source are still delivered before that error.
pub struct BufferedIterator<T> {
    source: Option<SendableAsyncIterator<T>>,
    buffer: VecDeque<T>,
    max_buffer_size: usize,
    pending_error: Option<ExecutionError>,
    state: IteratorState,
}

impl<T> BufferedIterator<T> {
    pub fn new(source: SendableAsyncIterator<T>) -> Self {
        Self::with_max_buffer_size(source, DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_max_buffer_size(source: SendableAsyncIterator<T>, max_buffer_size: usize) -> Self {
        Self {
            source: Some(source),
            buffer: VecDeque::with_capacity(max_buffer_size),
            max_buffer_size: max_buffer_size.max(1),
            pending_error: None,
            state: IteratorState::Init,
        }
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Returns the number of items that can be read without touching the source.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Stops reading from the source. Buffered items are still delivered.
    ///
    /// The source is dropped immediately. Closing is idempotent.
    pub fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.source = None;
        self.state.advance(IteratorState::Closing);
    }

    /// Tops up the buffer without waiting for the source.
    fn fill_buffer(&mut self, cx: &mut Context<'_>) {
        while self.buffer.len() < self.max_buffer_size {
            let Some(source) = self.source.as_mut() else {
                return;
            };
            match source.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(item))) => self.buffer.push_back(item),
                Poll::Ready(Some(Err(error))) => {
                    self.pending_error = Some(error);
                    self.source = None;
                }
                Poll::Ready(None) => {
                    self.source = None;
                    self.state.advance(IteratorState::Closing);
                }
                Poll::Pending => return,
            }
        }
    }
}

impl<T> Stream for BufferedIterator<T> {
    type Item = ExecResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.state.is_terminal() {
            return Poll::Ready(None);
        }
        this.state.advance(IteratorState::Open);
        this.fill_buffer(cx);

        if let Some(item) = this.buffer.pop_front() {
            return Poll::Ready(Some(Ok(item)));
        }
        if let Some(error) = this.pending_error.take() {
            this.state.advance(IteratorState::Errored);
            return Poll::Ready(Some(Err(error)));
        }
        if this.source.is_none() {
            this.state.advance(IteratorState::Ended);
            return Poll::Ready(None);
        }
        Poll::Pending
    }
}

impl<T> Unpin for BufferedIterator<T> {}
