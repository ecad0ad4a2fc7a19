//! A pull-based asynchronous iterator abstraction built on [futures::Stream].
//!
//! Every stage of an execution pipeline is a [SendableAsyncIterator]. Reading is non-blocking: a
//! stage that has nothing to offer returns [Poll::Pending](std::task::Poll::Pending) and wakes its
//! consumer as soon as it might have an item. The end of a stage is signalled exactly once by
//! returning `None`; afterward it keeps returning `None`.
//!
//! Cancellation happens by ownership. Closing or dropping a stage drops its upstream stages, which
//! in turn abort any HTTP request that is still in flight.

mod buffered;
mod multi_transform;
mod transform;

pub use buffered::BufferedIterator;
pub use multi_transform::{MultiTransform, MultiTransformIterator};
pub use transform::{limit, Transform, TransformFlow, TransformIterator};

use crate::ExecResult;
use futures::{stream, Stream, StreamExt};
use std::pin::Pin;

/// The default number of items that a stage buffers or sub-iterators it keeps open.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 4;

/// A boxed iterator that can be moved between threads.
pub type SendableAsyncIterator<T> = Pin<Box<dyn Stream<Item = ExecResult<T>> + Send>>;

/// The life cycle of an iterator.
///
/// Transitions only move forward: `Init -> Open -> Closing -> Ended`. `Errored` can be reached from
/// every state except `Ended`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IteratorState {
    /// Nothing has been read yet.
    Init,
    /// Items are being produced.
    Open,
    /// No new items will be produced, but buffered items are still delivered.
    Closing,
    /// All items were delivered.
    Ended,
    /// An error was delivered. No more items follow.
    Errored,
}

impl IteratorState {
    /// Returns true if the iterator will not produce any more items.
    pub fn is_terminal(self) -> bool {
        matches!(self, IteratorState::Ended | IteratorState::Errored)
    }

    /// Moves to `next` unless this would go back in the life cycle.
    pub(crate) fn advance(&mut self, next: IteratorState) {
        if !self.is_terminal() && next > *self {
            *self = next;
        }
    }
}

/// Creates an iterator that yields `item` and ends.
pub fn single<T: Send + 'static>(item: T) -> SendableAsyncIterator<T> {
    stream::once(async move { Ok(item) }).boxed()
}

/// Creates an iterator that ends immediately.
pub fn empty<T: Send + 'static>() -> SendableAsyncIterator<T> {
    stream::empty().boxed()
}

/// Creates an iterator over the given items.
pub fn from_items<T: Send + 'static>(items: Vec<T>) -> SendableAsyncIterator<T> {
    stream::iter(items.into_iter().map(Ok)).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_only_moves_forward() {
        let mut state = IteratorState::Init;

        state.advance(IteratorState::Closing);
        state.advance(IteratorState::Open);
        assert_eq!(state, IteratorState::Closing);

        state.advance(IteratorState::Ended);
        state.advance(IteratorState::Errored);
        assert_eq!(state, IteratorState::Ended);
    }

    #[tokio::test]
    async fn single_yields_one_item() {
        let items: Vec<_> = single(42).collect().await;

        assert_eq!(items, vec![Ok(42)]);
    }
}
