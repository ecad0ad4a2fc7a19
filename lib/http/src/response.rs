use futures::future::AbortHandle;
use futures::{ready, FutureExt, Stream};
use ldf_common::{ExecResult, FetchError};
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

/// Information about a response that is available before its body is consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseMetadata {
    pub status: StatusCode,
    /// The media type without parameters such as `charset`.
    pub content_type: String,
    pub headers: HeaderMap,
    /// The time between sending the request and receiving the complete response.
    pub response_time: Duration,
    /// The URL of the response after redirects and time negotiation.
    pub url: String,
}

/// A completed response whose body has been decoded.
#[derive(Debug)]
pub(crate) struct FetchedResponse {
    pub metadata: ResponseMetadata,
    pub body: Vec<u8>,
}

enum ResponseState {
    Waiting(oneshot::Receiver<Result<FetchedResponse, FetchError>>),
    Finished,
}

/// The pending response of a request issued by an [HttpClient](crate::HttpClient).
///
/// The iterator yields the decoded body as a single item, or a single error if the request failed.
/// Dropping the iterator aborts the request if it is still queued or in flight.
pub struct ResponseIterator {
    url: String,
    state: ResponseState,
    metadata: Option<ResponseMetadata>,
    abort_handle: AbortHandle,
}

impl ResponseIterator {
    pub(crate) fn new(
        url: String,
        receiver: oneshot::Receiver<Result<FetchedResponse, FetchError>>,
        abort_handle: AbortHandle,
    ) -> Self {
        Self {
            url,
            state: ResponseState::Waiting(receiver),
            metadata: None,
            abort_handle,
        }
    }

    /// The URL that was requested.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the metadata once the response has arrived.
    pub fn metadata(&self) -> Option<&ResponseMetadata> {
        self.metadata.as_ref()
    }

    /// Aborts the request. The iterator ends without yielding anything else.
    pub fn abort(&mut self) {
        self.abort_handle.abort();
        self.state = ResponseState::Finished;
    }
}

impl Stream for ResponseIterator {
    type Item = ExecResult<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match &mut this.state {
            ResponseState::Waiting(receiver) => {
                let result = ready!(receiver.poll_unpin(cx));
                this.state = ResponseState::Finished;
                match result {
                    Ok(Ok(response)) => {
                        this.metadata = Some(response.metadata);
                        Poll::Ready(Some(Ok(response.body)))
                    }
                    Ok(Err(error)) => Poll::Ready(Some(Err(error.into()))),
                    // The sender is dropped if the request was aborted.
                    Err(_) => Poll::Ready(Some(Err(FetchError::Aborted {
                        url: this.url.clone(),
                    }
                    .into()))),
                }
            }
            ResponseState::Finished => Poll::Ready(None),
        }
    }
}

impl Drop for ResponseIterator {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}
