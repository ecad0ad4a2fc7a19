use crate::decode::decode_body;
use crate::link::find_link;
use crate::response::{FetchedResponse, ResponseIterator, ResponseMetadata};
use crate::transport::{HttpRequest, HttpTransport, TransportResponse};
use futures::future::{AbortHandle, Abortable, BoxFuture};
use futures::FutureExt;
use ldf_common::FetchError;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE,
    LINK,
};
use reqwest::Method;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::sync::{oneshot, Semaphore};
use tracing::{debug, info};
use url::Url;

/// The media types requested from fragment servers unless configured otherwise.
pub const DEFAULT_ACCEPT: &str = "application/trig;q=1.0,application/n-quads;q=0.9,text/turtle;q=0.8,application/n-triples;q=0.7,*/*;q=0.1";

const ACCEPT_DATETIME: HeaderName = HeaderName::from_static("accept-datetime");
const MEMENTO_DATETIME: HeaderName = HeaderName::from_static("memento-datetime");

/// How many timegates a request follows before the last response is used as it is.
pub const MAX_TIMEGATE_HOPS: usize = 3;

/// The IMF-fixdate format of RFC 7231 that is used by `accept-datetime`.
const HTTP_DATE: &[BorrowedFormatItem<'_>] = format_description!(
    "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Configures an [HttpClient].
#[derive(Clone, Debug)]
pub struct HttpClientOptions {
    /// The value of the `accept` header.
    pub accept: String,
    /// If set, requests ask for the state of the resources at this point in time.
    pub datetime: Option<OffsetDateTime>,
    /// The maximum number of requests that are in flight at the same time.
    pub max_active_requests: usize,
    pub timeout: Duration,
    pub follow_redirect: bool,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            accept: DEFAULT_ACCEPT.to_owned(),
            datetime: None,
            max_active_requests: 20,
            timeout: Duration::from_secs(5),
            follow_redirect: true,
        }
    }
}

/// An HTTP client with a bounded number of concurrent requests.
///
/// Requests that exceed the limit wait in FIFO order. Each request runs as a task on the current
/// [tokio] runtime and can be aborted through its [ResponseIterator] or with
/// [HttpClient::abort_all]. Cloning the client is cheap and the clones share the limit.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn HttpTransport>,
    default_headers: HeaderMap,
    timeout: Duration,
    follow_redirect: bool,
    permits: Arc<Semaphore>,
    registry: RequestRegistry,
    queued: AtomicUsize,
    active: AtomicUsize,
    request_count: AtomicU64,
}

impl HttpClient {
    /// Creates a new [HttpClient].
    pub fn new(transport: Arc<dyn HttpTransport>, options: HttpClientOptions) -> Self {
        let mut default_headers = HeaderMap::new();
        if let Ok(accept) = HeaderValue::from_str(&options.accept) {
            default_headers.insert(ACCEPT, accept);
        }
        default_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip,deflate"));
        if let Some(datetime) = options.datetime.and_then(format_http_date) {
            default_headers.insert(ACCEPT_DATETIME, datetime);
        }

        Self {
            inner: Arc::new(ClientInner {
                transport,
                default_headers,
                timeout: options.timeout,
                follow_redirect: options.follow_redirect,
                permits: Arc::new(Semaphore::new(options.max_active_requests.max(1))),
                registry: RequestRegistry::default(),
                queued: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                request_count: AtomicU64::new(0),
            }),
        }
    }

    /// Issues a `GET` request with the default headers.
    pub fn get(&self, url: &str) -> ResponseIterator {
        self.request(url, Method::GET, &HeaderMap::new())
    }

    /// Issues a request. `headers` are added to the default headers and override them.
    ///
    /// The request is queued immediately and starts as soon as the concurrency limit permits.
    pub fn request(&self, url: &str, method: Method, headers: &HeaderMap) -> ResponseIterator {
        let mut request_headers = self.inner.default_headers.clone();
        for (name, value) in headers {
            request_headers.insert(name.clone(), value.clone());
        }
        let request = HttpRequest {
            url: url.to_owned(),
            method,
            headers: request_headers,
            timeout: self.inner.timeout,
            follow_redirect: self.inner.follow_redirect,
        };

        let (sender, receiver) = oneshot::channel();
        let (abort_handle, registration) = AbortHandle::new_pair();
        let id = self.inner.registry.register(abort_handle.clone());
        self.inner.request_count.fetch_add(1, Ordering::Relaxed);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = Abortable::new(
                Arc::clone(&inner).perform(request, MAX_TIMEGATE_HOPS),
                registration,
            )
            .await;
            inner.registry.remove(id);
            if let Ok(result) = outcome {
                if sender.send(result).is_err() {
                    debug!("Response was dropped before it arrived");
                }
            }
        });

        ResponseIterator::new(url.to_owned(), receiver, abort_handle)
    }

    /// Aborts all queued and active requests. Completed requests are not affected.
    pub fn abort_all(&self) {
        let aborted = self.inner.registry.abort_all();
        if aborted > 0 {
            debug!(aborted, "Aborted pending requests");
        }
    }

    /// Returns the number of requests that are currently in flight.
    pub fn active_requests(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Returns the number of requests that wait for a free slot.
    pub fn queued_requests(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    /// Returns the number of requests issued so far.
    pub fn request_count(&self) -> u64 {
        self.inner.request_count.load(Ordering::Relaxed)
    }
}

impl Debug for HttpClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("transport", &self.inner.transport)
            .field("active", &self.active_requests())
            .field("queued", &self.queued_requests())
            .finish_non_exhaustive()
    }
}

impl ClientInner {
    fn perform(
        self: Arc<Self>,
        request: HttpRequest,
        timegate_hops: usize,
    ) -> BoxFuture<'static, Result<FetchedResponse, FetchError>> {
        async move {
            let (response, response_time) = self.execute_with_permit(&request).await?;

            // Negotiate the time if the server does not support it directly.
            if request.headers.contains_key(ACCEPT_DATETIME)
                && !response.headers.contains_key(MEMENTO_DATETIME)
            {
                if let Some(timegate) = find_timegate(&response) {
                    if timegate_hops == 0 {
                        debug!(url = %request.url, %timegate, "Not following more timegates");
                    } else {
                        debug!(url = %request.url, %timegate, "Following timegate");
                        let timegate_request = HttpRequest {
                            url: timegate,
                            ..request
                        };
                        return Arc::clone(&self)
                            .perform(timegate_request, timegate_hops - 1)
                            .await;
                    }
                }
            }

            finish_response(response, response_time)
        }
        .boxed()
    }

    /// Waits for a free slot and executes the request.
    async fn execute_with_permit(
        &self,
        request: &HttpRequest,
    ) -> Result<(TransportResponse, Duration), FetchError> {
        let queued = CounterGuard::increment(&self.queued);
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| FetchError::Aborted {
                url: request.url.clone(),
            })?;
        drop(queued);
        let _active = CounterGuard::increment(&self.active);

        info!(url = %request.url, "Requesting");
        let start = Instant::now();
        let response = tokio::time::timeout(request.timeout, self.transport.execute(request.clone()))
            .await
            .map_err(|_| FetchError::Timeout {
                url: request.url.clone(),
                timeout: request.timeout,
            })??;
        drop(permit);
        Ok((response, start.elapsed()))
    }
}

fn find_timegate(response: &TransportResponse) -> Option<String> {
    let target = response
        .headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| find_link(value, "timegate"))?;
    match Url::parse(&response.url).and_then(|base| base.join(target)) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Some(target.to_owned()),
    }
}

fn finish_response(
    response: TransportResponse,
    response_time: Duration,
) -> Result<FetchedResponse, FetchError> {
    let encoding = response
        .headers
        .get(CONTENT_ENCODING)
        .and_then(|value| value.to_str().ok());
    let body = decode_body(&response.url, encoding, response.body)?;
    let content_type = response
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_default();

    Ok(FetchedResponse {
        metadata: ResponseMetadata {
            status: response.status,
            content_type,
            headers: response.headers,
            response_time,
            url: response.url,
        },
        body,
    })
}

fn format_http_date(datetime: OffsetDateTime) -> Option<HeaderValue> {
    let formatted = datetime.to_offset(time::UtcOffset::UTC).format(HTTP_DATE).ok()?;
    HeaderValue::from_str(&formatted).ok()
}

/// Keeps track of all requests that have not completed yet.
#[derive(Default)]
struct RequestRegistry {
    next_id: AtomicU64,
    requests: Mutex<HashMap<u64, AbortHandle>>,
}

impl RequestRegistry {
    fn register(&self, handle: AbortHandle) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle);
        id
    }

    fn remove(&self, id: u64) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn abort_all(&self) -> usize {
        let requests = std::mem::take(
            &mut *self.requests.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in requests.values() {
            handle.abort();
        }
        requests.len()
    }
}

/// Increments a counter for as long as the guard lives.
struct CounterGuard<'counter>(&'counter AtomicUsize);

impl<'counter> CounterGuard<'counter> {
    fn increment(counter: &'counter AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
