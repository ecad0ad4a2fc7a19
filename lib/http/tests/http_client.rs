use async_trait::async_trait;
use futures::StreamExt;
use ldf_common::{ExecutionError, FetchError};
use ldf_http::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, LINK};
use ldf_http::{
    HttpClient, HttpClientOptions, HttpRequest, HttpTransport, StatusCode, TransportResponse,
    MAX_TIMEGATE_HOPS,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

fn ok_response(request: &HttpRequest, headers: HeaderMap, body: &[u8]) -> TransportResponse {
    TransportResponse {
        status: StatusCode::OK,
        headers,
        url: request.url.clone(),
        body: body.to_vec(),
    }
}

/// Holds every request until a permit is added to the gate.
#[derive(Debug)]
struct GatedTransport {
    gate: Semaphore,
    current: AtomicUsize,
    max_concurrent: AtomicUsize,
}

impl GatedTransport {
    fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            current: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HttpTransport for GatedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, FetchError> {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(current, Ordering::SeqCst);
        self.gate.acquire().await.unwrap().forget();
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(ok_response(&request, HeaderMap::new(), b"ok"))
    }
}

/// Never answers.
#[derive(Debug)]
struct SilentTransport;

#[async_trait]
impl HttpTransport for SilentTransport {
    async fn execute(&self, _request: HttpRequest) -> Result<TransportResponse, FetchError> {
        std::future::pending().await
    }
}

/// Answers with fixed headers and bodies per URL and records all requests.
#[derive(Debug, Default)]
struct ScriptedTransport {
    responses: Vec<(String, HeaderMap, Vec<u8>)>,
    requests: Mutex<Vec<HttpRequest>>,
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<TransportResponse, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        let (_, headers, body) = self
            .responses
            .iter()
            .find(|(url, _, _)| *url == request.url)
            .ok_or_else(|| FetchError::Transport {
                url: request.url.clone(),
                message: "unknown URL".to_owned(),
            })?;
        Ok(ok_response(&request, headers.clone(), body))
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition was not met in time");
}

#[tokio::test]
async fn excess_requests_are_queued() {
    let transport = Arc::new(GatedTransport::new());
    let client = HttpClient::new(
        Arc::clone(&transport) as Arc<dyn HttpTransport>,
        HttpClientOptions {
            max_active_requests: 2,
            ..HttpClientOptions::default()
        },
    );

    let mut responses: Vec<_> = (0..3)
        .map(|i| client.get(&format!("http://example.org/{i}")))
        .collect();
    wait_until(|| client.active_requests() == 2 && client.queued_requests() == 1).await;

    transport.gate.add_permits(1);
    wait_until(|| client.active_requests() == 2 && client.queued_requests() == 0).await;

    transport.gate.add_permits(2);
    for response in &mut responses {
        assert_eq!(response.next().await.unwrap().unwrap(), b"ok");
    }
    assert_eq!(transport.max_concurrent.load(Ordering::SeqCst), 2);
    assert_eq!(client.active_requests(), 0);
    assert_eq!(client.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn slow_requests_time_out() {
    let client = HttpClient::new(
        Arc::new(SilentTransport),
        HttpClientOptions {
            timeout: Duration::from_millis(50),
            ..HttpClientOptions::default()
        },
    );

    let result = client.get("http://example.org/slow").next().await.unwrap();

    assert!(matches!(
        result,
        Err(ExecutionError::Fetch(FetchError::Timeout { .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn aborted_requests_do_not_time_out() {
    let client = HttpClient::new(
        Arc::new(SilentTransport),
        HttpClientOptions {
            timeout: Duration::from_millis(50),
            ..HttpClientOptions::default()
        },
    );
    let mut first = client.get("http://example.org/a");
    let mut second = client.get("http://example.org/b");
    wait_until(|| client.active_requests() == 2).await;

    client.abort_all();

    for response in [&mut first, &mut second] {
        assert!(matches!(
            response.next().await,
            Some(Err(ExecutionError::Fetch(FetchError::Aborted { .. })))
        ));
        assert!(response.next().await.is_none());
    }
    wait_until(|| client.active_requests() == 0).await;
}

#[tokio::test]
async fn dropping_the_response_aborts_the_request() {
    let transport = Arc::new(GatedTransport::new());
    let client = HttpClient::new(
        Arc::clone(&transport) as Arc<dyn HttpTransport>,
        HttpClientOptions::default(),
    );

    let response = client.get("http://example.org/dropped");
    wait_until(|| client.active_requests() == 1).await;
    drop(response);

    wait_until(|| client.active_requests() == 0).await;
    assert_eq!(client.queued_requests(), 0);
}

#[tokio::test]
async fn default_headers_are_sent() {
    let transport = Arc::new(ScriptedTransport {
        responses: vec![(
            "http://example.org/".to_owned(),
            HeaderMap::new(),
            b"body".to_vec(),
        )],
        ..ScriptedTransport::default()
    });
    let client = HttpClient::new(
        Arc::clone(&transport) as Arc<dyn HttpTransport>,
        HttpClientOptions {
            accept: "text/turtle".to_owned(),
            ..HttpClientOptions::default()
        },
    );

    let mut response = client.get("http://example.org/");
    assert_eq!(response.next().await.unwrap().unwrap(), b"body");

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests[0].headers["accept"], "text/turtle");
    assert_eq!(requests[0].headers["accept-encoding"], "gzip,deflate");
    assert!(!requests[0].headers.contains_key("accept-datetime"));
    assert!(response.metadata().is_some());
}

#[tokio::test]
async fn timegate_is_followed() {
    let mut original_headers = HeaderMap::new();
    original_headers.insert(
        LINK,
        HeaderValue::from_static("<http://example.org/timegate/data>; rel=\"timegate\""),
    );
    let mut memento_headers = HeaderMap::new();
    memento_headers.insert(
        "memento-datetime",
        HeaderValue::from_static("Mon, 01 Jun 2015 10:30:00 GMT"),
    );
    let transport = Arc::new(ScriptedTransport {
        responses: vec![
            (
                "http://example.org/data".to_owned(),
                original_headers,
                b"current".to_vec(),
            ),
            (
                "http://example.org/timegate/data".to_owned(),
                memento_headers,
                b"memento".to_vec(),
            ),
        ],
        ..ScriptedTransport::default()
    });
    let client = HttpClient::new(
        Arc::clone(&transport) as Arc<dyn HttpTransport>,
        HttpClientOptions {
            datetime: Some(time::macros::datetime!(2015-06-01 10:30:00 UTC)),
            ..HttpClientOptions::default()
        },
    );

    let mut response = client.get("http://example.org/data");

    assert_eq!(response.next().await.unwrap().unwrap(), b"memento");
    assert_eq!(
        response.metadata().unwrap().url,
        "http://example.org/timegate/data"
    );
    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[1].headers["accept-datetime"],
        "Mon, 01 Jun 2015 10:30:00 GMT"
    );
}

#[tokio::test]
async fn timegate_loops_end() {
    let mut headers = HeaderMap::new();
    headers.insert(
        LINK,
        HeaderValue::from_static("<http://example.org/data>; rel=\"timegate\""),
    );
    let transport = Arc::new(ScriptedTransport {
        responses: vec![(
            "http://example.org/data".to_owned(),
            headers,
            b"current".to_vec(),
        )],
        ..ScriptedTransport::default()
    });
    let client = HttpClient::new(
        Arc::clone(&transport) as Arc<dyn HttpTransport>,
        HttpClientOptions {
            datetime: Some(time::macros::datetime!(2015-06-01 10:30:00 UTC)),
            ..HttpClientOptions::default()
        },
    );

    let mut response = client.get("http://example.org/data");

    assert_eq!(response.next().await.unwrap().unwrap(), b"current");
    assert_eq!(
        transport.requests.lock().unwrap().len(),
        MAX_TIMEGATE_HOPS + 1
    );
}

#[tokio::test]
async fn unsupported_encoding_is_an_error() {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_ENCODING, HeaderValue::from_static("br"));
    let transport = Arc::new(ScriptedTransport {
        responses: vec![("http://example.org/".to_owned(), headers, b"???".to_vec())],
        ..ScriptedTransport::default()
    });
    let client = HttpClient::new(transport, HttpClientOptions::default());

    let result = client.get("http://example.org/").next().await.unwrap();

    assert_eq!(
        result,
        Err(ExecutionError::Fetch(FetchError::UnsupportedEncoding(
            "br".to_owned()
        )))
    );
}
